//! Per-task attempt state (spec §4.E "State held per task").
//!
//! Mirrors the shape of `EscalationState` in
//! `examples/TheFermiSea-beefcake-swarm/coordination/src/escalation/state.rs`
//! — a counter plus an ordered history, held per logical unit of work — but
//! scoped to a single task rather than a whole beads issue, and with no tier
//! budget since this component has exactly one retry policy.

use agentpool_shared::types::AttemptRecord;

#[derive(Debug, Clone, Default)]
pub struct TaskAttemptState {
    pub attempts: u32,
    pub history: Vec<AttemptRecord>,
}

impl TaskAttemptState {
    pub fn record(&mut self, record: AttemptRecord) -> u32 {
        self.history.push(record);
        self.attempts += 1;
        self.attempts
    }
}
