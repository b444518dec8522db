//! # agentpool-recovery
//!
//! Decides, for a failed task, whether to retry with accumulated context or
//! escalate to a human (spec §4.E). Attempt history is kept per `TaskId` in
//! a [`DashMap`], mirroring the per-issue `EscalationState` kept by
//! `examples/TheFermiSea-beefcake-swarm/coordination/src/escalation/state.rs`
//! — scoped here to one task rather than a whole multi-tier swarm, since
//! this component has a single flat retry budget instead of tier budgets.

mod error;
mod patterns;
mod state;

pub use error::RecoveryError;

use agentpool_shared::types::{AgentId, AttemptRecord, EscalationInfo, RecoveryContext, TaskId};
use chrono::Utc;
use dashmap::DashMap;
use state::TaskAttemptState;
use tracing::{info, warn};

/// Fixed suggestions handed to the caller on escalation (spec §4.E).
const SUGGESTED_ACTIONS: &[&str] = &[
    "simplify the task description",
    "provide additional context or examples",
    "perform manually and record the fix",
];

/// Result of [`RecoveryManager::handle_failure`].
#[derive(Debug, Clone)]
pub struct HandleFailureOutcome {
    pub retry: bool,
    pub recovery_context: Option<RecoveryContext>,
    pub escalation: Option<EscalationInfo>,
}

/// Tracks per-task attempt history and renders retry/escalation verdicts.
#[derive(Debug, Default)]
pub struct RecoveryManager {
    attempts: DashMap<TaskId, TaskAttemptState>,
    max_attempts: u32,
}

impl RecoveryManager {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: DashMap::new(),
            max_attempts,
        }
    }

    /// Implements spec §4.E `HandleFailure`. `error_message` and
    /// `failing_checks` come from the task's synthesised failure result and
    /// the verification engine's `failing_check_names()` respectively — this
    /// manager never inspects the working directory or calls an LLM itself.
    pub fn handle_failure(
        &self,
        task_id: &TaskId,
        task_description: &str,
        agent_id: &str,
        error_message: &str,
        failing_checks: &[String],
    ) -> HandleFailureOutcome {
        let mut entry = self.attempts.entry(task_id.clone()).or_default();
        let attempt_number = entry.attempts + 1;
        let n = entry.record(AttemptRecord {
            task_id: task_id.clone(),
            attempt_number,
            agent_id: AgentId::from(agent_id),
            error_message: error_message.to_string(),
            failing_checks: failing_checks.to_vec(),
            timestamp: Utc::now(),
        });

        if n < self.max_attempts {
            let previous_failures =
                entry.history.iter().map(|a| a.error_message.clone()).collect();
            let failure_patterns = patterns::extract(&entry.history);

            info!(task_id = %task_id, attempt = n, "recovery: retry granted");
            HandleFailureOutcome {
                retry: true,
                recovery_context: Some(RecoveryContext {
                    attempt_number: n + 1,
                    previous_failures,
                    failure_patterns,
                }),
                escalation: None,
            }
        } else {
            warn!(task_id = %task_id, attempt = n, "recovery: escalating, retries exhausted");
            HandleFailureOutcome {
                retry: false,
                recovery_context: None,
                escalation: Some(EscalationInfo {
                    task_id: task_id.clone(),
                    task_description: task_description.to_string(),
                    attempts: entry.history.clone(),
                    suggested_actions: SUGGESTED_ACTIONS.iter().map(|s| s.to_string()).collect(),
                }),
            }
        }
    }

    /// Drops attempt history for a task, e.g. once it completes successfully.
    pub fn forget(&self, task_id: &TaskId) {
        self.attempts.remove(task_id);
    }

    /// Current attempt count for a task (0 if none recorded yet).
    pub fn attempts_for(&self, task_id: &TaskId) -> u32 {
        self.attempts.get(task_id).map(|e| e.attempts).unwrap_or(0)
    }
}
