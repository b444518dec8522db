//! Read-only projection returned by `PoolSnapshot()` (spec §4.F).

use agentpool_shared::types::AgentInfo;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskCounts {
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub agents: Vec<AgentInfo>,
    pub tasks: TaskCounts,
}
