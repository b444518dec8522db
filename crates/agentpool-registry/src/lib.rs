//! # agentpool-registry
//!
//! Source of truth for agent identity, status, last-heartbeat, and current
//! assignment (spec §4.B). Backed by a `DashMap` for lock-free concurrent
//! reads from the scheduler's message handlers, following the teacher's
//! registry shape in
//! `examples/TheFermiSea-beefcake-swarm/coordination/src/registry/mod.rs`.

use agentpool_shared::messages::{AgentHeartbeat, AgentRegister, AgentStatusChange};
use agentpool_shared::types::{AgentId, AgentInfo, AgentStatus, TaskId};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use tracing::{instrument, warn};

#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: DashMap<AgentId, AgentInfo>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or reset an entry; status set to `idle` (spec §4.B). Rejects a
    /// new agent once `max_agents` are already registered (spec §6 "bounded
    /// pool"); an already-known agent re-registering never counts against
    /// the cap, since it isn't growing the pool.
    #[instrument(skip(self, msg), fields(agent_id = %msg.agent_id))]
    pub fn register(&self, msg: AgentRegister, max_agents: usize) -> bool {
        if !self.agents.contains_key(&msg.agent_id) && self.agents.len() >= max_agents {
            warn!(agent_id = %msg.agent_id, max_agents, "agent pool at capacity, rejecting registration");
            return false;
        }

        let mut info = AgentInfo::new(msg.agent_id.clone(), msg.capabilities);
        info.last_heartbeat_at = msg.timestamp;
        self.agents.insert(msg.agent_id, info);
        true
    }

    /// Update `lastHeartbeatAt`, `status`, `resources`, and (if present)
    /// `currentTaskId`. A heartbeat from an unknown agent is logged and
    /// ignored — the agent must re-register (spec §4.B, §7).
    #[instrument(skip(self, msg), fields(agent_id = %msg.agent_id))]
    pub fn heartbeat(&self, msg: AgentHeartbeat) {
        let Some(mut entry) = self.agents.get_mut(&msg.agent_id) else {
            warn!(agent_id = %msg.agent_id, "heartbeat from unknown agent, ignoring");
            return;
        };
        entry.last_heartbeat_at = msg.timestamp;
        entry.status = msg.status;
        entry.resources = msg.resources;
        if let Some(current) = msg.current_task {
            entry.current_task_id = Some(current.task_id);
        }
    }

    /// Atomically update status (spec §4.B).
    #[instrument(skip(self, msg), fields(agent_id = %msg.agent_id))]
    pub fn status_change(&self, msg: AgentStatusChange) {
        let Some(mut entry) = self.agents.get_mut(&msg.agent_id) else {
            warn!(agent_id = %msg.agent_id, "status change from unknown agent, ignoring");
            return;
        };
        entry.status = msg.current_status;
        if msg.current_status == AgentStatus::Idle {
            entry.current_task_id = None;
        }
    }

    pub fn deregister(&self, agent_id: &AgentId) -> Option<AgentInfo> {
        self.agents.remove(agent_id).map(|(_, info)| info)
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<AgentInfo> {
        self.agents.get(agent_id).map(|entry| entry.clone())
    }

    /// Returns any agent with `status = idle`; no fairness guarantee is
    /// mandated by spec §4.B, but ties are broken by insertion order here
    /// via `DashMap`'s shard iteration, which avoids pathological starvation
    /// of any single agent in practice.
    pub fn find_idle(&self) -> Option<AgentInfo> {
        self.agents
            .iter()
            .find(|entry| entry.status == AgentStatus::Idle)
            .map(|entry| entry.clone())
    }

    pub fn mark_dispatched(&self, agent_id: &AgentId, task_id: TaskId) {
        if let Some(mut entry) = self.agents.get_mut(agent_id) {
            entry.status = AgentStatus::Busy;
            entry.current_task_id = Some(task_id);
        }
    }

    pub fn snapshot(&self) -> Vec<AgentInfo> {
        self.agents.iter().map(|entry| entry.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Returns and removes entries whose `lastHeartbeatAt < now - threshold`
    /// (spec §4.B `Sweep`).
    #[instrument(skip(self))]
    pub fn sweep(&self, now: DateTime<Utc>, threshold_ms: i64) -> Vec<AgentInfo> {
        let threshold = ChronoDuration::milliseconds(threshold_ms);
        let dead: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|entry| now - entry.last_heartbeat_at >= threshold)
            .map(|entry| entry.key().clone())
            .collect();

        dead.into_iter()
            .filter_map(|agent_id| self.agents.remove(&agent_id))
            .map(|(_, info)| info)
            .collect()
    }
}
