//! Bus payload schemas (spec §6). These are stable wire types and MUST be
//! preserved for backward compatibility — new optional fields only, never
//! renamed or removed.

use crate::types::{AgentId, AgentResources, AgentStatus, Capabilities, Priority, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub platform: String,
    pub memory: u64,
    pub cpus: u32,
}

/// Inbound: agent → coordinator, channel `agent.register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegister {
    pub agent_id: AgentId,
    pub capabilities: Capabilities,
    pub system: SystemInfo,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentTaskRef {
    pub task_id: TaskId,
}

/// Inbound: agent → coordinator, channel `agent.heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHeartbeat {
    pub agent_id: AgentId,
    pub status: AgentStatus,
    pub current_task: Option<CurrentTaskRef>,
    pub resources: AgentResources,
    pub timestamp: DateTime<Utc>,
}

/// Inbound: agent → coordinator, channel `agent.status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusChange {
    pub agent_id: AgentId,
    pub previous_status: AgentStatus,
    pub current_status: AgentStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub input: serde_json::Value,
}

/// Inbound: agent → coordinator, channel `agent.toolcall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub agent_id: AgentId,
    pub task_id: TaskId,
    pub tool: ToolInfo,
    pub timestamp: DateTime<Utc>,
}

/// Inbound: agent → coordinator, channel `agent.deregister`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDeregister {
    pub agent_id: AgentId,
    pub timestamp: DateTime<Utc>,
}

/// Re-exported for convenience at the message-schema boundary.
pub use crate::types::{TaskClaims, TaskResult, TaskResultError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDispatchContext {
    pub previous_attempts: u32,
    pub recovery_hints: Vec<String>,
    pub memory_context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDispatchTask {
    pub description: String,
    pub codebase_id: Option<String>,
    pub worktree_path: Option<String>,
    pub priority: Priority,
    pub context: Option<TaskDispatchContext>,
}

/// Outbound: coordinator → agent, channel `task.dispatch` /
/// `task.dispatch.<agentId>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDispatch {
    pub task_id: TaskId,
    pub target_agent_id: AgentId,
    pub task: TaskDispatchTask,
    pub conversation_id: Option<String>,
    pub platform: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Outbound: coordinator → agent, channel `control.stop.<agentId>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub agent_id: AgentId,
    pub task_id: TaskId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Outbound: coordinator → agent, channel `control.kill.<agentId>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kill {
    pub agent_id: AgentId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Logical bus channel names (spec §4.A channel table).
pub mod channels {
    pub const TASK_DISPATCH: &str = "task.dispatch";
    pub const TASK_RESULT: &str = "task.result";
    pub const AGENT_REGISTER: &str = "agent.register";
    pub const AGENT_HEARTBEAT: &str = "agent.heartbeat";
    pub const AGENT_STATUS: &str = "agent.status";
    pub const AGENT_TOOLCALL: &str = "agent.toolcall";
    pub const AGENT_DEREGISTER: &str = "agent.deregister";

    pub fn task_dispatch_for(agent_id: &str) -> String {
        format!("task.dispatch.{agent_id}")
    }

    pub fn control_stop_for(agent_id: &str) -> String {
        format!("control.stop.{agent_id}")
    }

    pub fn control_kill_for(agent_id: &str) -> String {
        format!("control.kill.{agent_id}")
    }
}
