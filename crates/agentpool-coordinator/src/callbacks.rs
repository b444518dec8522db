//! Caller-registered callbacks (spec §4.F `SetHandlers`).
//!
//! Each slot is an `Arc<dyn Fn + Send + Sync>`, the same shape as
//! [`agentpool_bus::Handler`] — callbacks run after the relevant state change
//! has been persisted, never before.

use agentpool_shared::messages::ToolCall;
use agentpool_shared::types::{AgentId, EscalationInfo, Task};
use std::sync::Arc;

pub type TaskCallback = Arc<dyn Fn(Task) + Send + Sync>;
pub type ToolCallCallback = Arc<dyn Fn(ToolCall) + Send + Sync>;
pub type AgentDeadCallback = Arc<dyn Fn(AgentId) + Send + Sync>;
pub type EscalationCallback = Arc<dyn Fn(EscalationInfo) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_task_complete: Option<TaskCallback>,
    pub on_task_failed: Option<TaskCallback>,
    pub on_tool_call: Option<ToolCallCallback>,
    pub on_agent_dead: Option<AgentDeadCallback>,
    pub on_escalation: Option<EscalationCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_task_complete(mut self, f: impl Fn(Task) + Send + Sync + 'static) -> Self {
        self.on_task_complete = Some(Arc::new(f));
        self
    }

    pub fn on_task_failed(mut self, f: impl Fn(Task) + Send + Sync + 'static) -> Self {
        self.on_task_failed = Some(Arc::new(f));
        self
    }

    pub fn on_tool_call(mut self, f: impl Fn(ToolCall) + Send + Sync + 'static) -> Self {
        self.on_tool_call = Some(Arc::new(f));
        self
    }

    pub fn on_agent_dead(mut self, f: impl Fn(AgentId) + Send + Sync + 'static) -> Self {
        self.on_agent_dead = Some(Arc::new(f));
        self
    }

    pub fn on_escalation(mut self, f: impl Fn(EscalationInfo) + Send + Sync + 'static) -> Self {
        self.on_escalation = Some(Arc::new(f));
        self
    }
}
