//! Core domain types (spec §3): `Agent`, `Task`, `TaskClaims`,
//! `VerificationResult`, `AttemptRecord`, `QueueEntry`, and the enums that
//! drive the task and agent state machines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, unique agent identifier (spec §3 "Agent: Identity").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque, globally unique task identifier, caller-supplied or
/// core-generated (spec §3 "Task: Identity").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl TaskId {
    /// Core-generated id for callers that don't supply their own (spec §3).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Stopping,
    Error,
    Offline,
}

/// Priority maps to a strictly ordered numeric score (higher = earlier),
/// spec §3 "Task: priority".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Numeric score used by the durable queue's ordering index.
    /// Higher score dequeues first.
    pub fn score(self) -> i32 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 10,
            Priority::High => 20,
            Priority::Critical => 30,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Task lifecycle state (spec §3, §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Dispatched,
    Running,
    Verifying,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal states never transition further (spec §3 invariant T2),
    /// except `Failed` with attempts still below the retry budget, which
    /// the recovery manager re-opens via a fresh dispatch attempt.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Failed
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Dispatched => "dispatched",
            TaskStatus::Running => "running",
            TaskStatus::Verifying => "verifying",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Free-form payload describing the work, confined and opaque to the core
/// (spec §3 "Task: payload", spec §9 "Dynamic payloads").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    pub prompt: String,
    pub codebase_id: Option<String>,
    pub worktree_path: Option<String>,
    pub task_type: Option<String>,
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// Resource footprint reported on agent heartbeats (spec §6 `AgentHeartbeat`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentResources {
    pub memory_used_mb: u64,
    pub cpu_percent: f32,
}

/// Free-form capability descriptor, opaque to the core (spec §3).
pub type Capabilities = serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: AgentId,
    pub status: AgentStatus,
    pub current_task_id: Option<TaskId>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub capabilities: Capabilities,
    pub resources: AgentResources,
}

impl AgentInfo {
    pub fn new(agent_id: AgentId, capabilities: Capabilities) -> Self {
        Self {
            agent_id,
            status: AgentStatus::Idle,
            current_task_id: None,
            last_heartbeat_at: Utc::now(),
            capabilities,
            resources: AgentResources::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub priority: Priority,
    pub payload: TaskPayload,
    pub assigned_agent_id: Option<AgentId>,
    pub attempts: u32,
    pub result: Option<TaskResult>,
    pub queued_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(task_id: TaskId, priority: Priority, payload: TaskPayload) -> Self {
        Self {
            task_id,
            status: TaskStatus::Queued,
            priority,
            payload,
            assigned_agent_id: None,
            attempts: 0,
            result: None,
            queued_at: Utc::now(),
            dispatched_at: None,
            completed_at: None,
        }
    }
}

/// The agent's self-report. Not authoritative — see `VerificationResult`
/// (spec §3 "Claims are treated as assertions").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskClaims {
    pub commits_created: u64,
    pub files_modified: Vec<String>,
    pub tests_run: bool,
    pub tests_passed: bool,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultError {
    pub message: String,
    pub recoverable: bool,
}

/// Carried on `task.result` and synthesised by the coordinator for
/// heartbeat-timeout / deregistration failures (spec §6 `TaskResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub success: bool,
    pub claims: TaskClaims,
    pub summary: String,
    pub error: Option<TaskResultError>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    pub checks: Vec<CheckResult>,
    pub duration_ms: u64,
}

impl VerificationResult {
    pub fn failing_check_names(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// A single recorded failed attempt (spec §3 `AttemptRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub task_id: TaskId,
    pub attempt_number: u32,
    pub agent_id: AgentId,
    pub error_message: String,
    pub failing_checks: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Supplement attached to a retry dispatch so the agent can avoid repeating
/// a failure (spec §4.E, §9 glossary "Recovery context").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryContext {
    pub attempt_number: u32,
    pub previous_failures: Vec<String>,
    pub failure_patterns: Vec<String>,
}

/// Terminal event emitted when the retry budget is exhausted (spec §4.E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationInfo {
    pub task_id: TaskId,
    pub task_description: String,
    pub attempts: Vec<AttemptRecord>,
    pub suggested_actions: Vec<String>,
}

/// An entry in the durable priority queue (spec §3 `QueueEntry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub task_id: TaskId,
    pub score: i32,
    pub queued_at: DateTime<Utc>,
}
