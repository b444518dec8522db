//! # agentpool-store
//!
//! Durable, authoritative record of every submitted task (spec §4.C),
//! backed by `sqlx::PgPool`. State transitions are validated against the
//! task state machine before being persisted.

mod error;
mod state_machine;

pub use error::StoreError;
pub use state_machine::is_legal_transition;

use agentpool_shared::types::{Task, TaskId, TaskPayload, TaskResult, TaskStatus};
use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, instrument};

/// Optional fields applied alongside a status transition (spec §4.C
/// `UpdateStatus(taskId, newStatus, patch)`).
#[derive(Debug, Default, Clone)]
pub struct TaskPatch {
    pub assigned_agent_id: Option<String>,
    pub dispatched_at: Option<chrono::DateTime<Utc>>,
    pub completed_at: Option<chrono::DateTime<Utc>>,
    pub result: Option<TaskResult>,
}

#[derive(Clone)]
pub struct TaskStore {
    pool: PgPool,
    op_timeout: Duration,
}

impl TaskStore {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                task_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                payload JSONB NOT NULL,
                assigned_agent_id TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                result JSONB,
                queued_at TIMESTAMPTZ NOT NULL,
                dispatched_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts with `status = queued` and `attempts = 0` (spec §4.C
    /// `Create`).
    #[instrument(skip(self, task))]
    pub async fn create(&self, task: &Task) -> Result<(), StoreError> {
        let payload = serde_json::to_value(&task.payload)?;
        sqlx::query(
            "INSERT INTO tasks
                (task_id, status, priority, payload, assigned_agent_id, attempts, result, queued_at, dispatched_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&task.task_id.0)
        .bind(task.status.to_string())
        .bind(task.priority.to_string())
        .bind(payload)
        .bind(task.assigned_agent_id.as_ref().map(|a| a.0.clone()))
        .bind(task.attempts as i32)
        .bind(task.result.as_ref().map(serde_json::to_value).transpose()?)
        .bind(task.queued_at)
        .bind(task.dispatched_at)
        .bind(task.completed_at)
        .execute(&self.pool)
        .await?;

        debug!(task_id = %task.task_id, "created");
        Ok(())
    }

    pub async fn get(&self, task_id: &TaskId) -> Result<Task, StoreError> {
        let row = self.fetch_row(task_id).await?;
        row.ok_or_else(|| StoreError::NotFound(task_id.to_string()))
    }

    /// Validates the transition against the state machine (spec §4.C)
    /// before writing; fails with [`StoreError::IllegalTransition`]
    /// otherwise and leaves the row untouched (spec §7 "Illegal state
    /// transition").
    #[instrument(skip(self, patch))]
    pub async fn update_status(
        &self,
        task_id: &TaskId,
        new_status: TaskStatus,
        patch: TaskPatch,
    ) -> Result<Task, StoreError> {
        let current = self.get(task_id).await?;

        if !is_legal_transition(current.status, new_status) {
            return Err(StoreError::IllegalTransition {
                task_id: task_id.to_string(),
                from: current.status,
                to: new_status,
            });
        }

        let result_json = patch.result.as_ref().map(serde_json::to_value).transpose()?;

        tokio::time::timeout(
            self.op_timeout,
            sqlx::query(
                "UPDATE tasks SET
                    status = $2,
                    assigned_agent_id = COALESCE($3, assigned_agent_id),
                    dispatched_at = COALESCE($4, dispatched_at),
                    completed_at = COALESCE($5, completed_at),
                    result = COALESCE($6, result)
                 WHERE task_id = $1",
            )
            .bind(&task_id.0)
            .bind(new_status.to_string())
            .bind(patch.assigned_agent_id)
            .bind(patch.dispatched_at)
            .bind(patch.completed_at)
            .bind(result_json)
            .execute(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.op_timeout))??;

        debug!(task_id = %task_id, from = %current.status, to = %new_status, "transitioned");
        self.get(task_id).await
    }

    pub async fn increment_attempts(&self, task_id: &TaskId) -> Result<u32, StoreError> {
        let (attempts,): (i32,) = sqlx::query_as(
            "UPDATE tasks SET attempts = attempts + 1 WHERE task_id = $1 RETURNING attempts",
        )
        .bind(&task_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(attempts as u32)
    }

    /// Tasks not in a terminal state (spec §4.C `ListActive`).
    pub async fn list_active(&self) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM tasks WHERE status NOT IN ('completed', 'cancelled', 'failed')",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn fetch_row(&self, task_id: &TaskId) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE task_id = $1")
            .bind(&task_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    task_id: String,
    status: String,
    priority: String,
    payload: serde_json::Value,
    assigned_agent_id: Option<String>,
    attempts: i32,
    result: Option<serde_json::Value>,
    queued_at: chrono::DateTime<Utc>,
    dispatched_at: Option<chrono::DateTime<Utc>>,
    completed_at: Option<chrono::DateTime<Utc>>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = parse_status(&row.status)?;
        let priority = parse_priority(&row.priority)?;

        Ok(Task {
            task_id: TaskId(row.task_id),
            status,
            priority,
            payload: serde_json::from_value::<TaskPayload>(row.payload)?,
            assigned_agent_id: row
                .assigned_agent_id
                .map(agentpool_shared::types::AgentId),
            attempts: row.attempts as u32,
            result: row
                .result
                .map(serde_json::from_value::<TaskResult>)
                .transpose()?,
            queued_at: row.queued_at,
            dispatched_at: row.dispatched_at,
            completed_at: row.completed_at,
        })
    }
}

fn parse_status(s: &str) -> Result<TaskStatus, StoreError> {
    Ok(match s {
        "queued" => TaskStatus::Queued,
        "dispatched" => TaskStatus::Dispatched,
        "running" => TaskStatus::Running,
        "verifying" => TaskStatus::Verifying,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "cancelled" => TaskStatus::Cancelled,
        other => {
            return Err(StoreError::Database(sqlx::Error::Decode(
                format!("unknown task status {other}").into(),
            )))
        }
    })
}

fn parse_priority(s: &str) -> Result<agentpool_shared::types::Priority, StoreError> {
    use agentpool_shared::types::Priority;
    Ok(match s {
        "low" => Priority::Low,
        "normal" => Priority::Normal,
        "high" => Priority::High,
        "critical" => Priority::Critical,
        other => {
            return Err(StoreError::Database(sqlx::Error::Decode(
                format!("unknown priority {other}").into(),
            )))
        }
    })
}
