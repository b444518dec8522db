use agentpool_shared::types::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("illegal transition from {from:?} to {to:?} for task {task_id}")]
    IllegalTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
