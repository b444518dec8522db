use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus unavailable: {0}")]
    BusUnavailable(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
