use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Bus(#[from] agentpool_bus::BusError),

    #[error(transparent)]
    Store(#[from] agentpool_store::StoreError),

    #[error(transparent)]
    Verify(#[from] agentpool_verify::VerifyError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
