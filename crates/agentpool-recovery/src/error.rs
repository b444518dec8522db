use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("unknown task {0}")]
    UnknownTask(String),
}
