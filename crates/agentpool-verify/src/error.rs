use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("working directory not found: {0}")]
    WorkingDirMissing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
