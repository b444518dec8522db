//! Top-level error type for boundaries that need a single error (the CLI,
//! the server binary). Component crates keep their own `thiserror` enums and
//! convert into this one only when crossing a boundary.

use thiserror::Error;

pub type AgentPoolResult<T> = Result<T, AgentPoolError>;

#[derive(Debug, Error)]
pub enum AgentPoolError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("verification error: {0}")]
    Verify(String),

    #[error("recovery error: {0}")]
    Recovery(String),

    #[error("coordinator error: {0}")]
    Coordinator(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("illegal state transition: {0}")]
    IllegalTransition(String),
}
