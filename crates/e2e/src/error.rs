//! Error types for test-run orchestration

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Configuration error: {0}")]
    Config(#[from] qatrain_common::Error),

    /// The server never became reachable, or could not be spawned
    #[error("Server at {endpoint} failed to start: {reason}")]
    ServerStartup { endpoint: String, reason: String },

    #[error("Server process error: {0}")]
    Process(String),

    /// The fixture script is missing or the database rejected it
    #[error("Database reset failed: {0}")]
    ResetExecution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
