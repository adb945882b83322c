//! Error types for the QA training harness

use thiserror::Error;

/// Result type alias using the harness configuration error
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and resolution errors
#[derive(Error, Debug)]
pub enum Error {
    /// The connection string could not be parsed or lacks a database name
    #[error("Invalid connection string '{raw}': {message}")]
    Configuration { raw: String, message: String },

    #[error("Missing setting: {0} is not set")]
    MissingSetting(&'static str),

    #[error("Unknown reset trigger: {0}")]
    InvalidTrigger(String),

    #[error("Invalid base URL '{raw}': {message}")]
    InvalidBaseUrl { raw: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn configuration(raw: &str, message: impl Into<String>) -> Self {
        Error::Configuration {
            raw: raw.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error came from connection string resolution
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. } | Error::MissingSetting(_))
    }
}
