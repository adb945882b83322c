//! QA Training Harness Common Library
//!
//! Connection string resolution, reset policy and configuration shared by the
//! test runner and the operator CLI. Nothing here performs I/O beyond reading
//! a configuration file.

pub mod config;
pub mod connection;
pub mod error;
pub mod policy;

// Re-export commonly used types
pub use config::{DatabaseSettings, HarnessConfig, ServerSettings};
pub use connection::{resolve, ConnectionDescriptor, CredentialOverrides};
pub use error::{Error, Result};
pub use policy::{decide, parse_flag, ResetDecision, ResetFlags, ResetTrigger, SkipReason};

/// Harness version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file looked up in the working directory
pub fn default_config_path() -> std::path::PathBuf {
    std::path::PathBuf::from("qatrain.toml")
}
