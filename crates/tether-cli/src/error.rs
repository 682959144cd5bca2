//! Error handling for the Tether CLI

use crate::config::ConfigError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Tether error: {0}")]
    Tether(#[from] tether_core::TetherError),

    #[error("Certificate error: {0}")]
    Certificate(#[from] tether_core::CertError),

    #[error("Identity error: {0}")]
    Identity(#[from] tether_core::IdentityError),

    #[error("Storage error: {0}")]
    Storage(#[from] tether_core::StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Certificate check failed: {0}")]
    CheckFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
