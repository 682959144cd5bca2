//! Error types for Tether
//!
//! Each concern carries its own error enum (storage, certificates, identity)
//! and `TetherError` unifies them for callers that cross concerns, such as the
//! orchestrator's event task.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Credential store faults
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Key not found: {namespace}/{key}")]
    NotFound { namespace: String, key: String },

    #[error("Stored value needs {required} bytes but buffer holds {capacity}")]
    BufferTooSmall { required: usize, capacity: usize },

    #[error("Storage corrupt: {reason}")]
    StorageCorrupt { reason: String },

    #[error("Invalid namespace or key name: {name:?}")]
    InvalidKey { name: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error means the key simply has no value yet
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Certificate manager failures
///
/// `InvalidFormat`, `Expired` and `IntegrityFailed` describe defective trust
/// material and are never accepted silently.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Certificate manager not initialized")]
    NotInitialized,

    #[error("Certificate manager already initialized")]
    AlreadyInitialized,

    #[error("No usable certificate found")]
    NotFound,

    #[error("Invalid PEM certificate format")]
    InvalidFormat,

    #[error("Certificate has expired")]
    Expired,

    #[error("Certificate integrity check failed")]
    IntegrityFailed,

    #[error("Certificate storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CertError {
    /// Create an invalid argument error with a reason
    pub fn invalid_argument<T: Into<String>>(reason: T) -> Self {
        CertError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Network identity parsing and persistence failures
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Request too long ({length} bytes, max {max})")]
    RequestTooLong { length: usize, max: usize },

    #[error("Identity storage error: {0}")]
    Storage(#[from] StoreError),
}

impl IdentityError {
    /// Create an invalid field error with a reason
    pub fn invalid_field<T: Into<String>>(field: &'static str, reason: T) -> Self {
        IdentityError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for Tether
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] crate::protocol::StateTransitionError),

    /// Event queue or task channel failure
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Platform capability failure (radio, portal, messaging client)
    #[error("Platform error: {reason}")]
    Platform { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl TetherError {
    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        TetherError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        TetherError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a platform capability error with a reason
    pub fn platform_error<T: Into<String>>(reason: T) -> Self {
        TetherError::Platform {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, TetherError>;
pub type StoreResult<T> = core::result::Result<T, StoreError>;
pub type CertResult<T> = core::result::Result<T, CertError>;
