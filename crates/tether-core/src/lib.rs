//! Tether Core
//!
//! Stable building blocks for bringing a device from power-on to a secured
//! messaging session:
//! - `storage`: namespaced, durable key-value credential storage
//! - `identity`: the network identity persisted by provisioning
//! - `certificate`: trust-anchor storage, validation and rotation
//! - `status`: the single-writer connection status register
//! - `protocol`: the pure bootstrap state machine
//!
//! Nothing in this crate performs network I/O. Side effects are described as
//! [`protocol::Effect`] values and executed by `tether-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod certificate;
pub mod errors;
pub mod identity;
pub mod protocol;
pub mod status;
pub mod storage;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use certificate::{
    CertificateManager, CertificateMetadata, CertificateSource, LoadedCertificate, ManagerConfig,
    ValidationResult,
};
pub use errors::{CertError, IdentityError, Result, StoreError, TetherError};
pub use identity::{BrokerAuth, BrokerEndpoint, IdentityStore, NetworkIdentity};
pub use protocol::{
    BootMode, BootPhase, Effect, Event, OrchestratorState, SessionEvent, StateTransition,
    StatusColor,
};
pub use status::{ConnectionState, StatusReader, StatusRegister, StatusWriter};
pub use storage::{CredentialStore, FileStore, MemoryStore};
pub use types::{MonotonicTimeSource, TimeSource, Timestamp};
