//! Certificate management
//!
//! The trust anchor used to authenticate the messaging endpoint lives in
//! two slots (primary and backup) plus a metadata record for the primary.
//! Validation is structural only: armor markers, length, a CRC-32 integrity
//! digest and a placeholder one-year expiry. No X.509 parsing is performed.

pub mod anchor;
pub mod manager;
pub mod metadata;
pub mod pem;

pub use anchor::DEVELOPMENT_ANCHOR_PEM;
pub use manager::{
    CertificateManager, LoadedCertificate, ManagerConfig, KEY_BACKUP_CERT, KEY_METADATA,
    KEY_PRIMARY_CERT, PLACEHOLDER_LIFETIME,
};
pub use metadata::{CertificateMetadata, CertificateSource, ValidationResult, METADATA_RECORD_SIZE};
pub use pem::{checksum, fingerprint, is_valid_pem_format, MAX_CERT_SIZE, MIN_CERT_SIZE};
