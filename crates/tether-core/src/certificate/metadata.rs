//! Certificate provenance and the persisted metadata record

use crate::errors::{StoreError, StoreResult};
use crate::types::Timestamp;
use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Certificate Source
// ----------------------------------------------------------------------------

/// Where trust material came from, ordered by decreasing trust
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateSource {
    Manufacturing,
    OtaUpdate,
    ConfigEndpoint,
    Development,
    None,
}

impl CertificateSource {
    /// Stable upper-case name used in logs and operator output
    pub const fn source_name(self) -> &'static str {
        match self {
            CertificateSource::Manufacturing => "MANUFACTURING",
            CertificateSource::OtaUpdate => "OTA_UPDATE",
            CertificateSource::ConfigEndpoint => "CONFIG_ENDPOINT",
            CertificateSource::Development => "DEVELOPMENT",
            CertificateSource::None => "NONE",
        }
    }

    /// Parse a name produced by [`source_name`](Self::source_name), case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let source = match name.to_ascii_uppercase().as_str() {
            "MANUFACTURING" => CertificateSource::Manufacturing,
            "OTA_UPDATE" => CertificateSource::OtaUpdate,
            "CONFIG_ENDPOINT" => CertificateSource::ConfigEndpoint,
            "DEVELOPMENT" => CertificateSource::Development,
            "NONE" => CertificateSource::None,
            _ => return None,
        };
        Some(source)
    }
}

impl fmt::Display for CertificateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_name())
    }
}

// ----------------------------------------------------------------------------
// Metadata Record
// ----------------------------------------------------------------------------

/// Size of the encoded metadata record
pub const METADATA_RECORD_SIZE: usize = 29;

/// Metadata describing the current primary certificate
///
/// Encoded with bincode's fixed-width little-endian layout: a 4-byte source
/// tag, checksum, two 8-byte timestamps, size and a validity byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub source: CertificateSource,
    pub checksum: u32,
    pub stored_at: Timestamp,
    /// Placeholder expiry fixed at store time, not read from the certificate
    pub expires_at: Timestamp,
    pub size_bytes: u32,
    pub is_valid: bool,
}

impl CertificateMetadata {
    /// Encode into the fixed-size record
    pub fn to_record(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::StorageCorrupt {
            reason: format!("Failed to encode certificate metadata: {}", e),
        })
    }

    /// Decode a fixed-size record
    pub fn from_record(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() != METADATA_RECORD_SIZE {
            return Err(StoreError::StorageCorrupt {
                reason: format!(
                    "Certificate metadata is {} bytes, expected {}",
                    bytes.len(),
                    METADATA_RECORD_SIZE
                ),
            });
        }

        bincode::deserialize(bytes).map_err(|e| StoreError::StorageCorrupt {
            reason: format!("Failed to decode certificate metadata: {}", e),
        })
    }
}

// ----------------------------------------------------------------------------
// Validation Result
// ----------------------------------------------------------------------------

/// Outcome of validating candidate material; exactly one applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationResult {
    Valid,
    InvalidFormat,
    Expired,
    IntegrityFailed,
}

impl ValidationResult {
    pub fn is_valid(self) -> bool {
        self == ValidationResult::Valid
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationResult::Valid => "valid",
            ValidationResult::InvalidFormat => "invalid format",
            ValidationResult::Expired => "expired",
            ValidationResult::IntegrityFailed => "integrity failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CertificateMetadata {
        CertificateMetadata {
            source: CertificateSource::OtaUpdate,
            checksum: 0xdead_beef,
            stored_at: Timestamp::from_micros(5),
            expires_at: Timestamp::from_micros(10),
            size_bytes: 1234,
            is_valid: true,
        }
    }

    #[test]
    fn test_record_layout_is_fixed() {
        let record = sample().to_record().unwrap();
        assert_eq!(record.len(), METADATA_RECORD_SIZE);
        // Source tag is the first little-endian u32
        assert_eq!(&record[..4], &[1, 0, 0, 0]);
        assert_eq!(CertificateMetadata::from_record(&record).unwrap(), sample());
    }

    #[test]
    fn test_truncated_or_garbled_record_is_corrupt() {
        let record = sample().to_record().unwrap();
        assert!(matches!(
            CertificateMetadata::from_record(&record[..20]),
            Err(StoreError::StorageCorrupt { .. })
        ));

        let mut bad_tag = record.clone();
        bad_tag[0] = 9;
        assert!(matches!(
            CertificateMetadata::from_record(&bad_tag),
            Err(StoreError::StorageCorrupt { .. })
        ));
    }

    #[test]
    fn test_source_names() {
        assert_eq!(CertificateSource::ConfigEndpoint.source_name(), "CONFIG_ENDPOINT");
        assert_eq!(
            CertificateSource::from_name("ota_update"),
            Some(CertificateSource::OtaUpdate)
        );
        assert_eq!(CertificateSource::from_name("vendor"), None);
    }
}
