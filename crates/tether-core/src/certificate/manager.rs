//! Certificate Manager
//!
//! Owns the primary and backup certificate slots plus the metadata record
//! describing the primary. All state is durable in the credential store; the
//! manager itself only holds its configuration between `init` and `deinit`.
//!
//! Expiry is a placeholder: `expires_at` is fixed to store time plus 365 days
//! and never read from the certificate itself. Callers must not treat it as
//! the certificate's notAfter.

use super::anchor::DEVELOPMENT_ANCHOR_PEM;
use super::metadata::{
    CertificateMetadata, CertificateSource, ValidationResult, METADATA_RECORD_SIZE,
};
use super::pem::{checksum, is_valid_pem_format, MAX_CERT_SIZE};
use crate::errors::{CertError, CertResult, StoreError};
use crate::storage::{validate_name, CredentialStore};
use crate::types::{TimeSource, Timestamp};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Slot holding the certificate currently in effect
pub const KEY_PRIMARY_CERT: &str = "primary_cert";
/// Slot holding the previous primary after a rotation
pub const KEY_BACKUP_CERT: &str = "backup_cert";
/// Metadata record for the primary
pub const KEY_METADATA: &str = "metadata";

/// Placeholder certificate lifetime applied at store time
pub const PLACEHOLDER_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Certificate manager configuration, immutable after `init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Hand out the compiled-in development anchor when nothing else is usable
    pub allow_development_fallback: bool,
    /// Compare material against the stored checksum during validation
    pub require_integrity_check: bool,
    /// Promote the backup when the primary has expired
    pub auto_rotate_expired: bool,
    /// Credential store namespace for all certificate slots
    pub namespace: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            allow_development_fallback: true,
            require_integrity_check: true,
            auto_rotate_expired: false,
            namespace: "cert_mgr".to_string(),
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

// ----------------------------------------------------------------------------
// Loaded Certificate
// ----------------------------------------------------------------------------

/// Material returned by [`CertificateManager::load`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedCertificate {
    pub pem: String,
    pub size: usize,
    /// Provenance as far as it is known; a backup has no metadata and reports `None`
    pub source: CertificateSource,
}

impl LoadedCertificate {
    fn new(pem: String, source: CertificateSource) -> Self {
        Self {
            size: pem.len(),
            pem,
            source,
        }
    }
}

// ----------------------------------------------------------------------------
// Certificate Manager
// ----------------------------------------------------------------------------

/// Stores, validates and rotates the trust anchor
pub struct CertificateManager {
    storage: Arc<dyn CredentialStore>,
    clock: Arc<dyn TimeSource>,
    config: Option<ManagerConfig>,
}

impl CertificateManager {
    /// Create an uninitialized manager over a store and clock
    pub fn new(storage: Arc<dyn CredentialStore>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            storage,
            clock,
            config: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    /// Active configuration, if initialized
    pub fn config(&self) -> Option<&ManagerConfig> {
        self.config.as_ref()
    }

    /// Initialize with a configuration
    ///
    /// A second call returns `AlreadyInitialized` and keeps the first
    /// configuration; callers may treat that as non-fatal.
    pub fn init(&mut self, config: ManagerConfig) -> CertResult<()> {
        if self.config.is_some() {
            warn!("Certificate manager already initialized");
            return Err(CertError::AlreadyInitialized);
        }

        if validate_name(&config.namespace).is_err() {
            error!("Invalid certificate namespace {:?}", config.namespace);
            return Err(CertError::invalid_argument(format!(
                "invalid namespace {:?}",
                config.namespace
            )));
        }

        info!("Certificate manager initialized");
        info!(
            "  - Development cert allowed: {}",
            yes_no(config.allow_development_fallback)
        );
        info!(
            "  - Integrity check required: {}",
            yes_no(config.require_integrity_check)
        );
        info!("  - Auto-rotate expired: {}", yes_no(config.auto_rotate_expired));
        info!("  - Namespace: {}", config.namespace);

        self.config = Some(config);
        Ok(())
    }

    /// Drop the configuration; every other operation then fails with `NotInitialized`
    pub fn deinit(&mut self) {
        if self.config.take().is_some() {
            info!("Certificate manager deinitialized");
        } else {
            warn!("Certificate manager not initialized");
        }
    }

    fn require_config(&self) -> CertResult<&ManagerConfig> {
        self.config.as_ref().ok_or_else(|| {
            error!("Certificate manager not initialized");
            CertError::NotInitialized
        })
    }

    // ------------------------------------------------------------------------
    // Store
    // ------------------------------------------------------------------------

    /// Persist `pem` as the primary certificate
    ///
    /// The previous metadata record is erased, then material is written
    /// before metadata. If the metadata write fails the call still succeeds:
    /// the material is usable but unvalidated until metadata is rewritten.
    pub fn store(&self, pem: &str, source: CertificateSource) -> CertResult<()> {
        let config = self.require_config()?;

        if !is_valid_pem_format(pem) {
            error!("Invalid PEM certificate format");
            return Err(CertError::InvalidFormat);
        }

        let now = self.clock.now();
        let metadata = CertificateMetadata {
            source,
            checksum: checksum(pem),
            stored_at: now,
            expires_at: now + PLACEHOLDER_LIFETIME,
            size_bytes: pem.len() as u32,
            is_valid: true,
        };

        // Metadata describing the outgoing material must not outlive it
        self.storage
            .erase_key(&config.namespace, KEY_METADATA)
            .map_err(|e| {
                error!("Failed to clear certificate metadata: {}", e);
                CertError::from(e)
            })?;

        self.storage
            .put_string(&config.namespace, KEY_PRIMARY_CERT, pem)
            .map_err(|e| {
                error!("Failed to store certificate: {}", e);
                CertError::from(e)
            })?;

        if let Err(e) = metadata
            .to_record()
            .and_then(|record| self.storage.put_blob(&config.namespace, KEY_METADATA, &record))
        {
            warn!(
                "Failed to store metadata, but certificate stored successfully: {}",
                e
            );
        }

        info!(
            "Certificate stored successfully (source: {}, size: {} bytes)",
            source.source_name(),
            metadata.size_bytes
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------------

    /// Return the best usable trust anchor that fits in `capacity` bytes
    ///
    /// Tiers, in order: validated primary, backup (returned on trust, not
    /// re-validated), development anchor (if allowed).
    pub fn load(&self, capacity: usize) -> CertResult<LoadedCertificate> {
        let config = self.require_config()?;

        match self.load_stored(capacity) {
            Err(CertError::NotFound) if config.allow_development_fallback => {
                ensure_fits(DEVELOPMENT_ANCHOR_PEM, capacity)?;
                warn!("Using development certificate fallback");
                Ok(LoadedCertificate::new(
                    DEVELOPMENT_ANCHOR_PEM.to_string(),
                    CertificateSource::Development,
                ))
            }
            Err(CertError::NotFound) => {
                error!("No valid certificate found");
                Err(CertError::NotFound)
            }
            other => other,
        }
    }

    /// Like [`load`](Self::load) but without the development fallback tier
    pub fn load_stored(&self, capacity: usize) -> CertResult<LoadedCertificate> {
        let config = self.require_config()?;

        if capacity == 0 {
            error!("Invalid buffer capacity");
            return Err(CertError::invalid_argument("buffer capacity must be non-zero"));
        }

        if let Some(primary) = self.read_slot(&config.namespace, KEY_PRIMARY_CERT)? {
            match self.read_metadata(&config.namespace) {
                Ok(Some(metadata)) => {
                    let result = self.validate_with(config, &primary, Some(&metadata));
                    if result.is_valid() {
                        ensure_fits(&primary, capacity)?;
                        info!("Primary certificate loaded and validated successfully");
                        return Ok(LoadedCertificate::new(primary, metadata.source));
                    }

                    warn!("Primary certificate validation failed: {}", result);
                    if result == ValidationResult::Expired && config.auto_rotate_expired {
                        if let Some(loaded) = self.promote_backup(capacity)? {
                            return Ok(loaded);
                        }
                    }
                }
                Ok(None) => warn!("Primary certificate has no metadata; treating as unvalidated"),
                Err(e) => warn!("Primary certificate metadata unreadable: {}", e),
            }
        }

        if let Some(backup) = self.read_slot(&config.namespace, KEY_BACKUP_CERT)? {
            ensure_fits(&backup, capacity)?;
            info!("Backup certificate loaded successfully");
            return Ok(LoadedCertificate::new(backup, CertificateSource::None));
        }

        Err(CertError::NotFound)
    }

    /// Move the backup into the primary slot after the primary expired
    ///
    /// The backup's provenance was never recorded, so it is promoted as
    /// `CertificateSource::None`, the same source `load` reports for it.
    fn promote_backup(&self, capacity: usize) -> CertResult<Option<LoadedCertificate>> {
        let config = self.require_config()?;
        let Some(backup) = self.read_slot(&config.namespace, KEY_BACKUP_CERT)? else {
            return Ok(None);
        };
        ensure_fits(&backup, capacity)?;

        match self.store(&backup, CertificateSource::None) {
            Ok(()) => info!("Expired primary replaced by backup certificate"),
            Err(e) => warn!("Failed to promote backup certificate: {}", e),
        }
        Ok(Some(LoadedCertificate::new(backup, CertificateSource::None)))
    }

    // ------------------------------------------------------------------------
    // Validate
    // ------------------------------------------------------------------------

    /// Classify candidate material
    ///
    /// Checks run format, then integrity against the stored checksum (skipped
    /// when no metadata is stored), then expiry. Only lifecycle misuse is an
    /// error; every candidate maps to exactly one result.
    pub fn validate(&self, pem: &str) -> CertResult<ValidationResult> {
        let config = self.require_config()?;
        let metadata = self.metadata_for_checks(config);
        Ok(self.validate_with(config, pem, metadata.as_ref()))
    }

    fn validate_with(
        &self,
        config: &ManagerConfig,
        pem: &str,
        metadata: Option<&CertificateMetadata>,
    ) -> ValidationResult {
        if !is_valid_pem_format(pem) {
            return ValidationResult::InvalidFormat;
        }

        let digest = checksum(pem);
        if config.require_integrity_check {
            if let Some(stored) = metadata {
                if stored.checksum != digest {
                    warn!("Certificate integrity check failed");
                    return ValidationResult::IntegrityFailed;
                }
            }
        }

        if self.is_expired(digest, metadata) {
            warn!("Certificate has expired");
            return ValidationResult::Expired;
        }

        ValidationResult::Valid
    }

    /// Expiry uses the stored `expires_at` when it describes this material,
    /// otherwise the placeholder lifetime starting now, which cannot have passed
    fn is_expired(&self, digest: u32, metadata: Option<&CertificateMetadata>) -> bool {
        let now = self.clock.now();
        let expires_at = match metadata {
            Some(stored) if stored.checksum == digest => stored.expires_at,
            _ => now + PLACEHOLDER_LIFETIME,
        };
        now > expires_at
    }

    // ------------------------------------------------------------------------
    // Metadata, Validity, Rotation
    // ------------------------------------------------------------------------

    /// Metadata for the current primary
    pub fn get_metadata(&self) -> CertResult<CertificateMetadata> {
        let config = self.require_config()?;
        self.read_metadata(&config.namespace)?
            .ok_or(CertError::NotFound)
    }

    /// Whether the effective anchor validates; all errors read as `false`
    pub fn is_certificate_valid(&self) -> bool {
        if !self.is_initialized() {
            return false;
        }

        match self.load(MAX_CERT_SIZE) {
            Ok(loaded) => matches!(self.validate(&loaded.pem), Ok(ValidationResult::Valid)),
            Err(e) => {
                debug!("No loadable certificate: {}", e);
                false
            }
        }
    }

    /// Replace the primary, keeping the old primary as backup
    ///
    /// The candidate must be well formed and unexpired. The stored checksum
    /// describes the outgoing primary, so the integrity stage does not apply.
    /// Backing up is best effort.
    pub fn rotate(&self, pem: &str, source: CertificateSource) -> CertResult<()> {
        let config = self.require_config()?;

        let candidate_config = ManagerConfig {
            require_integrity_check: false,
            ..config.clone()
        };
        let result = self.validate_with(&candidate_config, pem, None);
        if !result.is_valid() {
            error!("New certificate validation failed: {}", result);
            return Err(CertError::invalid_argument(format!(
                "candidate certificate is {}",
                result
            )));
        }

        match self.read_slot(&config.namespace, KEY_PRIMARY_CERT) {
            Ok(Some(current)) => {
                match self.storage.put_string(&config.namespace, KEY_BACKUP_CERT, &current) {
                    Ok(()) => info!("Current certificate backed up"),
                    Err(e) => warn!("Failed to back up current certificate: {}", e),
                }
            }
            Ok(None) => debug!("No current certificate to back up"),
            Err(e) => warn!("Failed to read current certificate for backup: {}", e),
        }

        self.store(pem, source).map_err(|e| {
            error!("Failed to store new certificate: {}", e);
            e
        })?;

        info!(
            "Certificate rotated successfully (source: {})",
            source.source_name()
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Storage Helpers
    // ------------------------------------------------------------------------

    fn read_slot(&self, namespace: &str, key: &str) -> CertResult<Option<String>> {
        Ok(self.storage.get_string_opt(namespace, key)?)
    }

    fn read_metadata(&self, namespace: &str) -> Result<Option<CertificateMetadata>, StoreError> {
        match self
            .storage
            .get_blob(namespace, KEY_METADATA, METADATA_RECORD_SIZE)
        {
            Ok(record) => CertificateMetadata::from_record(&record).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(StoreError::BufferTooSmall { required, .. }) => Err(StoreError::StorageCorrupt {
                reason: format!("Certificate metadata is {} bytes", required),
            }),
            Err(e) => Err(e),
        }
    }

    /// Metadata used by `validate`; unreadable metadata skips the integrity stage
    fn metadata_for_checks(&self, config: &ManagerConfig) -> Option<CertificateMetadata> {
        match self.read_metadata(&config.namespace) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping integrity check, metadata unreadable: {}", e);
                None
            }
        }
    }

    /// Current time as seen by the manager
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

fn ensure_fits(pem: &str, capacity: usize) -> CertResult<()> {
    if pem.len() > capacity {
        error!(
            "Certificate of {} bytes does not fit buffer of {} bytes",
            pem.len(),
            capacity
        );
        return Err(CertError::invalid_argument(format!(
            "certificate needs {} bytes, buffer holds {}",
            pem.len(),
            capacity
        )));
    }
    Ok(())
}
