//! Credential Store
//!
//! A namespaced, durable key-value store for strings and fixed-size binary
//! records. Every write is atomic and durable on return. The network identity
//! and the certificate manager live in disjoint namespaces.
//!
//! Backends:
//! - `MemoryStore`: concurrent in-memory map (tests, ephemeral runs)
//! - `FileStore`: one directory per namespace, one file per key

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::errors::{StoreError, StoreResult};

/// Longest namespace or key name accepted, matching flash KV partitions
pub const MAX_NAME_LEN: usize = 15;

// ----------------------------------------------------------------------------
// Storage Trait
// ----------------------------------------------------------------------------

/// Namespaced durable key-value storage
///
/// Implementations take `&self` so a single store can be shared between the
/// orchestrator task and configuration-surface request handlers; it is the
/// only synchronization point between them.
pub trait CredentialStore: Send + Sync {
    /// Store a UTF-8 string value
    fn put_string(&self, namespace: &str, key: &str, value: &str) -> StoreResult<()>;

    /// Retrieve a string value
    fn get_string(&self, namespace: &str, key: &str) -> StoreResult<String>;

    /// Store a binary record
    fn put_blob(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Retrieve a binary record no larger than `capacity` bytes
    fn get_blob(&self, namespace: &str, key: &str, capacity: usize) -> StoreResult<Vec<u8>>;

    /// Remove a single key. Removing a missing key succeeds.
    fn erase_key(&self, namespace: &str, key: &str) -> StoreResult<()>;

    /// Remove every key in a namespace
    fn erase_namespace(&self, namespace: &str) -> StoreResult<()>;

    /// Retrieve a string, mapping `NotFound` to `None`
    fn get_string_opt(&self, namespace: &str, key: &str) -> StoreResult<Option<String>> {
        match self.get_string(namespace, key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Check a namespace or key name
///
/// Names are 1..=15 bytes of ASCII alphanumerics, `_` or `-`. The restricted
/// alphabet also keeps names safe to use as file names.
pub fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey {
            name: name.to_string(),
        })
    }
}

pub(crate) fn decode_utf8(namespace: &str, key: &str, bytes: Vec<u8>) -> StoreResult<String> {
    String::from_utf8(bytes).map_err(|_| StoreError::StorageCorrupt {
        reason: format!("{}/{} is not valid UTF-8", namespace, key),
    })
}

pub(crate) fn check_capacity(bytes: &[u8], capacity: usize) -> StoreResult<()> {
    if bytes.len() > capacity {
        return Err(StoreError::BufferTooSmall {
            required: bytes.len(),
            capacity,
        });
    }
    Ok(())
}
