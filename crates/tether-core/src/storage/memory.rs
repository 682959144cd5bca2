//! In-memory credential store

use super::{check_capacity, decode_utf8, validate_name, CredentialStore};
use crate::errors::{StoreError, StoreResult};
use dashmap::{DashMap, DashSet};

type Slot = (String, String);

/// In-memory store for tests and ephemeral runs
///
/// Writes to specific keys can be made to fail, which lets tests exercise the
/// degraded paths of components layered on top.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: DashMap<Slot, Vec<u8>>,
    failing_writes: DashSet<Slot>,
}

impl MemoryStore {
    /// Create a new, empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write to `namespace/key` fail with an I/O error
    pub fn fail_writes_to(&self, namespace: &str, key: &str) {
        self.failing_writes
            .insert((namespace.to_string(), key.to_string()));
    }

    /// Remove all injected write failures
    pub fn clear_write_failures(&self) {
        self.failing_writes.clear();
    }

    /// Overwrite a stored value without validation, simulating flash corruption
    pub fn corrupt(&self, namespace: &str, key: &str, bytes: Vec<u8>) {
        self.data
            .insert((namespace.to_string(), key.to_string()), bytes);
    }

    /// Whether a value is present
    pub fn contains(&self, namespace: &str, key: &str) -> bool {
        self.data
            .contains_key(&(namespace.to_string(), key.to_string()))
    }

    fn put(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        validate_name(namespace)?;
        validate_name(key)?;

        let slot = (namespace.to_string(), key.to_string());
        if self.failing_writes.contains(&slot) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("injected write failure for {}/{}", namespace, key),
            )));
        }

        self.data.insert(slot, bytes);
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> StoreResult<Vec<u8>> {
        validate_name(namespace)?;
        validate_name(key)?;

        self.data
            .get(&(namespace.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })
    }
}

impl CredentialStore for MemoryStore {
    fn put_string(&self, namespace: &str, key: &str, value: &str) -> StoreResult<()> {
        self.put(namespace, key, value.as_bytes().to_vec())
    }

    fn get_string(&self, namespace: &str, key: &str) -> StoreResult<String> {
        let bytes = self.get(namespace, key)?;
        decode_utf8(namespace, key, bytes)
    }

    fn put_blob(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        self.put(namespace, key, value.to_vec())
    }

    fn get_blob(&self, namespace: &str, key: &str, capacity: usize) -> StoreResult<Vec<u8>> {
        let bytes = self.get(namespace, key)?;
        check_capacity(&bytes, capacity)?;
        Ok(bytes)
    }

    fn erase_key(&self, namespace: &str, key: &str) -> StoreResult<()> {
        validate_name(namespace)?;
        validate_name(key)?;
        self.data.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    fn erase_namespace(&self, namespace: &str) -> StoreResult<()> {
        validate_name(namespace)?;
        self.data.retain(|(ns, _), _| ns != namespace);
        Ok(())
    }
}
