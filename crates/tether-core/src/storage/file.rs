//! File-backed credential store
//!
//! Layout: `<root>/<namespace>/<key>`. A write lands in `<key>.tmp`, is
//! fsynced, then renamed over the target. Readers therefore observe either
//! the previous value or the new one, never a partial write.

use super::{check_capacity, decode_utf8, validate_name, CredentialStore};
use crate::errors::{StoreError, StoreResult};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Durable store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open<P: Into<PathBuf>>(root: P) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, namespace: &str, key: &str) -> StoreResult<PathBuf> {
        validate_name(namespace)?;
        validate_name(key)?;
        Ok(self.root.join(namespace).join(key))
    }

    fn write_atomic(&self, namespace: &str, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.slot_path(namespace, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(bytes)?;
            file.flush()?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn read(&self, namespace: &str, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.slot_path(namespace, key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

impl CredentialStore for FileStore {
    fn put_string(&self, namespace: &str, key: &str, value: &str) -> StoreResult<()> {
        self.write_atomic(namespace, key, value.as_bytes())
    }

    fn get_string(&self, namespace: &str, key: &str) -> StoreResult<String> {
        let bytes = self.read(namespace, key)?;
        decode_utf8(namespace, key, bytes)
    }

    fn put_blob(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        self.write_atomic(namespace, key, value)
    }

    fn get_blob(&self, namespace: &str, key: &str, capacity: usize) -> StoreResult<Vec<u8>> {
        let bytes = self.read(namespace, key)?;
        check_capacity(&bytes, capacity)?;
        Ok(bytes)
    }

    fn erase_key(&self, namespace: &str, key: &str) -> StoreResult<()> {
        let path = self.slot_path(namespace, key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn erase_namespace(&self, namespace: &str) -> StoreResult<()> {
        validate_name(namespace)?;
        match fs::remove_dir_all(self.root.join(namespace)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put_string("wifi_creds", "ssid", "Home").unwrap();
            store.put_blob("cert_mgr", "metadata", &[1, 2, 3]).unwrap();
        }

        // A fresh handle sees the same durable state
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get_string("wifi_creds", "ssid").unwrap(), "Home");
        assert_eq!(store.get_blob("cert_mgr", "metadata", 16).unwrap(), vec![1, 2, 3]);
        assert!(!dir.path().join("wifi_creds").join("ssid.tmp").exists());
    }

    #[test]
    fn test_file_store_missing_and_erase() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(store.get_string("wifi_creds", "ssid").unwrap_err().is_not_found());

        // Erasing absent keys and namespaces is not an error
        store.erase_key("wifi_creds", "ssid").unwrap();
        store.erase_namespace("wifi_creds").unwrap();

        store.put_string("wifi_creds", "ssid", "Home").unwrap();
        store.erase_namespace("wifi_creds").unwrap();
        assert!(store.get_string("wifi_creds", "ssid").unwrap_err().is_not_found());
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.put_string("wifi_creds", "../../etc", "x"),
            Err(StoreError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_file_store_blob_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put_blob("cert_mgr", "metadata", &[0u8; 32]).unwrap();

        assert!(matches!(
            store.get_blob("cert_mgr", "metadata", 8),
            Err(StoreError::BufferTooSmall { required: 32, capacity: 8 })
        ));
    }
}
