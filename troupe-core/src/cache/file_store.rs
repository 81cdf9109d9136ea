//! File-backed key-value store: one file per key in a data directory.

use std::fs;
use std::io;
use std::path::PathBuf;

use super::store::{entry_size, KeyValueStore, StoreError};

const ENTRY_EXTENSION: &str = ".entry";

/// Stores each key as `<data_dir>/<percent-encoded key>.entry`.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
    quota_bytes: Option<u64>,
}

impl FileStore {
    /// Creates a new store rooted at `data_dir`. The directory is created on
    /// first write.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            quota_bytes: None,
        }
    }

    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the file path for a key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}{}", urlencoding::encode(key), ENTRY_EXTENSION))
    }

    fn used_bytes_excluding(&self, key: &str) -> Result<u64, StoreError> {
        let mut used = 0;
        for other in self.keys()? {
            if other == key {
                continue;
            }
            let path = self.path(&other);
            let len = fs::metadata(&path)
                .map_err(|e| StoreError::Io(path, e))?
                .len();
            used += other.len() as u64 + len;
        }
        Ok(used)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StoreError::Io(self.data_dir.clone(), e))?;

        if let Some(quota) = self.quota_bytes {
            let used = self.used_bytes_excluding(key)?;
            let needed = entry_size(key, value);
            if used + needed > quota {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }

        let path = self.path(key);
        fs::write(&path, value).map_err(|e| StoreError::Io(path, e))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(self.data_dir.clone(), e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io(self.data_dir.clone(), e))?;
            let name = entry.file_name();
            let Some(encoded) = name.to_str().and_then(|n| n.strip_suffix(ENTRY_EXTENSION))
            else {
                continue;
            };
            if let Ok(key) = urlencoding::decode(encoded) {
                keys.push(key.into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn quota_bytes(&self) -> Option<u64> {
        self.quota_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (store, _temp) = test_store();
        assert_eq!(store.get("staff").unwrap(), None);
    }

    #[test]
    fn test_keys_on_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("not-yet"));
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_set_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("cache");
        let store = FileStore::new(nested.clone());

        store.set("staff", "[]").unwrap();

        assert!(nested.exists());
        assert_eq!(store.get("staff").unwrap(), Some("[]".to_string()));
    }

    #[test]
    fn test_keys_with_timestamps_roundtrip() {
        let (store, _temp) = test_store();
        let key = "staff_backup_2026-10-19T09:30:00.000001Z";

        store.set(key, "[]").unwrap();
        store.set("staff", "[]").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["staff", key]);
        assert_eq!(store.get(key).unwrap(), Some("[]".to_string()));
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let (store, _temp) = test_store();
        store.remove("nothing").unwrap();
    }

    #[test]
    fn test_ignores_foreign_files() {
        let (store, temp) = test_store();
        store.set("staff", "[]").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "hello").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["staff"]);
    }

    #[test]
    fn test_quota_exceeded() {
        let (store, _temp) = test_store();
        let store = store.with_quota(32);

        store.set("a", "0123456789").unwrap();
        let err = store.set("b", &"x".repeat(40)).unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        assert_eq!(store.get("b").unwrap(), None);
    }
}
