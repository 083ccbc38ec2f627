//! JSON file backed store.

use crate::{CredentialStore, StorageError, StorageResult};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores every key as a string entry of one JSON object on disk.
///
/// The file is re-read on each access so that concurrent CLI invocations see
/// each other's writes; writes go through a temporary file and a rename.
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> StorageResult<Map<String, Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StorageError::Encoding(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(StorageError::Encoding(e.to_string())),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(map)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = open_private(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl CredentialStore for FileCredentialStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(path = %self.path.display(), key = %key, "Setting stored value");
        let _guard = self.write_lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let map = self.read_map()?;
        match map.get(key) {
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(StorageError::Encoding(format!(
                "value for {} is not a string",
                key
            ))),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(path = %self.path.display(), key = %key, "Deleting stored value");
        let _guard = self.write_lock.lock();
        let mut map = self.read_map()?;
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.write_map(&map)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("state.json"));

        assert_eq!(store.get("anything").unwrap(), None);
        assert!(!store.delete("anything").unwrap());
    }

    #[test]
    fn test_values_survive_new_instance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        FileCredentialStore::new(&path).set("k", "v").unwrap();

        let reopened = FileCredentialStore::new(&path);
        assert_eq!(reopened.get("k").unwrap(), Some("v".to_string()));
        assert!(reopened.delete("k").unwrap());
        assert_eq!(FileCredentialStore::new(&path).get("k").unwrap(), None);
    }

    #[test]
    fn test_other_keys_are_preserved() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("state.json"));

        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.delete("a").unwrap();

        assert_eq!(store.get("b").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_corrupt_file_is_an_encoding_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(matches!(store.get("a"), Err(StorageError::Encoding(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        FileCredentialStore::new(&path).set("k", "v").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
