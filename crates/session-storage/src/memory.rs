//! In-memory store.

use crate::{CredentialStore, StorageResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }
}
