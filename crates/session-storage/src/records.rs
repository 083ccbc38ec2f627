//! High-level API over the credential store.

use crate::{CredentialStore, StorageKeys, StorageResult};

/// Typed access to the records the client persists.
pub struct SessionRecords {
    store: Box<dyn CredentialStore>,
}

impl SessionRecords {
    pub fn new(store: Box<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// The stored session cookie, in `Set-Cookie` syntax.
    pub fn get_session_cookie(&self) -> StorageResult<Option<String>> {
        self.store.get(StorageKeys::SESSION_COOKIE)
    }

    /// Store (or overwrite) the session cookie.
    pub fn set_session_cookie(&self, cookie: &str) -> StorageResult<()> {
        self.store.set(StorageKeys::SESSION_COOKIE, cookie)
    }

    pub fn has_session_cookie(&self) -> StorageResult<bool> {
        self.store.has(StorageKeys::SESSION_COOKIE)
    }

    /// Remove the stored session cookie. Returns whether one existed.
    pub fn clear_session_cookie(&self) -> StorageResult<bool> {
        self.store.delete(StorageKeys::SESSION_COOKIE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCredentialStore;

    #[test]
    fn test_session_cookie_lifecycle() {
        let records = SessionRecords::new(Box::new(MemoryCredentialStore::new()));

        assert!(!records.has_session_cookie().unwrap());

        records
            .set_session_cookie("_forward_auth=abc; Domain=example.com; Path=/")
            .unwrap();
        records
            .set_session_cookie("_forward_auth=def; Domain=example.com; Path=/")
            .unwrap();
        assert_eq!(
            records.get_session_cookie().unwrap().as_deref(),
            Some("_forward_auth=def; Domain=example.com; Path=/")
        );

        assert!(records.clear_session_cookie().unwrap());
        assert!(!records.clear_session_cookie().unwrap());
        assert!(records.get_session_cookie().unwrap().is_none());
    }
}
