//! OS credential store backend.

use crate::{CredentialStore, StorageError, StorageResult};
use tracing::{debug, instrument};

/// Keeps each key as one entry of the platform keychain (macOS Keychain,
/// Windows Credential Manager, Linux kernel keyring).
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringCredentialStore {
    /// Service name the entries are filed under.
    pub const SERVICE_NAME: &'static str = "template-library";

    pub fn new() -> Self {
        Self::with_service(Self::SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Whether the platform keychain answers at all.
    pub fn is_available() -> bool {
        let entry = match keyring::Entry::new(Self::SERVICE_NAME, "availability-check") {
            Ok(entry) => entry,
            Err(_) => return false,
        };
        match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => true,
            Err(keyring::Error::NoStorageAccess(_)) | Err(keyring::Error::PlatformFailure(_)) => {
                false
            }
            Err(_) => true,
        }
    }

    fn entry(&self, key: &str) -> StorageResult<keyring::Entry> {
        keyring::Entry::new(&self.service, key).map_err(backend_error)
    }
}

fn backend_error(err: keyring::Error) -> StorageError {
    StorageError::Backend(format!("Keyring error: {}", err))
}

impl CredentialStore for KeyringCredentialStore {
    #[instrument(skip(self, value))]
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entry(key)?.set_password(value).map_err(backend_error)?;
        debug!(service = %self.service, "Stored keyring entry");
        Ok(())
    }

    #[instrument(skip(self))]
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::BadEncoding(_)) => Err(StorageError::Encoding(format!(
                "keyring entry {} is not valid UTF-8",
                key
            ))),
            Err(err) => Err(backend_error(err)),
        }
    }

    #[instrument(skip(self))]
    fn delete(&self, key: &str) -> StorageResult<bool> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(backend_error(err)),
        }
    }
}
