//! Persistent storage for the client's session record.
//!
//! The add-on keeps exactly one secret across restarts: the serialized
//! session cookie. Backends implement [`CredentialStore`]:
//! - **Keyring**: the OS credential store (feature `system-keyring`, default)
//! - **File**: JSON object in `~/.template-library/state.json` (0600 on unix),
//!   used when configured or when no keychain answers
//! - **Memory**: process-local map, used by tests and one-shot sessions

mod file;
mod keys;
#[cfg(feature = "system-keyring")]
mod keychain;
mod memory;
mod records;
mod traits;

pub use file::FileCredentialStore;
pub use keys::StorageKeys;
#[cfg(feature = "system-keyring")]
pub use keychain::KeyringCredentialStore;
pub use memory::MemoryCredentialStore;
pub use records::SessionRecords;
pub use traits::CredentialStore;

use library_config_and_utils::{Paths, SessionStoreKind};
use thiserror::Error;
use tracing::{info, warn};

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the store `kind` asks for.
///
/// `Keyring` falls back to the state file when the OS credential store is
/// missing or does not answer.
pub fn create_store(paths: &Paths, kind: SessionStoreKind) -> StorageResult<Box<dyn CredentialStore>> {
    if kind == SessionStoreKind::Keyring {
        if let Some(store) = keyring_store() {
            return Ok(store);
        }
        warn!(
            path = %paths.state_file().display(),
            "System keyring unavailable; keeping the session in the state file"
        );
    }
    info!(path = %paths.state_file().display(), "Using file session store");
    Ok(Box::new(FileCredentialStore::new(paths.state_file())))
}

#[cfg(feature = "system-keyring")]
fn keyring_store() -> Option<Box<dyn CredentialStore>> {
    KeyringCredentialStore::is_available()
        .then(|| Box::new(KeyringCredentialStore::new()) as Box<dyn CredentialStore>)
}

#[cfg(not(feature = "system-keyring"))]
fn keyring_store() -> Option<Box<dyn CredentialStore>> {
    None
}

/// Create a [`SessionRecords`] over the store `kind` asks for.
pub fn create_session_records(paths: &Paths, kind: SessionStoreKind) -> StorageResult<SessionRecords> {
    Ok(SessionRecords::new(create_store(paths, kind)?))
}
