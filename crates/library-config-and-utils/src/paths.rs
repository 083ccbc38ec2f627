//! File system paths for the client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths under `~/.template-library`.
#[derive(Debug, Clone)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.template-library`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".template-library"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// `config.json` under the base directory.
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Persisted editor-style global state (the session cookie lives here).
    pub fn state_file(&self) -> PathBuf {
        self.base_dir.join("state.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
