//! Configuration management for the client.

use crate::{validate_api_endpoint, CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default REST API endpoint of the template library service.
pub const DEFAULT_API_ENDPOINT: &str = "https://template-library-radon.xlab.si/api";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Timeout of the `users/current` session probe.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 7;

/// Timeout of template file downloads.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 10;

/// Maximum number of redirect hops followed in one chain.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Login attempts per command before giving up.
pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 3;

/// Protected resource whose redirect leads to the identity broker.
pub const DEFAULT_LOGIN_ENTRY_PATH: &str = "templates";

/// Where the session cookie is kept between invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    /// OS credential store, falling back to the state file.
    #[default]
    Keyring,
    /// `state.json` under the base directory.
    File,
}

impl std::str::FromStr for SessionStoreKind {
    type Err = CoreError;

    fn from_str(value: &str) -> CoreResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(SessionStoreKind::Keyring),
            "file" => Ok(SessionStoreKind::File),
            other => Err(CoreError::Config(format!(
                "Unknown session store '{}', expected keyring or file",
                other
            ))),
        }
    }
}

/// Client configuration, stored as JSON in `~/.template-library/config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Template library REST API endpoint.
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
    /// Path, relative to the endpoint, used to trigger the login redirect.
    #[serde(default = "default_login_entry_path")]
    pub login_entry_path: String,
    #[serde(default)]
    pub session_store: SessionStoreKind,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_endpoint() -> String {
    DEFAULT_API_ENDPOINT.to_string()
}

fn default_probe_timeout_secs() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

fn default_max_login_attempts() -> u32 {
    DEFAULT_MAX_LOGIN_ATTEMPTS
}

fn default_login_entry_path() -> String {
    DEFAULT_LOGIN_ENTRY_PATH.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_endpoint: default_api_endpoint(),
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            login_entry_path: default_login_entry_path(),
            session_store: SessionStoreKind::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("TEMPLATE_LIBRARY_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(endpoint) = std::env::var("TEMPLATE_LIBRARY_API_ENDPOINT") {
            if validate_api_endpoint(&endpoint).is_none() {
                self.api_endpoint = endpoint;
            } else {
                tracing::warn!(endpoint = %endpoint, "Ignoring invalid TEMPLATE_LIBRARY_API_ENDPOINT");
            }
        }
        if let Ok(store) = std::env::var("TEMPLATE_LIBRARY_SESSION_STORE") {
            match store.parse() {
                Ok(kind) => self.session_store = kind,
                Err(err) => tracing::warn!(error = %err, "Ignoring TEMPLATE_LIBRARY_SESSION_STORE"),
            }
        }
    }

    /// Replace the API endpoint after validating it.
    pub fn set_api_endpoint(&mut self, endpoint: &str) -> CoreResult<()> {
        if let Some(message) = validate_api_endpoint(endpoint) {
            return Err(CoreError::Config(message));
        }
        self.api_endpoint = endpoint.trim().to_string();
        Ok(())
    }

    /// The API endpoint as a base URL that relative paths can be joined onto.
    ///
    /// A trailing slash is added so that `api/` + `users/current` keeps the
    /// `api` segment.
    pub fn api_base(&self) -> CoreResult<Url> {
        let mut url = Url::parse(self.api_endpoint.trim())?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.api_endpoint, DEFAULT_API_ENDPOINT);
        assert_eq!(config.probe_timeout(), Duration::from_secs(7));
        assert_eq!(config.download_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert_eq!(config.max_login_attempts, DEFAULT_MAX_LOGIN_ATTEMPTS);
        assert_eq!(config.session_store, SessionStoreKind::Keyring);
    }

    #[test]
    fn test_session_store_kind_from_file_and_text() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "session_store": "file" }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.session_store, SessionStoreKind::File);

        assert_eq!("Keyring".parse::<SessionStoreKind>().unwrap(), SessionStoreKind::Keyring);
        assert!("vault".parse::<SessionStoreKind>().is_err());
    }

    #[test]
    fn test_config_load_from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(&config_path, r#"{ "log_level": "debug" }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.api_endpoint, DEFAULT_API_ENDPOINT);
        assert_eq!(config.login_entry_path, DEFAULT_LOGIN_ENTRY_PATH);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.set_api_endpoint("http://localhost:8080/api").unwrap();
        config.max_login_attempts = 5;
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.probe_timeout_secs, DEFAULT_PROBE_TIMEOUT_SECS);
    }

    #[test]
    fn test_set_api_endpoint_rejects_invalid() {
        let mut config = Config::default();
        assert!(config.set_api_endpoint("").is_err());
        assert!(config.set_api_endpoint("ftp://example.com").is_err());
        assert_eq!(config.api_endpoint, DEFAULT_API_ENDPOINT);
    }

    #[test]
    fn test_api_base_keeps_path_segment() {
        let config = Config::default();
        let base = config.api_base().unwrap();
        assert_eq!(base.as_str(), "https://template-library-radon.xlab.si/api/");
        assert_eq!(
            base.join("users/current").unwrap().as_str(),
            "https://template-library-radon.xlab.si/api/users/current"
        );
    }

    #[test]
    fn test_api_base_invalid_url() {
        let config = Config {
            api_endpoint: "not a valid url".to_string(),
            ..Config::default()
        };
        assert!(config.api_base().is_err());
    }
}
