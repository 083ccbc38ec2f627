//! # Observability
//!
//! Logging setup for the Template Library client.
//!
//! Commands are log producers only. They call [`init_with_config`] once at
//! startup and use the standard `tracing` macros everywhere else. Where the
//! lines end up is decided here:
//!
//! - structured JSONL appended to `~/.template-library/logs/cli.jsonl`
//! - optionally a compact human-readable copy on stderr
//!
//! Field values whose names look like credentials (`password`, `cookie`,
//! `token`, ...) are masked before they reach the file.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "cli".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod json_layer;
mod writer;

use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{AppendLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the emitting program, written into every line.
    pub service_name: String,

    /// Default level filter. `RUST_LOG` wins when set.
    pub default_level: String,

    /// Custom log file. Defaults to `~/.template-library/logs/<service>.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Default log file location for a service.
pub fn default_log_path(service_name: &str) -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".template-library")
            .join("logs")
            .join(format!("{}.jsonl", service_name))
    })
}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with a custom configuration.
///
/// Falls back to stderr-only logging when the log file cannot be opened, so a
/// read-only home directory never prevents a command from running. Calling
/// this twice is harmless: the second installation attempt is ignored.
pub fn init_with_config(config: LogConfig) {
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let log_path = config
        .log_path
        .clone()
        .or_else(|| default_log_path(&config.service_name));

    let file_layer = log_path
        .as_ref()
        .and_then(|path| match AppendLogWriter::new(path) {
            Ok(writer) => Some(writer),
            Err(e) => {
                eprintln!("warning: cannot open log file {}: {}", path.display(), e);
                None
            }
        })
        .map(|writer| {
            JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer))
                .with_filter(env_filter())
        });

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(env_filter())
    });

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        if let Some(path) = log_path {
            tracing::debug!(log_path = %path.display(), "observability initialized");
        }
    }
}

pub use tracing::{debug, error, info, instrument, trace, warn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
    }

    #[test]
    fn test_default_log_path_is_per_service() {
        if let Some(path) = default_log_path("cli") {
            assert!(path.ends_with(".template-library/logs/cli.jsonl"));
        }
    }
}
