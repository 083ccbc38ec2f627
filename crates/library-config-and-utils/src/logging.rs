//! Logging initialization for the client binaries.
//!
//! Thin wrapper over the observability crate so callers only pick a level.

pub use observability::{init_with_config, LogConfig};

/// Initialize logging for the CLI.
///
/// JSONL goes to `~/.template-library/logs/cli.jsonl`; stderr only shows
/// lines when the level is raised to `debug` or `trace`, so interactive
/// prompts stay readable at the default level.
pub fn init_logging(level: &str) {
    let verbose = matches!(level.to_ascii_lowercase().as_str(), "debug" | "trace");
    init_with_config(LogConfig {
        service_name: "cli".into(),
        default_level: level.into(),
        also_stderr: verbose,
        ..Default::default()
    });
}
