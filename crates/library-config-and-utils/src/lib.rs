//! Configuration, paths and shared helpers for the Template Library client.

mod config;
mod error;
mod logging;
mod paths;
mod validate;

pub use config::{
    Config, DEFAULT_API_ENDPOINT, DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_LOGIN_ENTRY_PATH,
    DEFAULT_LOG_LEVEL, DEFAULT_MAX_LOGIN_ATTEMPTS, DEFAULT_MAX_REDIRECTS,
    DEFAULT_PROBE_TIMEOUT_SECS, SessionStoreKind,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
pub use validate::{validate_api_endpoint, validate_non_empty, EMPTY_VALUE_MESSAGE};
