//! Input validators shared by prompts and configuration.
//!
//! Validators return `None` when the value is acceptable and the message to
//! show otherwise.

use url::Url;

/// Message shown when a required field is left empty.
pub const EMPTY_VALUE_MESSAGE: &str = "Empty value is not allowed";

pub fn validate_non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        Some(EMPTY_VALUE_MESSAGE.to_string())
    } else {
        None
    }
}

/// Accepts absolute http(s) URLs with a host.
pub fn validate_api_endpoint(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return Some(EMPTY_VALUE_MESSAGE.to_string());
    }

    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => None,
        _ => Some("Invalid URL!".to_string()),
    }
}
