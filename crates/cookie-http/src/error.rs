//! HTTP error types.

use crate::HttpExchange;
use thiserror::Error;
use url::Url;

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    /// DNS resolution failure or refused connection.
    Connect,
    Other,
}

/// HTTP error type.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The server answered with a status in [400, 599].
    #[error("HTTP {} from {}", .0.status, .0.url)]
    Status(Box<HttpExchange>),

    /// No response was received.
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        kind: TransportKind,
        #[source]
        source: reqwest::Error,
    },

    /// A redirect chain exceeded the hop limit.
    #[error("Too many redirects (limit {limit}) starting at {url}")]
    TooManyRedirects { url: String, limit: usize },

    /// A 3xx response without a usable Location header.
    #[error("Redirect from {url} has no usable Location header")]
    MissingLocation { url: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HttpError {
    pub(crate) fn transport(url: &Url, source: reqwest::Error) -> Self {
        let kind = if source.is_timeout() {
            TransportKind::Timeout
        } else if source.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Other
        };

        HttpError::Transport {
            url: url.to_string(),
            kind,
            source,
        }
    }

    /// True for failures meaning the service could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            HttpError::Transport {
                kind: TransportKind::Timeout | TransportKind::Connect,
                ..
            }
        )
    }

    /// Status code of an error response.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status(exchange) => Some(exchange.status),
            _ => None,
        }
    }

    /// The error response, if the server answered.
    pub fn exchange(&self) -> Option<&HttpExchange> {
        match self {
            HttpError::Status(exchange) => Some(exchange),
            _ => None,
        }
    }
}

/// Result type alias using HttpError.
pub type HttpResult<T> = Result<T, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpExchange;
    use reqwest::header::HeaderMap;
    use reqwest::Method;

    fn exchange(status: u16) -> HttpExchange {
        HttpExchange {
            method: Method::GET,
            url: Url::parse("https://library.example/api/users/current").unwrap(),
            status,
            headers: HeaderMap::new(),
            body: bytes::Bytes::new(),
        }
    }

    #[test]
    fn test_status_error_reports_code() {
        let err = HttpError::Status(Box::new(exchange(503)));
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_unreachable());
        assert_eq!(
            err.to_string(),
            "HTTP 503 from https://library.example/api/users/current"
        );
    }

    #[test]
    fn test_redirect_errors_are_not_unreachable() {
        let err = HttpError::TooManyRedirects {
            url: "https://library.example/".to_string(),
            limit: 20,
        };
        assert!(!err.is_unreachable());
        assert_eq!(err.status(), None);
    }
}
