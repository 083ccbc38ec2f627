//! Authentication error types.

use cookie_http::HttpError;
use library_config_and_utils::CoreError;
use session_storage::StorageError;
use step_flow::PromptError;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No response from the session probe, or a 5xx answer.
    #[error("Template library REST API is not reachable: {reason}")]
    ServiceUnreachable { reason: String },

    /// The broker page lists no identity providers. Only logged; native
    /// login stays available.
    #[error("No identity providers found on {url}")]
    ProviderPageUnparseable { url: String },

    /// Credentials were submitted but the session is still not valid.
    #[error("{provider} login attempt has failed")]
    LoginRejected { provider: String },

    /// The user dismissed a login prompt.
    #[error("Login cancelled")]
    UserCancelled,

    #[error("Redirect loop: more than {limit} redirects starting at {url}")]
    RedirectLoop { url: String, limit: usize },

    #[error("No login form found on {url}")]
    LoginFormNotFound { url: String },

    /// The protected resource answered without redirecting to the broker.
    #[error("{url} did not redirect to a login page")]
    MissingLoginRedirect { url: String },

    #[error("Login failed after {0} attempts")]
    LoginAttemptsExhausted(u32),

    #[error("HTTP error: {0}")]
    Http(#[source] HttpError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),

    /// Invalid state transition in the login FSM
    #[error("Invalid login state transition: {0}")]
    InvalidStateTransition(String),
}

impl From<HttpError> for AuthError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::TooManyRedirects { url, limit } => AuthError::RedirectLoop { url, limit },
            other => AuthError::Http(other),
        }
    }
}

impl AuthError {
    /// Errors that end the command. Everything else is handled inside the
    /// login loop or is a user decision.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AuthError::ProviderPageUnparseable { .. }
                | AuthError::LoginRejected { .. }
                | AuthError::UserCancelled
        )
    }

    /// Errors that should end the command with a notice instead of an error.
    pub fn is_quiet(&self) -> bool {
        matches!(self, AuthError::UserCancelled)
    }

    /// Errors after which the login flow starts over.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AuthError::LoginRejected { .. })
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_redirects_becomes_redirect_loop() {
        let err: AuthError = HttpError::TooManyRedirects {
            url: "https://library.example/templates".to_string(),
            limit: 20,
        }
        .into();

        assert!(matches!(err, AuthError::RedirectLoop { limit: 20, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_cancel_is_quiet_and_not_fatal() {
        assert!(AuthError::UserCancelled.is_quiet());
        assert!(!AuthError::UserCancelled.is_fatal());
    }

    #[test]
    fn test_rejection_is_recoverable() {
        let err = AuthError::LoginRejected {
            provider: "native".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "native login attempt has failed");
    }

    #[test]
    fn test_unreachable_is_fatal() {
        let err = AuthError::ServiceUnreachable {
            reason: "HTTP 503".to_string(),
        };
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
        assert!(!err.is_quiet());
    }
}
