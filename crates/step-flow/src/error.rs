//! Prompt error types.

use thiserror::Error;

/// Failure of the prompt backend itself. User choices (back, cancel,
/// dismissal) are never errors; they arrive as [`crate::FlowSignal`]s.
#[derive(Error, Debug)]
pub enum PromptError {
    /// Terminal or other I/O failure while rendering or reading input.
    #[error("Prompt I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The widget was used after it had been disposed.
    #[error("Prompt widget is closed")]
    Closed,

    /// Backend specific failure.
    #[error("Prompt backend error: {0}")]
    Backend(String),
}

/// Result type alias using PromptError.
pub type PromptResult<T> = Result<T, PromptError>;
