//! Error types for the Confab orchestration core.

use thiserror::Error;

/// A shared error type for the whole orchestration core.
///
/// The variants follow the failure taxonomy of the request path: every error
/// that reaches the user is one of these kinds, already carrying a
/// human-readable message. Nothing below this type is allowed to escape a
/// request unhandled.
#[derive(Error, Debug, Clone)]
pub enum ConfabError {
    /// Missing or unusable configuration (typically an absent credential).
    /// Surfaced verbatim; not retryable without user action.
    #[error("{0}")]
    Config(String),

    /// The remote service or local process could not be reached, returned a
    /// non-success status, or timed out. Surfaced with a short actionable
    /// message; not retried automatically.
    #[error("{0}")]
    Transport(String),

    /// The remote service answered, but the body was malformed or empty.
    #[error("{0}")]
    Protocol(String),

    /// The audio converter process failed. Recovered locally by falling back
    /// to the unconverted audio; only visible if the remote call also fails.
    #[error("Audio conversion failed: {0}")]
    Media(String),

    /// Invariant breach inside the core (should not happen in normal
    /// operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConfabError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a Protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Creates a Media error
    pub fn media(message: impl Into<String>) -> Self {
        Self::Media(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a Config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a Transport error
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if this is a Protocol error
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Check if this is a Media error
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Media(_))
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ConfabError {
    fn from(err: std::io::Error) -> Self {
        Self::Media(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for ConfabError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("Malformed response body: {}", err))
    }
}

/// A type alias for `Result<T, ConfabError>`.
pub type Result<T> = std::result::Result<T, ConfabError>;
