//! Error types for notewell.

use thiserror::Error;

/// Result type alias using notewell's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for notewell operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Backend data service operation failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(uuid::Uuid),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// No authenticated session or fallback dataset available
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error is transient: the operation may succeed if retried
    /// unchanged (network hiccups, backend unavailability).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Backend(_) | Error::Request(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_backend() {
        let err = Error::Backend("connection refused".to_string());
        assert_eq!(err.to_string(), "Backend error: connection refused");
    }

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("folder".to_string());
        assert_eq!(err.to_string(), "Not found: folder");
    }

    #[test]
    fn test_error_display_note_not_found() {
        let id = Uuid::nil();
        let err = Error::NoteNotFound(id);
        assert_eq!(err.to_string(), format!("Note not found: {}", id));
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("empty tag name".to_string());
        assert_eq!(err.to_string(), "Invalid input: empty tag name");
    }

    #[test]
    fn test_error_display_unauthorized() {
        let err = Error::Unauthorized("no session".to_string());
        assert_eq!(err.to_string(), "Unauthorized: no session");
    }

    #[test]
    fn test_is_transient() {
        assert!(Error::Backend("down".into()).is_transient());
        assert!(Error::Request("timeout".into()).is_transient());
        assert!(!Error::InvalidInput("bad".into()).is_transient());
        assert!(!Error::NoteNotFound(Uuid::nil()).is_transient());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => {
                assert!(!msg.is_empty());
            }
            _ => panic!("Expected Serialization error"),
        }
    }
}
