//! Error types for chatstore
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for chatstore operations
///
/// This enum encompasses all possible errors that can occur during
/// session management, message mutation, streaming, searching, and
/// snapshot persistence.
#[derive(Error, Debug)]
pub enum ChatStoreError {
    /// Input validation errors (empty or oversized content, bad patches)
    ///
    /// Raised before any state mutation; the store is guaranteed to be
    /// unchanged when this error is returned.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation referenced a session id that does not exist
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Operation referenced a message id that does not exist in the session
    #[error("Message not found: session={session_id}, message={message_id}")]
    MessageNotFound {
        /// Session the lookup was scoped to
        session_id: String,
        /// Message id that was not found
        message_id: String,
    },

    /// A stream is already active for the session
    ///
    /// `send_stream_message` requires the previous stream to be stopped
    /// first; the controller never silently duplicates entries.
    #[error("A stream is already active for session: {0}")]
    StreamActive(String),

    /// Stream source failure (setup or mid-stream)
    #[error("Stream error: {0}")]
    Stream(String),

    /// Transport failure for non-streamed exchanges
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unknown template id
    #[error("Template not found: {0}")]
    Template(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session export/import errors
    #[error("Export error: {0}")]
    Export(String),

    /// Snapshot storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite errors from the snapshot store
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for chatstore operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let error = ChatStoreError::Validation("message content is empty".to_string());
        assert_eq!(
            error.to_string(),
            "Validation error: message content is empty"
        );
    }

    #[test]
    fn test_session_not_found_display() {
        let error = ChatStoreError::SessionNotFound("01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string());
        assert_eq!(
            error.to_string(),
            "Session not found: 01ARZ3NDEKTSV4RRFFQ69G5FAV"
        );
    }

    #[test]
    fn test_message_not_found_display() {
        let error = ChatStoreError::MessageNotFound {
            session_id: "s1".to_string(),
            message_id: "m1".to_string(),
        };
        let s = error.to_string();
        assert!(s.contains("session=s1"));
        assert!(s.contains("message=m1"));
    }

    #[test]
    fn test_stream_active_display() {
        let error = ChatStoreError::StreamActive("s1".to_string());
        assert_eq!(
            error.to_string(),
            "A stream is already active for session: s1"
        );
    }

    #[test]
    fn test_stream_error_display() {
        let error = ChatStoreError::Stream("connection reset".to_string());
        assert_eq!(error.to_string(), "Stream error: connection reset");
    }

    #[test]
    fn test_template_error_display() {
        let error = ChatStoreError::Template("unknown_preset".to_string());
        assert_eq!(error.to_string(), "Template not found: unknown_preset");
    }

    #[test]
    fn test_storage_error_display() {
        let error = ChatStoreError::Storage("database locked".to_string());
        assert_eq!(error.to_string(), "Storage error: database locked");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: ChatStoreError = io_error.into();
        assert!(matches!(error, ChatStoreError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let error: ChatStoreError = json_error.into();
        assert!(matches!(error, ChatStoreError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: ChatStoreError = yaml_error.into();
        assert!(matches!(error, ChatStoreError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChatStoreError>();
    }
}
