//! Error types for the homewatch service

use crate::field::SensorField;

/// Errors that can occur in the homewatch service
#[derive(Debug, thiserror::Error)]
pub enum HomewatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Subscription to {path} failed: {message}")]
    Subscription { path: String, message: String },

    #[error("Write to {path} failed: {message}")]
    Write { path: String, message: String },

    #[error("Malformed value for {field}: {message}")]
    MalformedValue { field: SensorField, message: String },

    #[error("Brightness must be between 0 and 100, got {0}")]
    InvalidBrightness(i64),
}

/// Result type alias for homewatch operations
pub type Result<T> = std::result::Result<T, HomewatchError>;
