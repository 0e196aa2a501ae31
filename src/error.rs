// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request kept failing after every retry
    #[error("Network error for {context}: {message}")]
    Network { context: String, message: String },

    /// Server kept answering 429 after every retry
    #[error("Rate limited on {context} after {attempts} attempts")]
    RateLimited { context: String, attempts: u32 },

    /// Payload did not match the expected record shape
    #[error("Schema error: {0}")]
    Schema(String),

    /// Appending to an output sink failed
    #[error("Sink write failed for {}: {source}", path.display())]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No page of the listing could be fetched at all
    #[error("Every fetch failed: {0}")]
    FetchExhausted(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a network error with context.
    pub fn network(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Network {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl fmt::Display) -> Self {
        Self::Schema(message.to_string())
    }

    /// Create a sink write error for the given path.
    pub fn sink_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SinkWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the error is a per-request failure the batch loop may skip past.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::RateLimited { .. } | Self::Http(_)
        )
    }
}
