// src/error.rs

//! Unified error handling for the outreach pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
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

    /// Record database failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record store could not run an operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record id already present in the store
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Record id absent from the store
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Detail page unreachable or empty
    #[error("Extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    /// The action surface reported that no more actions are allowed
    #[error("Action limit reached: {0}")]
    LimitReached(String),

    /// Any other failure while performing the action sequence
    #[error("Action failed: {0}")]
    Action(String),

    /// Browsing session could not be opened or used
    #[error("Session error: {0}")]
    Session(String),

    /// Personalization backend failed
    #[error("Generator error: {0}")]
    Generator(String),
}

impl AppError {
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

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create an extraction error for a detail page.
    pub fn extraction(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an action error.
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action(message.into())
    }

    /// Create a session error.
    pub fn session(message: impl fmt::Display) -> Self {
        Self::Session(message.to_string())
    }

    /// Create a generator error.
    pub fn generator(message: impl fmt::Display) -> Self {
        Self::Generator(message.to_string())
    }

    /// Whether this error is a duplicate-key rejection from the store.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }
}
