// src/error.rs

//! Unified error handling for the roster pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for roster operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A listing page could not be fetched or parsed during a crawl
    #[error("Fetch error on page {page}: {message}")]
    Fetch { page: u32, message: String },

    /// A listing page was fetched but its content could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Snapshot store failure other than a missing key
    #[error("Store error: {0}")]
    Store(String),

    /// Malformed snapshot content
    #[error("Decode error at line {line}: {message}")]
    Decode { line: u64, message: String },

    /// Snapshot content could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

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
}

impl AppError {
    /// Create a fetch error for a page.
    pub fn fetch(page: u32, message: impl fmt::Display) -> Self {
        Self::Fetch {
            page,
            message: message.to_string(),
        }
    }

    /// Create a page parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a store error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    /// Create a decode error for a CSV line.
    pub fn decode(line: u64, message: impl fmt::Display) -> Self {
        Self::Decode {
            line,
            message: message.to_string(),
        }
    }

    /// Create an encode error.
    pub fn encode(message: impl fmt::Display) -> Self {
        Self::Encode(message.to_string())
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

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_)
            | Self::Toml(_)
            | Self::Validation(_)
            | Self::Selector { .. }
            | Self::Url(_) => 2,
            Self::Fetch { .. } | Self::Parse(_) | Self::Http(_) => 3,
            Self::Store(_) => 4,
            Self::Decode { .. } => 5,
            Self::Encode(_) | Self::Csv(_) | Self::Json(_) => 6,
            Self::Io(_) => 7,
        }
    }
}
