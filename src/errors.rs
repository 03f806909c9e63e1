//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the letters search service, providing the
//! error taxonomy shared by the corpus loader, search orchestrator, and API
//! layer.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from various system components
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Corpus, Browse, Selection, API, Configuration
//!
//! ## Key Features
//! - Hierarchical error types with detailed context
//! - Automatic error conversion and chaining
//! - User-friendly error messages for API responses
//! - Structured logging integration

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, SearchError>;

/// Error types for the letters search service
#[derive(Debug, Error)]
pub enum SearchError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Corpus store is empty or unreachable. Distinct from "zero results
    /// matched": the caller maps this to a no-content response.
    #[error("No content available from corpus store")]
    NoContent,

    /// No letter exists for the requested year
    #[error("No letter found for year {year}")]
    LetterNotFound { year: i32 },

    /// Unknown topic slug
    #[error("Topic '{slug}' not found")]
    TopicNotFound { slug: String },

    /// No section cleared the quality threshold for a selection feature
    #[error("No suitable quote found")]
    NoQuoteAvailable,

    /// Invalid caller-supplied parameter, rejected before any scoring work
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter { param: String, reason: String },

    /// Validation errors
    #[error("Validation failed for field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SearchError {
    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            SearchError::Config { .. } | SearchError::Toml(_) => "configuration",
            SearchError::NoContent => "corpus",
            SearchError::LetterNotFound { .. } | SearchError::TopicNotFound { .. } => "browse",
            SearchError::NoQuoteAvailable => "selection",
            SearchError::InvalidParameter { .. } | SearchError::ValidationFailed { .. } => "api",
            SearchError::Http(_) => "remote",
            SearchError::Internal { .. } | SearchError::Json(_) => "internal",
        }
    }

    /// True when the condition reflects caller input rather than server state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SearchError::InvalidParameter { .. } | SearchError::ValidationFailed { .. }
        )
    }
}

impl From<std::io::Error> for SearchError {
    fn from(err: std::io::Error) -> Self {
        SearchError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

/// Helper macro for internal error construction
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::errors::SearchError::Internal {
            message: $msg.to_string(),
        }
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::SearchError::Internal {
            message: format!($fmt, $($arg)*),
        }
    };
}
