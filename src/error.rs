//! Error handling types for highlight-sync
//!
//! This module provides the error type shared by the parser adapter,
//! the coordinator and configuration loading.

use std::sync::PoisonError;
use thiserror::Error;

/// Comprehensive error type for highlighting operations
#[derive(Debug, Error)]
pub enum HighlightError {
    /// The parser could not derive layers from the document text
    #[error("Parse failed: {message}")]
    Parse { message: String },

    /// The parse was superseded and stopped cooperatively
    #[error("Parse cancelled")]
    Cancelled,

    /// Highlight query compilation failed
    #[error("Query error: {message}")]
    Query { message: String },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for highlighting operations
pub type HighlightResult<T> = Result<T, HighlightError>;

/// Helper trait to convert PoisonError into a usable guard
pub trait LockResultExt<T> {
    /// Recover the guard from a poisoned lock, logging which operation hit it.
    ///
    /// The inner value is used as-is.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "highlight_sync::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

/// Helper functions for common error patterns
impl HighlightError {
    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        HighlightError::Parse {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        HighlightError::Config {
            message: message.into(),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        HighlightError::Query {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        HighlightError::Internal(message.into())
    }

    /// Whether this error is a cooperative cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HighlightError::Cancelled)
    }
}
