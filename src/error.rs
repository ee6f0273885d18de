//! Unified error handling for the mirrorwatch crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while keeping the domain errors available
//! for code that needs to match on them.
//!
//! # Architecture
//!
//! - [`MirrorwatchErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use mirrorwatch::error::{Error, MirrorwatchErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying: {}", err);
//!     } else {
//!         eprintln!("Fatal error: {}", err);
//!     }
//! }
//! ```

use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::publish::PublishError;
pub use crate::utils::error::CatalogError;

/// Common trait for all mirrorwatch error types
pub trait MirrorwatchErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Catalog parsing errors
    Parsing,
    /// Catalog file I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Version-control publish errors
    Publish,
}

impl ErrorCategory {
    /// Short label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Publish => "publish",
        }
    }
}

/// Unified error type for the mirrorwatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Catalog load/parse/write errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Publish (git) errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl MirrorwatchErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Catalog(_) => false,
            Self::Publish(e) => e.is_recoverable(),
            Self::Config(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Catalog(e) => match e {
                CatalogError::MalformedLine { .. } | CatalogError::MirrorOutOfRange { .. } => {
                    ErrorCategory::Parsing
                }
                _ => ErrorCategory::Storage,
            },
            Self::Publish(_) => ErrorCategory::Publish,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
