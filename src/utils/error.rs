//! Error types for probing and catalog handling
//!
//! This module defines the domain errors shared by the probe and catalog layers.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing a mirror URL
#[derive(Error, Debug)]
pub enum ProbeError {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out
    #[error("Request timeout")]
    Timeout,

    /// Server answered with a non-success status
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Body was served but is not a usable playlist
    #[error("Invalid playlist: {0}")]
    InvalidPayload(String),

    /// First media segment of the playlist is not reachable
    #[error("Segment {url} unreachable: {reason}")]
    SegmentUnreachable { url: String, reason: String },

    /// URL could not be parsed or resolved
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ProbeError {
    /// Whether another attempt could change the outcome
    ///
    /// Transport failures, timeouts, 429 and 5xx are transient. Other 4xx
    /// answers and malformed payloads are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder(),
            Self::Timeout => true,
            Self::Status(code) => Self::is_retryable_status(*code),
            Self::SegmentUnreachable { .. } => true,
            Self::InvalidPayload(_) | Self::InvalidUrl(_) => false,
        }
    }

    /// Determine if a status code should trigger a retry
    ///
    /// Retry on 429, 500, 502, 503 and 504.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }
}

/// Errors raised while loading or parsing the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog path does not exist
    #[error("Catalog not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Catalog exists but could not be read
    #[error("Failed to read catalog {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Catalog could not be written back
    #[error("Failed to write catalog {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line looks like a mirror URL but cannot be interpreted
    #[error("Line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    /// A mirror id is outside the configured range
    #[error("Mirror id {id} outside range {min}..={max}")]
    MirrorOutOfRange { id: u32, min: u32, max: u32 },
}

impl CatalogError {
    /// Create a malformed line error (1-based line number)
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedLine {
            line,
            reason: reason.into(),
        }
    }
}
