//! Error types for segment operations.

use std::io;
use thiserror::Error;

/// Result type for segment operations.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Errors that can occur in segment operations.
///
/// Absent keys and timestamps are not errors; lookups signal them through
/// `Option` results instead.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A configuration value failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the rejected value.
        message: String,
    },
}

impl SegmentError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
