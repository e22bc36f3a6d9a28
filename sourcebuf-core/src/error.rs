//! Error types for the sourcebuf core data structures

use crate::time::MediaTime;
use thiserror::Error;

/// Error type for the sample store and range primitives
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A sample with this decode timestamp is already stored on the track
    #[error("Duplicate decode timestamp: {decode_time}")]
    DuplicateDecodeTimestamp {
        /// Decode timestamp that collided
        decode_time: MediaTime,
    },

    /// A time range whose end lies before its start
    #[error("Invalid range: [{start}, {end})")]
    InvalidRange {
        /// Range start
        start: MediaTime,
        /// Range end
        end: MediaTime,
    },

    /// Malformed or out-of-bounds input
    #[error("Invalid data: {reason}")]
    InvalidData {
        /// Reason the data was rejected
        reason: String,
    },
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::DuplicateDecodeTimestamp { .. } => "DUPLICATE_DECODE_TIMESTAMP",
            CoreError::InvalidRange { .. } => "INVALID_RANGE",
            CoreError::InvalidData { .. } => "INVALID_DATA",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::InvalidRange {
            start: MediaTime::from_seconds(2),
            end: MediaTime::from_seconds(1),
        };
        assert_eq!(error.to_string(), "Invalid range: [2.000000s, 1.000000s)");
        assert_eq!(error.error_code(), "INVALID_RANGE");
    }
}
