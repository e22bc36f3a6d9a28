//! Source buffer error types and handling
//!
//! Errors split into two groups. Synchronous rejections (`InvalidState`,
//! `InvalidAccess`, `QuotaExceeded`) leave the buffer untouched and emit no
//! events. `Decode` failures are discovered while completing an append and are
//! reported to the parent through `end_of_stream`. A frame that outgrows its
//! track's quota while an append completes ends that append with
//! `QuotaExceeded` without ending the stream.

use sourcebuf_core::{CoreError, TrackId};
use thiserror::Error;

/// Main error type for source buffer operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceBufferError {
    /// Operation not allowed in the current state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// State error message
        message: String,
    },

    /// Argument outside the accepted domain
    #[error("Invalid access: {message}")]
    InvalidAccess {
        /// Error message
        message: String,
    },

    /// Eviction could not make room for appended data
    #[error("Quota exceeded on track {track}: {required} bytes required, limit {limit}")]
    QuotaExceeded {
        /// Track that ran out of room
        track: TrackId,
        /// Bytes the track would hold after the append
        required: usize,
        /// Track quota in bytes
        limit: usize,
    },

    /// Malformed media data, detected while completing an append
    #[error("Decode error: {reason}")]
    Decode {
        /// Failure reason
        reason: String,
    },

    /// Store-level failure
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type alias for source buffer operations
pub type SourceBufferResult<T> = Result<T, SourceBufferError>;

impl SourceBufferError {
    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        SourceBufferError::InvalidState {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_access(message: impl Into<String>) -> Self {
        SourceBufferError::InvalidAccess {
            message: message.into(),
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        SourceBufferError::Decode {
            reason: reason.into(),
        }
    }

    /// Whether the error ends the current append and is reported to the
    /// parent as a decode failure
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SourceBufferError::Decode { .. } | SourceBufferError::Core(_)
        )
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            SourceBufferError::InvalidState { .. } => ErrorCategory::State,
            SourceBufferError::InvalidAccess { .. } => ErrorCategory::Argument,
            SourceBufferError::QuotaExceeded { .. } => ErrorCategory::Memory,
            SourceBufferError::Decode { .. } => ErrorCategory::Data,
            SourceBufferError::Core(_) => ErrorCategory::Data,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Operation called in the wrong state
    State,
    /// Caller supplied an out-of-range argument
    Argument,
    /// Capacity errors
    Memory,
    /// Malformed media data
    Data,
}

/// Reason passed to the parent when a stream ends abnormally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfStreamError {
    /// Media data could not be parsed or processed
    Decode,
    /// Media data could not be fetched
    Network,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcebuf_core::MediaTime;

    #[test]
    fn test_error_categories() {
        let error = SourceBufferError::invalid_state("updating");
        assert_eq!(error.category(), ErrorCategory::State);
        assert!(!error.is_fatal());

        let error = SourceBufferError::decode("truncated record");
        assert_eq!(error.category(), ErrorCategory::Data);
        assert!(error.is_fatal());

        let core = CoreError::DuplicateDecodeTimestamp {
            decode_time: MediaTime::ZERO,
        };
        assert!(SourceBufferError::from(core).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let error = SourceBufferError::QuotaExceeded {
            track: TrackId::new("video"),
            required: 2048,
            limit: 1024,
        };
        assert_eq!(
            error.to_string(),
            "Quota exceeded on track video: 2048 bytes required, limit 1024"
        );
    }
}
