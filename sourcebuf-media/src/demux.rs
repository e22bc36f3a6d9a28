//! Demuxer seam
//!
//! Container parsing lives outside this crate. A [`Demuxer`] turns appended
//! bytes into initialization segments and coded samples; the source buffer
//! only sees [`DemuxedItem`]s.

use crate::error::SourceBufferError;
use crate::tracks::InitializationSegment;
use sourcebuf_core::Sample;
use thiserror::Error;

/// Error raised by a demuxer for malformed input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DemuxError {
    /// Input does not follow the container format
    #[error("Malformed input: {reason}")]
    Malformed {
        /// Reason the input was rejected
        reason: String,
    },

    /// Record type the demuxer does not understand
    #[error("Unknown record type: {record_type}")]
    UnknownRecord {
        /// Offending record type
        record_type: u64,
    },
}

impl From<DemuxError> for SourceBufferError {
    fn from(error: DemuxError) -> Self {
        SourceBufferError::Decode {
            reason: error.to_string(),
        }
    }
}

/// One item parsed from appended bytes
#[derive(Debug, Clone, PartialEq)]
pub enum DemuxedItem {
    /// Stream metadata
    InitializationSegment(InitializationSegment),
    /// Coded frame
    Sample(Sample),
}

/// Byte stream parser feeding a source buffer
pub trait Demuxer: Send {
    /// Parse appended bytes. Incomplete trailing data is kept for the next
    /// call.
    fn append(&mut self, data: &[u8]) -> Result<Vec<DemuxedItem>, DemuxError>;

    /// Drop any partially parsed state
    fn reset(&mut self);

    /// Whether the parser is in the middle of a media segment
    fn is_parsing_media_segment(&self) -> bool {
        false
    }
}
