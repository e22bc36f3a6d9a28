//! Engine error types

use sourcebuf_media::SourceBufferError;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the engine facade
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No tokio runtime is available to complete operations
    #[error("No async runtime: {reason}")]
    NoRuntime {
        /// Why the runtime could not be found
        reason: String,
    },

    /// The engine already holds its maximum number of source buffers
    #[error("Source buffer limit reached: {limit}")]
    TooManySourceBuffers {
        /// Configured limit
        limit: usize,
    },

    /// No source buffer with the given id is attached
    #[error("Unknown source buffer: {id}")]
    UnknownSourceBuffer {
        /// Requested id
        id: Uuid,
    },

    /// The source buffer rejected the operation
    #[error(transparent)]
    Buffer(#[from] SourceBufferError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
