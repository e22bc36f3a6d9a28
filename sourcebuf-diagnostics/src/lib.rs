//! # sourcebuf diagnostics
//!
//! Debugging and diagnostic tools for sourcebuf.
//! Provides buffer health reports and structured logging setup.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod buffer_analyzer;
pub mod debug_logger;

use thiserror::Error;

// Re-export main types
pub use buffer_analyzer::{BufferAnalyzer, BufferReport, RangeReport, TrackReport};
pub use debug_logger::DebugLogger;

/// Errors raised by diagnostics helpers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticsError {
    /// A global subscriber could not be installed
    #[error("Logging initialization failed: {reason}")]
    LoggingInit {
        /// Failure reason
        reason: String,
    },

    /// A report could not be rendered
    #[error("Report serialization failed: {reason}")]
    Serialization {
        /// Failure reason
        reason: String,
    },
}
