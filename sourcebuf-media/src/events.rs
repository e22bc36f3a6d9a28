//! Notifications emitted by a source buffer
//!
//! Every update cycle produces `UpdateStart`, then exactly one of `Update`,
//! `Abort` or `Error`, then `UpdateEnd`.

use crate::error::SourceBufferError;

/// Source buffer lifecycle notification
#[derive(Debug, Clone, PartialEq)]
pub enum SourceBufferEvent {
    /// An append or remove started
    UpdateStart,
    /// The operation completed successfully
    Update,
    /// The operation was cancelled by abort
    Abort,
    /// The append failed while being processed
    Error {
        /// Failure that ended the append
        error: SourceBufferError,
    },
    /// The update cycle finished
    UpdateEnd,
}

impl SourceBufferEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            SourceBufferEvent::UpdateStart => "updatestart",
            SourceBufferEvent::Update => "update",
            SourceBufferEvent::Abort => "abort",
            SourceBufferEvent::Error { .. } => "error",
            SourceBufferEvent::UpdateEnd => "updateend",
        }
    }

    /// Check if this event ends an update cycle
    pub fn is_cycle_end(&self) -> bool {
        matches!(self, SourceBufferEvent::UpdateEnd)
    }

    /// Check if this is an error event
    pub fn is_error_event(&self) -> bool {
        matches!(self, SourceBufferEvent::Error { .. })
    }
}
