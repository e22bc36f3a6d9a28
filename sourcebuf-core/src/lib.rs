//! # sourcebuf core
//!
//! Foundational data structures for the sourcebuf media buffer engine:
//! exact rational [`MediaTime`], immutable coded [`Sample`]s, normalised
//! [`TimeRanges`] and the dual-indexed [`SampleMap`] store that every track
//! buffer is built on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ranges;
pub mod sample;
pub mod sample_map;
pub mod time;

// Re-export main types
pub use error::{CoreError, CoreResult};
pub use ranges::{TimeRange, TimeRanges};
pub use sample::{MediaKind, Sample, TrackId};
pub use sample_map::SampleMap;
pub use time::{MediaTime, MICROS_PER_SECOND};
