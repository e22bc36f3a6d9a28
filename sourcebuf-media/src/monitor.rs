//! Buffering rate estimation
//!
//! Tracks how many media seconds are buffered per wall-clock second as an
//! exponential moving average, and uses it to decide whether playback can
//! run to the end without stalling.

use crate::client::MediaDuration;
use sourcebuf_core::{MediaTime, TimeRanges};
use std::time::Instant;

/// Weight of the newest observation in the moving average
pub const EMA_COEFFICIENT: f64 = 0.1;

/// Exponential moving average of the buffering rate
#[derive(Debug, Clone)]
pub struct BufferingRateMonitor {
    average_rate: f64,
    buffered_since_last: f64,
    last_update: Instant,
}

impl Default for BufferingRateMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferingRateMonitor {
    /// Create a monitor with a zero rate
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a monitor whose first interval starts at `now`
    pub fn starting_at(now: Instant) -> Self {
        Self {
            average_rate: 0.0,
            buffered_since_last: 0.0,
            last_update: now,
        }
    }

    /// Current average in media seconds per second
    pub fn average_rate(&self) -> f64 {
        self.average_rate
    }

    /// Account for newly buffered media
    pub fn record_buffered(&mut self, media_seconds: f64) {
        self.buffered_since_last += media_seconds;
    }

    /// Fold the media buffered since the last update into the average
    pub fn update_at(&mut self, now: Instant) {
        if self.buffered_since_last <= 0.0 {
            return;
        }
        let interval = now.saturating_duration_since(self.last_update).as_secs_f64();
        if interval <= 0.0 {
            return;
        }
        let rate = self.buffered_since_last / interval;
        self.last_update = now;
        self.buffered_since_last = 0.0;
        self.average_rate = self.average_rate * (1.0 - EMA_COEFFICIENT) + rate * EMA_COEFFICIENT;
        tracing::debug!("Average buffering rate {:.3}", self.average_rate);
    }

    /// Whether the remaining unbuffered media would arrive before playback
    /// reaches it at the current average rate
    pub fn can_play_through(
        &mut self,
        buffered: &TimeRanges,
        current_time: MediaTime,
        duration: MediaDuration,
        now: Instant,
    ) -> bool {
        self.update_at(now);
        if self.average_rate > 1.0 {
            return true;
        }

        let end = match duration {
            MediaDuration::Finite(end) => end.max(current_time),
            MediaDuration::Unset | MediaDuration::Unbounded => return false,
        };

        let mut unbuffered = TimeRanges::from_range(current_time, end);
        unbuffered.subtract_ranges(buffered);
        let unbuffered_time = unbuffered.total_duration().as_secs_f64();
        if unbuffered_time <= 0.0 {
            return true;
        }
        if self.average_rate <= 0.0 {
            return false;
        }

        let time_remaining = (end - current_time).as_secs_f64();
        unbuffered_time / self.average_rate < time_remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_moving_average() {
        let start = Instant::now();
        let mut monitor = BufferingRateMonitor::starting_at(start);
        monitor.record_buffered(4.0);
        monitor.update_at(start + Duration::from_secs(2));
        assert!((monitor.average_rate() - 0.2).abs() < 1e-9);

        monitor.update_at(start + Duration::from_secs(3));
        assert!((monitor.average_rate() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_fully_buffered_plays_through() {
        let now = Instant::now();
        let mut monitor = BufferingRateMonitor::starting_at(now);
        let buffered = TimeRanges::from_range(MediaTime::ZERO, MediaTime::from_seconds(10));
        assert!(monitor.can_play_through(
            &buffered,
            MediaTime::from_seconds(2),
            MediaDuration::Finite(MediaTime::from_seconds(10)),
            now,
        ));
        assert!(!monitor.can_play_through(
            &buffered,
            MediaTime::from_seconds(2),
            MediaDuration::Finite(MediaTime::from_seconds(20)),
            now,
        ));
    }

    #[test]
    fn test_fast_buffering_plays_through() {
        let start = Instant::now();
        let mut monitor = BufferingRateMonitor::starting_at(start);
        monitor.record_buffered(200.0);
        assert!(monitor.can_play_through(
            &TimeRanges::new(),
            MediaTime::ZERO,
            MediaDuration::Finite(MediaTime::from_seconds(60)),
            start + Duration::from_secs(1),
        ));
    }
}
