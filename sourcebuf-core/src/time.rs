//! Exact rational media time
//!
//! [`MediaTime`] stores a timestamp as `value / timescale`. Comparisons are
//! exact: both sides are cross-multiplied in 128-bit arithmetic, so `1/2` and
//! `2/4` compare equal and hash identically. Floating point conversions exist
//! for display and host glue only and are never used for ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Neg, Sub};

/// Timescale used when converting from floating point seconds
pub const MICROS_PER_SECOND: u32 = 1_000_000;

/// Rational timestamp or duration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaTime {
    value: i64,
    timescale: u32,
}

impl MediaTime {
    /// Zero seconds
    pub const ZERO: MediaTime = MediaTime { value: 0, timescale: 1 };
    /// One microsecond, the smallest step used by overlap heuristics
    pub const MICROSECOND: MediaTime = MediaTime {
        value: 1,
        timescale: MICROS_PER_SECOND,
    };
    /// Largest representable time, used as "unbounded"
    pub const MAX: MediaTime = MediaTime {
        value: i64::MAX,
        timescale: 1,
    };
    /// Smallest representable time
    pub const MIN: MediaTime = MediaTime {
        value: i64::MIN,
        timescale: 1,
    };

    /// Create a time from a raw value and timescale. A zero timescale is
    /// treated as one.
    pub const fn new(value: i64, timescale: u32) -> Self {
        let timescale = if timescale == 0 { 1 } else { timescale };
        Self { value, timescale }
    }

    /// Whole seconds
    pub const fn from_seconds(seconds: i64) -> Self {
        Self::new(seconds, 1)
    }

    /// Milliseconds
    pub const fn from_millis(millis: i64) -> Self {
        Self::new(millis, 1_000)
    }

    /// Microseconds
    pub const fn from_micros(micros: i64) -> Self {
        Self::new(micros, MICROS_PER_SECOND)
    }

    /// Convert floating point seconds at microsecond precision. NaN maps to
    /// zero and infinities saturate.
    pub fn from_secs_f64(seconds: f64) -> Self {
        if seconds.is_nan() {
            return Self::ZERO;
        }
        if seconds.is_infinite() {
            return if seconds > 0.0 { Self::MAX } else { Self::MIN };
        }
        Self::from_micros((seconds * MICROS_PER_SECOND as f64).round() as i64)
    }

    /// Raw numerator
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Denominator, never zero
    pub fn timescale(&self) -> u32 {
        self.timescale.max(1)
    }

    /// Lossy conversion for display and host APIs
    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale() as f64
    }

    /// Whether this is strictly below zero
    pub fn is_negative(&self) -> bool {
        self.value < 0
    }

    /// Whether this equals zero
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Absolute value, saturating at [`MediaTime::MAX`]
    pub fn abs(self) -> Self {
        Self::new(self.value.saturating_abs(), self.timescale())
    }

    /// Multiply by an integer, saturating on overflow
    pub fn mul_int(self, factor: i64) -> Self {
        Self::new(self.value.saturating_mul(factor), self.timescale())
    }

    /// Sum that reports overflow instead of saturating. Also `None` when the
    /// exact result needs a timescale wider than `u32`.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let (value, timescale) = Self::combine(self, rhs, |a, b| a + b);
        let timescale = u32::try_from(timescale).ok()?;
        i64::try_from(value).ok().map(|v| Self::new(v, timescale))
    }

    /// Difference that reports overflow instead of saturating. Also `None`
    /// when the exact result needs a timescale wider than `u32`.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        let (value, timescale) = Self::combine(self, rhs, |a, b| a - b);
        let timescale = u32::try_from(timescale).ok()?;
        i64::try_from(value).ok().map(|v| Self::new(v, timescale))
    }

    /// Re-express this time in another timescale, rounding half away from zero
    pub fn to_timescale(self, timescale: u32) -> Self {
        let timescale = timescale.max(1);
        let scaled = Self::rescale(self, timescale);
        Self::new(clamp_i64(scaled), timescale)
    }

    // Private helper methods

    /// Apply `op` to both values over their least common timescale. When
    /// that timescale does not fit a `u32` the result is reduced by its gcd;
    /// the returned timescale may still exceed `u32::MAX`.
    fn combine(a: Self, b: Self, op: impl Fn(i128, i128) -> i128) -> (i128, u64) {
        let (from_a, from_b) = (a.timescale() as u64, b.timescale() as u64);
        let lcm = from_a / gcd(from_a as u128, from_b as u128) as u64 * from_b;
        let value = op(
            a.value as i128 * (lcm / from_a) as i128,
            b.value as i128 * (lcm / from_b) as i128,
        );
        if lcm <= u32::MAX as u64 {
            return (value, lcm);
        }
        if value == 0 {
            return (0, 1);
        }
        let divisor = gcd(value.unsigned_abs(), lcm as u128);
        (value / divisor as i128, lcm / divisor as u64)
    }

    /// Saturating combination. Results whose exact timescale does not fit a
    /// `u32` are rounded to the finer of the two input timescales.
    fn saturating_combine(a: Self, b: Self, op: impl Fn(i128, i128) -> i128) -> Self {
        let (value, timescale) = Self::combine(a, b, op);
        if let Ok(exact) = u32::try_from(timescale) {
            return Self::new(clamp_i64(value), exact);
        }
        let target = a.timescale().max(b.timescale());
        // An overflowing product is already far outside the i64 range
        let rounded = match value.checked_mul(target as i128) {
            Some(scaled) => div_round(scaled, timescale as i128),
            None if value < 0 => i128::MIN,
            None => i128::MAX,
        };
        Self::new(clamp_i64(rounded), target)
    }

    fn rescale(time: Self, timescale: u32) -> i128 {
        let from = time.timescale() as i128;
        let to = timescale as i128;
        if from == to {
            return time.value as i128;
        }
        div_round(time.value as i128 * to, from)
    }

    fn reduced(&self) -> (i64, u32) {
        let timescale = self.timescale();
        if self.value == 0 {
            return (0, 1);
        }
        let divisor = gcd(self.value.unsigned_abs() as u128, timescale as u128) as u64;
        (
            self.value / divisor as i64,
            (timescale as u64 / divisor) as u32,
        )
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.value as i128 * other.timescale() as i128;
        let rhs = other.value as i128 * self.timescale() as i128;
        lhs.cmp(&rhs)
    }
}

impl Hash for MediaTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reduced().hash(state);
    }
}

impl Add for MediaTime {
    type Output = MediaTime;

    fn add(self, rhs: Self) -> Self::Output {
        Self::saturating_combine(self, rhs, |a, b| a + b)
    }
}

impl Sub for MediaTime {
    type Output = MediaTime;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::saturating_combine(self, rhs, |a, b| a - b)
    }
}

impl Neg for MediaTime {
    type Output = MediaTime;

    fn neg(self) -> Self::Output {
        Self::new(self.value.saturating_neg(), self.timescale())
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::MAX {
            return write!(f, "+inf");
        }
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

fn div_round(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) != (denominator < 0) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}

fn clamp_i64(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}
