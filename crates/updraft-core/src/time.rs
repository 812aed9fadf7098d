//! Flight timestamps and the engine-monotonic wall clock.

use std::fmt;
use std::ops::{Add, Sub};
use std::sync::OnceLock;
use std::time::Instant;

/// A device-derived timestamp in seconds, comparable for the life of a
/// flight.
///
/// Produced by [`ClockUnwrapper`](crate::ClockUnwrapper) from raw device
/// time-of-day readings; once unwrapped, values from the same source are
/// monotonic non-decreasing and safe to subtract.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct TimeStamp(f64);

impl TimeStamp {
    /// The zero timestamp (start of the unwrap epoch).
    pub const ZERO: TimeStamp = TimeStamp(0.0);

    /// Build a timestamp from seconds.
    pub fn from_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    /// The timestamp value in seconds.
    pub fn seconds(self) -> f64 {
        self.0
    }
}

impl Sub for TimeStamp {
    type Output = f64;

    /// Elapsed seconds between two timestamps (`self - earlier`).
    fn sub(self, earlier: TimeStamp) -> f64 {
        self.0 - earlier.0
    }
}

impl Add<f64> for TimeStamp {
    type Output = TimeStamp;

    fn add(self, seconds: f64) -> TimeStamp {
        TimeStamp(self.0 + seconds)
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

/// Seconds on the engine-monotonic wall clock.
///
/// Measured from a process-wide baseline established on first use, so
/// values are comparable across threads and never go backwards. Used for
/// receive stamps and connection expiry; device measurements use
/// [`TimeStamp`] instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct WallTime(f64);

static BASELINE: OnceLock<Instant> = OnceLock::new();

impl WallTime {
    /// Current wall time.
    ///
    /// The first call fixes the process-wide baseline.
    pub fn now() -> Self {
        let base = BASELINE.get_or_init(Instant::now);
        Self(base.elapsed().as_secs_f64())
    }

    /// Build a wall time from seconds since the baseline.
    ///
    /// Intended for tests that script the clock; production code uses
    /// [`WallTime::now`].
    pub fn from_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    /// Seconds since the process baseline.
    pub fn seconds(self) -> f64 {
        self.0
    }
}

impl Sub for WallTime {
    type Output = f64;

    /// Elapsed seconds between two wall times (`self - earlier`).
    fn sub(self, earlier: WallTime) -> f64 {
        self.0 - earlier.0
    }
}

impl Add<f64> for WallTime {
    type Output = WallTime;

    fn add(self, seconds: f64) -> WallTime {
        WallTime(self.0 + seconds)
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}
