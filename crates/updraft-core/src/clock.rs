//! Unwrapping of rolling or resetting device clocks.

use crate::time::TimeStamp;

/// Converts a wrapping/resetting device time-of-day into a timestamp
/// that is monotonic non-decreasing for the life of a flight.
///
/// GPS receivers and flight recorders report seconds within the current
/// day; the reading wraps at midnight and jumps to zero when the device
/// restarts mid-flight. The unwrapper bridges both by accumulating an
/// offset whenever the raw reading jumps backwards by more than the
/// jitter guard, then clamping the output so small in-guard jitter never
/// shows up as time running backwards either.
///
/// One unwrapper exists per device slot and per replay source; state is
/// cleared on explicit flight reset, never implicitly.
#[derive(Clone, Debug)]
pub struct ClockUnwrapper {
    offset: f64,
    last_raw: Option<f64>,
    last_output: Option<f64>,
    epsilon: f64,
    rollover: f64,
}

impl ClockUnwrapper {
    /// Default jitter guard in seconds.
    ///
    /// Must exceed realistic out-of-order delivery on multiplexed serial
    /// links but stay below any plausible gap between device updates.
    pub const DEFAULT_EPSILON: f64 = 2.0;

    /// Default rollover length: one day, for time-of-day device clocks.
    pub const DEFAULT_ROLLOVER: f64 = 86_400.0;

    /// Unwrapper with the default jitter guard and rollover length.
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_EPSILON, Self::DEFAULT_ROLLOVER)
    }

    /// Unwrapper with an explicit jitter guard and rollover length.
    pub fn with_config(epsilon: f64, rollover: f64) -> Self {
        Self {
            offset: 0.0,
            last_raw: None,
            last_output: None,
            epsilon,
            rollover,
        }
    }

    /// Feed the next raw reading and return the unwrapped timestamp.
    ///
    /// Output is non-decreasing across any raw sequence: backward jumps
    /// past the jitter guard advance the accumulated offset by whole
    /// rollover lengths, and jumps within the guard are clamped to the
    /// previous output.
    pub fn unwrap_next(&mut self, raw: f64) -> TimeStamp {
        if let Some(last) = self.last_raw {
            if raw < last - self.epsilon {
                // Backward past the guard: midnight wrap or device
                // restart. Both are bridged the same way.
                let previous = self.offset + last;
                while self.offset + raw < previous {
                    self.offset += self.rollover;
                }
            }
        }
        self.last_raw = Some(raw);

        let mut out = self.offset + raw;
        if let Some(prev) = self.last_output {
            if out < prev {
                out = prev;
            }
        }
        self.last_output = Some(out);
        TimeStamp::from_seconds(out)
    }

    /// The last unwrapped output, if any reading has been fed.
    pub fn last_output(&self) -> Option<TimeStamp> {
        self.last_output.map(TimeStamp::from_seconds)
    }

    /// Clear all state for an explicit flight reset.
    ///
    /// The next reading starts a fresh monotonic epoch at its raw value.
    pub fn reset(&mut self) {
        self.offset = 0.0;
        self.last_raw = None;
        self.last_output = None;
    }
}

impl Default for ClockUnwrapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn passes_through_forward_sequence() {
        let mut c = ClockUnwrapper::new();
        assert_eq!(c.unwrap_next(100.0).seconds(), 100.0);
        assert_eq!(c.unwrap_next(101.0).seconds(), 101.0);
        assert_eq!(c.unwrap_next(150.5).seconds(), 150.5);
    }

    #[test]
    fn bridges_midnight_wrap() {
        let mut c = ClockUnwrapper::new();
        c.unwrap_next(86_398.0);
        c.unwrap_next(86_399.5);
        let after = c.unwrap_next(0.5);
        assert_eq!(after.seconds(), 86_400.5);
        assert_eq!(c.unwrap_next(1.5).seconds(), 86_401.5);
    }

    #[test]
    fn bridges_mid_flight_device_restart() {
        let mut c = ClockUnwrapper::new();
        c.unwrap_next(50_000.0);
        let after = c.unwrap_next(3.0);
        assert!(
            after.seconds() >= 50_000.0,
            "restart must not go backwards: {after}"
        );
    }

    #[test]
    fn clamps_jitter_within_guard() {
        let mut c = ClockUnwrapper::new();
        let a = c.unwrap_next(100.0);
        // 1s backward jitter sits inside the 2s guard: no rollover, but
        // the output must not regress.
        let b = c.unwrap_next(99.0);
        assert_eq!(b, a);
        let d = c.unwrap_next(101.0);
        assert_eq!(d.seconds(), 101.0);
    }

    #[test]
    fn reset_starts_fresh_epoch() {
        let mut c = ClockUnwrapper::new();
        c.unwrap_next(86_399.0);
        c.unwrap_next(10.0);
        c.reset();
        assert_eq!(c.last_output(), None);
        assert_eq!(c.unwrap_next(5.0).seconds(), 5.0);
    }

    #[test]
    fn repeated_reading_is_idempotent() {
        let mut c = ClockUnwrapper::new();
        let a = c.unwrap_next(42.0);
        let b = c.unwrap_next(42.0);
        assert_eq!(a, b);
    }

    fn arb_raw_sequence() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0.0f64..86_400.0, 1..200)
    }

    proptest! {
        #[test]
        fn output_is_non_decreasing(raws in arb_raw_sequence()) {
            let mut c = ClockUnwrapper::new();
            let mut prev = f64::NEG_INFINITY;
            for raw in raws {
                let out = c.unwrap_next(raw).seconds();
                prop_assert!(out >= prev, "regressed: {out} after {prev}");
                prev = out;
            }
        }

        #[test]
        fn forward_wraps_preserve_deltas(step in 0.1f64..100.0) {
            // A clock stepping forward uniformly, wrapping at the day
            // boundary, must unwrap to the same uniform steps.
            let mut c = ClockUnwrapper::new();
            let mut raw = 86_000.0;
            let mut last = c.unwrap_next(raw).seconds();
            for _ in 0..20 {
                raw = (raw + step) % 86_400.0;
                let out = c.unwrap_next(raw).seconds();
                prop_assert!((out - last - step).abs() < 1e-6);
                last = out;
            }
        }
    }
}
