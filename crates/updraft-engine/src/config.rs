//! Engine configuration, validation, and error types.
//!
//! [`EngineConfig`] is the builder-input for constructing a
//! [`FlightSession`](crate::session::FlightSession).
//! [`validate()`](EngineConfig::validate) checks structural invariants
//! at startup; the blackboard and workers consume validated values
//! without re-checking.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use updraft_core::{ClockUnwrapper, ComputeSettings};

use crate::scheduler::WorkerTiming;

/// Upper bound on configured device slots. High enough for any real
/// cockpit bus, low enough to catch a corrupted count before the slot
/// vector allocation does.
pub const MAX_DEVICES: usize = 32;

// ── ClockConfig ──────────────────────────────────────────────────

/// Per-source clock unwrapping parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockConfig {
    /// Backward jitter tolerated without declaring a rollover, in
    /// seconds. Must exceed serial-bus reordering but stay below any
    /// plausible gap between device updates. Default: 2.
    pub epsilon: f64,
    /// Clock period added on each detected rollover, in seconds.
    /// Device clocks are GPS time of day. Default: 86 400 (one day).
    pub rollover: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            epsilon: ClockUnwrapper::DEFAULT_EPSILON,
            rollover: ClockUnwrapper::DEFAULT_ROLLOVER,
        }
    }
}

// ── ConfigError ──────────────────────────────────────────────────

/// Errors detected during [`EngineConfig::validate()`].
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Zero device slots configured.
    NoDevices,
    /// Device slot count exceeds [`MAX_DEVICES`].
    TooManyDevices {
        /// The configured count that was too large.
        configured: usize,
    },
    /// Clock epsilon or rollover violates an invariant.
    InvalidClock {
        /// Description of which invariant was violated.
        reason: &'static str,
    },
    /// Connection timeout is zero.
    ZeroTimeout,
    /// A worker's `period_min` is zero.
    ZeroPeriod {
        /// Which worker's timing was invalid.
        worker: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevices => write!(f, "device_count must be at least 1"),
            Self::TooManyDevices { configured } => {
                write!(f, "device_count {configured} exceeds maximum of {MAX_DEVICES}")
            }
            Self::InvalidClock { reason } => write!(f, "invalid clock config: {reason}"),
            Self::ZeroTimeout => write!(f, "connection_timeout must be positive"),
            Self::ZeroPeriod { worker } => {
                write!(f, "{worker} period_min must be positive")
            }
        }
    }
}

impl Error for ConfigError {}

// ── EngineConfig ─────────────────────────────────────────────────

/// Complete configuration for constructing a flight session.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Number of device slots on the blackboard. Slot order is merge
    /// priority order. Default: 1.
    pub device_count: usize,
    /// Clock unwrapping parameters, shared by every source.
    pub clock: ClockConfig,
    /// Silence after which a device is declared disconnected by
    /// [`expire_wall_clock`](crate::blackboard::Blackboard::expire_wall_clock).
    /// Default: 10 s.
    pub connection_timeout: Duration,
    /// Merge worker timing. Defaults tuned for a handheld instrument
    /// fed at a few Hz: 50 ms period, 100 ms idle, 10 ms delay.
    pub merge: WorkerTiming,
    /// Compute worker timing. The expensive pass tolerates latency, so
    /// the defaults are slower: 450 ms period, 100 ms idle, 50 ms
    /// delay.
    pub compute: WorkerTiming,
    /// Initial computation settings.
    pub settings: ComputeSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_count: 1,
            clock: ClockConfig::default(),
            connection_timeout: Duration::from_secs(10),
            merge: WorkerTiming {
                period_min: Duration::from_millis(50),
                idle_min: Duration::from_millis(100),
                delay: Duration::from_millis(10),
            },
            compute: WorkerTiming {
                period_min: Duration::from_millis(450),
                idle_min: Duration::from_millis(100),
                delay: Duration::from_millis(50),
            },
            settings: ComputeSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. At least one device slot.
        if self.device_count == 0 {
            return Err(ConfigError::NoDevices);
        }
        // 2. Slot count bounded.
        if self.device_count > MAX_DEVICES {
            return Err(ConfigError::TooManyDevices {
                configured: self.device_count,
            });
        }
        // 3. Epsilon must be a positive finite jitter guard.
        if !self.clock.epsilon.is_finite() || self.clock.epsilon <= 0.0 {
            return Err(ConfigError::InvalidClock {
                reason: "epsilon must be finite and positive",
            });
        }
        // 4. Rollover must exceed epsilon, or a detected backward jump
        //    could fail to bring the clock forward again.
        if !self.clock.rollover.is_finite() || self.clock.rollover <= self.clock.epsilon {
            return Err(ConfigError::InvalidClock {
                reason: "rollover must be finite and greater than epsilon",
            });
        }
        // 5. A zero timeout would expire devices on the tick after
        //    every write.
        if self.connection_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        // 6. period_min is the backpressure guarantee; zero disables it.
        if self.merge.period_min.is_zero() {
            return Err(ConfigError::ZeroPeriod { worker: "merge" });
        }
        if self.compute.period_min.is_zero() {
            return Err(ConfigError::ZeroPeriod { worker: "compute" });
        }
        Ok(())
    }
}
