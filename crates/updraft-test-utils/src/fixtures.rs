//! Scripted computer and sink doubles for pipeline testing.
//!
//! Four standard doubles for session and worker validation:
//!
//! - [`CountingComputer`] — counts passes, returns a distinct result each time.
//! - [`FailingComputer`] — fails deterministically after N passes.
//! - [`BlockingComputer`] — parks inside the pass until cancelled.
//! - [`RecordingSink`] — records every accepted setting push.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use updraft_core::{
    CancelToken, ComputeError, ComputeInput, Computer, DerivedResult, DeviceError, SettingsSink,
};

fn stamped_result(input: &ComputeInput, pass: usize) -> DerivedResult {
    let mut result = input.previous.clone();
    result.last_calculated = input
        .current
        .sensor
        .time_available
        .valid()
        .then_some(input.current.sensor.time_of_fix);
    // Distinct per pass so change detection always fires.
    result.flight_time = pass as f64;
    result
}

/// Counts compute passes and returns a distinct result each time.
///
/// Clone the [`calls`](CountingComputer::calls) handle before boxing
/// the computer into a session, then assert on it from the test thread.
pub struct CountingComputer {
    calls: Arc<AtomicUsize>,
}

impl CountingComputer {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared pass counter, incremented at the top of every pass.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Default for CountingComputer {
    fn default() -> Self {
        Self::new()
    }
}

impl Computer for CountingComputer {
    fn compute(
        &mut self,
        input: &ComputeInput,
        _cancel: &CancelToken,
    ) -> Result<DerivedResult, ComputeError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(stamped_result(input, n + 1))
    }

    fn reset(&mut self) {}
}

/// Fails deterministically after a configurable number of successful
/// passes.
///
/// Useful for testing that a failed pass keeps the previous derived
/// result intact. Uses `AtomicUsize` for the pass counter so tests can
/// watch it across the thread boundary.
pub struct FailingComputer {
    succeed_count: usize,
    calls: Arc<AtomicUsize>,
}

impl FailingComputer {
    /// Create a computer that succeeds `succeed_count` times then fails.
    pub fn new(succeed_count: usize) -> Self {
        Self {
            succeed_count,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared pass counter, incremented at the top of every pass.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Computer for FailingComputer {
    fn compute(
        &mut self,
        input: &ComputeInput,
        _cancel: &CancelToken,
    ) -> Result<DerivedResult, ComputeError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n >= self.succeed_count {
            return Err(ComputeError::Failed {
                reason: format!(
                    "deliberate failure after {} successful passes",
                    self.succeed_count
                ),
            });
        }
        Ok(stamped_result(input, n + 1))
    }

    fn reset(&mut self) {}
}

/// Parks inside the pass until the cancel token fires.
///
/// Drives the shutdown path: a session dropped mid-pass must fire the
/// token and join promptly. `max_block` bounds the park so a missed
/// cancellation fails the test instead of hanging it.
pub struct BlockingComputer {
    max_block: Duration,
    entered: Arc<AtomicUsize>,
}

impl BlockingComputer {
    pub fn new(max_block: Duration) -> Self {
        Self {
            max_block,
            entered: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of passes that have entered the park loop.
    pub fn entered(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.entered)
    }
}

impl Computer for BlockingComputer {
    fn compute(
        &mut self,
        _input: &ComputeInput,
        cancel: &CancelToken,
    ) -> Result<DerivedResult, ComputeError> {
        self.entered.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        while !cancel.is_cancelled() {
            if start.elapsed() > self.max_block {
                return Err(ComputeError::Failed {
                    reason: "park outlived max_block without cancellation".to_string(),
                });
            }
            thread::sleep(Duration::from_millis(1));
        }
        Err(ComputeError::Cancelled)
    }

    fn reset(&mut self) {}
}

/// Records every accepted setting push for later assertion.
///
/// All four methods accept. Clone the [`log`](RecordingSink::log)
/// handle before registering the sink with a session.
pub struct RecordingSink {
    log: Arc<Mutex<Vec<(&'static str, f64)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared push log of `(setting name, value)` pairs.
    pub fn log(&self) -> Arc<Mutex<Vec<(&'static str, f64)>>> {
        Arc::clone(&self.log)
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsSink for RecordingSink {
    fn put_mac_cready(&mut self, value: f64) -> Result<(), DeviceError> {
        self.log.lock().unwrap().push(("mac_cready", value));
        Ok(())
    }

    fn put_ballast(&mut self, fraction: f64) -> Result<(), DeviceError> {
        self.log.lock().unwrap().push(("ballast", fraction));
        Ok(())
    }

    fn put_bugs(&mut self, factor: f64) -> Result<(), DeviceError> {
        self.log.lock().unwrap().push(("bugs", factor));
        Ok(())
    }

    fn put_qnh(&mut self, hectopascals: f64) -> Result<(), DeviceError> {
        self.log.lock().unwrap().push(("qnh", hectopascals));
        Ok(())
    }

    fn put_volume(&mut self, percent: u32) -> Result<(), DeviceError> {
        self.log.lock().unwrap().push(("volume", f64::from(percent)));
        Ok(())
    }

    fn put_active_frequency(&mut self, kilohertz: u32) -> Result<(), DeviceError> {
        self.log
            .lock()
            .unwrap()
            .push(("active_frequency", f64::from(kilohertz)));
        Ok(())
    }
}
