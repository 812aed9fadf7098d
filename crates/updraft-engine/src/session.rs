//! Flight session wiring: construction, lifecycle, and shutdown.
//!
//! A [`FlightSession`] owns the blackboard, the signal hub, the sink
//! registry, and both worker threads. Constructing one brings the whole
//! pipeline up; dropping it (or calling
//! [`shutdown`](FlightSession::shutdown)) takes it down without
//! leaking a thread.

use std::sync::Arc;
use std::time::Instant;

use updraft_core::{Computer, DeviceId, SettingsSink};

use crate::blackboard::Blackboard;
use crate::compute::{ComputeHandle, ComputeTick, PendingState};
use crate::config::{ConfigError, EngineConfig};
use crate::device::SinkRegistry;
use crate::merge::MergeTick;
use crate::scheduler::{ScheduledWorker, WorkerState};
use crate::signals::{Signals, TriggerFabric};

// ── ShutdownReport ───────────────────────────────────────────────

/// Report from the shutdown sequence.
#[derive(Debug)]
pub struct ShutdownReport {
    /// Total time spent in the shutdown sequence.
    pub total_ms: u64,
    /// Time spent joining the merge worker.
    pub merge_join_ms: u64,
    /// Time spent joining the compute worker.
    pub compute_join_ms: u64,
    /// Whether the merge worker joined without panicking.
    pub merge_joined: bool,
    /// Whether the compute worker joined without panicking.
    pub compute_joined: bool,
}

// ── FlightSession ────────────────────────────────────────────────

/// One live flight's engine: blackboard, signals, and both workers.
///
/// Drivers write through [`blackboard()`](Self::blackboard), consumers
/// subscribe through [`signals()`](Self::signals), and everything else
/// goes through the [`fabric()`](Self::fabric) and
/// [`compute()`](Self::compute) handles. The embedder's periodic timer
/// should call the blackboard's
/// [`expire_wall_clock`](Blackboard::expire_wall_clock) so silent
/// devices get disconnected; the session does not own a timer thread.
pub struct FlightSession {
    blackboard: Arc<Blackboard>,
    signals: Arc<Signals>,
    sinks: Arc<SinkRegistry>,
    compute_handle: ComputeHandle,
    merge_worker: ScheduledWorker,
    compute_worker: ScheduledWorker,
    shut_down: bool,
}

impl FlightSession {
    /// Validate `config`, build the pipeline, and start both workers.
    ///
    /// `computer` is the expensive pass;
    /// [`CruiseComputer`](crate::compute::CruiseComputer) is the
    /// bundled choice. Thread spawn failure aborts the process.
    pub fn new(config: EngineConfig, computer: Box<dyn Computer>) -> Result<Self, ConfigError> {
        config.validate()?;

        let blackboard = Arc::new(Blackboard::new(&config));
        let signals = Arc::new(Signals::new());
        let sinks = Arc::new(SinkRegistry::new());
        let pending = Arc::new(PendingState::new(config.settings.clone()));

        let compute_tick = ComputeTick::new(
            Arc::clone(&blackboard),
            Arc::clone(&signals),
            Arc::clone(&pending),
            computer,
        );
        let mut compute_worker =
            ScheduledWorker::new("updraft-compute", config.compute, Box::new(compute_tick));
        let compute_handle = ComputeHandle::new(pending, compute_worker.trigger_handle());

        let merge_tick = MergeTick::new(
            Arc::clone(&blackboard),
            Arc::clone(&signals),
            Arc::clone(&sinks),
            compute_handle.clone(),
        );
        let mut merge_worker =
            ScheduledWorker::new("updraft-merge", config.merge, Box::new(merge_tick));

        // Writes arriving from here on wake the merge worker themselves.
        blackboard.install_merge_trigger(merge_worker.trigger_handle());

        compute_worker.start();
        merge_worker.start();
        log::debug!(
            "flight session started with {} device slot(s)",
            blackboard.device_count()
        );

        Ok(Self {
            blackboard,
            signals,
            sinks,
            compute_handle,
            merge_worker,
            compute_worker,
            shut_down: false,
        })
    }

    // ── Accessors ────────────────────────────────────────────────

    /// The shared blackboard, for drivers and consumers.
    pub fn blackboard(&self) -> &Arc<Blackboard> {
        &self.blackboard
    }

    /// The consumer signal hub.
    pub fn signals(&self) -> &Arc<Signals> {
        &self.signals
    }

    /// A handle over the compute pass's settings and triggers.
    pub fn compute(&self) -> ComputeHandle {
        self.compute_handle.clone()
    }

    /// Producer-facing triggers for both passes.
    pub fn fabric(&self) -> TriggerFabric {
        TriggerFabric::new(self.merge_worker.trigger_handle(), self.compute_handle.clone())
    }

    /// Register (or replace) the settings sink for a device slot. The
    /// bridge echoes other devices' setting changes into it.
    pub fn register_sink(&self, device: DeviceId, sink: Box<dyn SettingsSink>) {
        self.sinks.register(device, sink);
    }

    /// Remove a device slot's settings sink.
    pub fn unregister_sink(&self, device: DeviceId) {
        self.sinks.unregister(device);
    }

    /// Send an audio volume, 0 to 100 percent, to every registered
    /// sink. A direct command: it has no merged state, so it bypasses
    /// the settings bridge. Sinks that cannot accept it are skipped.
    pub fn set_volume(&self, percent: u32) {
        self.sinks.broadcast("volume", |sink| sink.put_volume(percent));
    }

    /// Tune the active radio frequency, in kilohertz, on every
    /// registered sink. A direct command like
    /// [`set_volume`](Self::set_volume).
    pub fn set_active_frequency(&self, kilohertz: u32) {
        self.sinks
            .broadcast("active frequency", |sink| sink.put_active_frequency(kilohertz));
    }

    /// Lifecycle state of the merge worker.
    pub fn merge_state(&self) -> WorkerState {
        self.merge_worker.state()
    }

    /// Lifecycle state of the compute worker.
    pub fn compute_state(&self) -> WorkerState {
        self.compute_worker.state()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Park both workers at their next tick boundary.
    ///
    /// Used around blocking UI that must see unchanging data. Triggers
    /// arriving while suspended stay pending and run after
    /// [`resume_all`](Self::resume_all).
    pub fn suspend_all(&self) {
        self.merge_worker.suspend();
        self.compute_worker.suspend();
    }

    /// Wake both workers from suspension.
    pub fn resume_all(&self) {
        self.merge_worker.resume();
        self.compute_worker.resume();
    }

    /// Stop both workers and join their threads.
    ///
    /// Idempotent: repeat calls return an empty report. Stop is
    /// requested on both before either is joined, so the workers wind
    /// down in parallel.
    pub fn shutdown(&mut self) -> ShutdownReport {
        if self.shut_down {
            return ShutdownReport {
                total_ms: 0,
                merge_join_ms: 0,
                compute_join_ms: 0,
                merge_joined: true,
                compute_joined: true,
            };
        }
        self.shut_down = true;
        let start = Instant::now();

        self.merge_worker.stop();
        self.compute_worker.stop();

        let merge_start = Instant::now();
        let merge_joined = self.merge_worker.join();
        let merge_join_ms = merge_start.elapsed().as_millis() as u64;

        let compute_start = Instant::now();
        let compute_joined = self.compute_worker.join();
        let compute_join_ms = compute_start.elapsed().as_millis() as u64;

        if !merge_joined || !compute_joined {
            log::warn!("a worker thread panicked before shutdown");
        }

        let report = ShutdownReport {
            total_ms: start.elapsed().as_millis() as u64,
            merge_join_ms,
            compute_join_ms,
            merge_joined,
            compute_joined,
        };
        log::debug!("flight session shut down in {}ms", report.total_ms);
        report
    }
}

impl Drop for FlightSession {
    fn drop(&mut self) {
        if !self.shut_down {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for FlightSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightSession")
            .field("devices", &self.blackboard.device_count())
            .field("merge", &self.merge_worker.state())
            .field("compute", &self.compute_worker.state())
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

const _: fn() = || {
    fn assert_send<T: Send>() {}
    assert_send::<FlightSession>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::compute::CruiseComputer;

    fn session() -> FlightSession {
        FlightSession::new(EngineConfig::default(), Box::new(CruiseComputer::new()))
            .expect("default config must validate")
    }

    fn wait_for(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            device_count: 0,
            ..EngineConfig::default()
        };
        let err = FlightSession::new(config, Box::new(CruiseComputer::new())).unwrap_err();
        assert_eq!(err, ConfigError::NoDevices);
    }

    #[test]
    fn starts_both_workers() {
        let mut session = session();
        assert_eq!(session.merge_state(), WorkerState::Running);
        assert_eq!(session.compute_state(), WorkerState::Running);
        let report = session.shutdown();
        assert!(report.merge_joined && report.compute_joined);
        assert_eq!(session.merge_state(), WorkerState::Stopped);
        assert_eq!(session.compute_state(), WorkerState::Stopped);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut session = session();
        let first = session.shutdown();
        assert!(first.merge_joined && first.compute_joined);

        let second = session.shutdown();
        assert_eq!(second.total_ms, 0);
        assert_eq!(second.merge_join_ms, 0);
        assert!(second.merge_joined && second.compute_joined);
    }

    #[test]
    fn shutdown_is_prompt() {
        let mut session = session();
        let start = Instant::now();
        session.shutdown();
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "shutdown blocked on a timed wait"
        );
    }

    #[test]
    fn drop_without_shutdown_joins_cleanly() {
        let session = session();
        drop(session);
        // Returning at all means both threads joined.
    }

    #[test]
    fn suspend_parks_both_workers() {
        let mut session = session();
        session.suspend_all();
        assert!(
            wait_for(Duration::from_secs(2), || {
                session.merge_state() == WorkerState::Suspended
                    && session.compute_state() == WorkerState::Suspended
            }),
            "workers did not park"
        );

        session.resume_all();
        assert!(
            wait_for(Duration::from_secs(2), || {
                session.merge_state() == WorkerState::Running
                    && session.compute_state() == WorkerState::Running
            }),
            "workers did not wake"
        );
        session.shutdown();
    }
}
