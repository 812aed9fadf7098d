//! The compute worker: expensive, rate-limited derived computation.
//!
//! The worker copies the fused snapshot out of the blackboard, runs a
//! pluggable [`Computer`] on the copy outside every lock, and writes
//! the whole [`DerivedResult`] back. Pending settings and the force
//! flag live behind their own mutex; the blackboard lock and the
//! settings lock are taken strictly one after the other, never nested.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use updraft_core::{
    CancelToken, ComputeError, ComputeInput, ComputeSettings, Computer, DerivedResult, GeoPoint,
    TimeStamp,
};

use crate::blackboard::Blackboard;
use crate::device::SettingChange;
use crate::scheduler::{Tickable, TriggerHandle};
use crate::signals::Signals;

// ── Pending state ────────────────────────────────────────────────

/// Settings and the force flag shared between the compute worker and
/// every [`ComputeHandle`] clone.
pub(crate) struct PendingState {
    settings: Mutex<ComputeSettings>,
    force: AtomicBool,
}

impl PendingState {
    pub(crate) fn new(settings: ComputeSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            force: AtomicBool::new(false),
        }
    }

    fn settings(&self) -> ComputeSettings {
        self.settings.lock().unwrap().clone()
    }

    fn take_force(&self) -> bool {
        self.force.swap(false, Ordering::AcqRel)
    }
}

// ── ComputeHandle ────────────────────────────────────────────────

/// Shared control over the compute pass.
///
/// Cheap to clone; every clone reads and writes the same pending
/// settings and wakes the same worker. This is the only way any
/// subsystem changes computation settings: the worker itself never
/// writes them, it clones them at the top of each pass.
#[derive(Clone)]
pub struct ComputeHandle {
    pending: Arc<PendingState>,
    trigger: TriggerHandle,
}

impl ComputeHandle {
    pub(crate) fn new(pending: Arc<PendingState>, trigger: TriggerHandle) -> Self {
        Self { pending, trigger }
    }

    /// Copy of the settings currently in effect.
    pub fn settings(&self) -> ComputeSettings {
        self.pending.settings()
    }

    /// Edit the settings and force a recomputation.
    ///
    /// The closure runs under the settings mutex; keep it to plain
    /// field assignments.
    pub fn update_settings(&self, update: impl FnOnce(&mut ComputeSettings)) {
        {
            let mut settings = self.pending.settings.lock().unwrap();
            update(&mut settings);
        }
        self.force_trigger();
    }

    /// Request a recomputation even though no new sensor data arrived.
    pub fn force_trigger(&self) {
        self.pending.force.store(true, Ordering::Release);
        self.trigger.trigger();
    }

    /// Request a tick; the pass runs only if the fix advanced.
    pub(crate) fn trigger(&self) {
        self.trigger.trigger();
    }

    /// Write one device-reported change into the settings without
    /// forcing a run; the merge worker forces once per batch.
    pub(crate) fn apply_change(&self, change: &SettingChange) {
        let mut settings = self.pending.settings.lock().unwrap();
        change.apply(&mut settings);
    }
}

impl std::fmt::Debug for ComputeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeHandle").finish()
    }
}

// ── Compute tick ─────────────────────────────────────────────────

/// Tick body of the compute worker.
pub(crate) struct ComputeTick {
    blackboard: Arc<Blackboard>,
    signals: Arc<Signals>,
    pending: Arc<PendingState>,
    computer: Box<dyn Computer>,
    /// Fix time of the last pass that completed, None before the first.
    last_fix: Option<TimeStamp>,
}

impl ComputeTick {
    pub(crate) fn new(
        blackboard: Arc<Blackboard>,
        signals: Arc<Signals>,
        pending: Arc<PendingState>,
        computer: Box<dyn Computer>,
    ) -> Self {
        Self {
            blackboard,
            signals,
            pending,
            computer,
            last_fix: None,
        }
    }
}

impl Tickable for ComputeTick {
    fn tick(&mut self, cancel: &CancelToken) {
        // Blackboard lock, then settings lock, one after the other.
        let copy = self.blackboard.copy_for_compute(self.last_fix);
        let settings = self.pending.settings();
        let forced = self.pending.take_force();

        if copy.regressed {
            // Flight restart or replay rewind: accumulated history is
            // from a timeline that no longer exists.
            log::debug!("fix time regressed, resetting computer");
            self.computer.reset();
        }

        if copy.new_data || copy.regressed || forced {
            let input = ComputeInput {
                current: copy.current,
                settings,
                previous: copy.previous.clone(),
            };
            match self.computer.compute(&input, cancel) {
                Ok(result) => {
                    self.last_fix = copy.fix_time;
                    let changed = result != copy.previous;
                    self.blackboard.write_derived(result);
                    if changed {
                        self.signals.derived_ready().notify();
                    }
                }
                // last_fix stays put on failure: the same fix counts
                // as new data again on the next trigger.
                Err(ComputeError::Cancelled) => {
                    log::debug!("computation cancelled mid-pass");
                }
                Err(e) => {
                    log::warn!("computation failed, keeping previous result: {e}");
                }
            }
        }

        // Lowest priority, after all locks are released.
        self.computer.idle(cancel);
    }
}

// ── CruiseComputer ───────────────────────────────────────────────

/// The bundled computation pass: flight time, distance flown, and a
/// windowed climb average.
///
/// Deliberately modest; task and contest solvers implement the same
/// [`Computer`] trait and replace it at session construction.
#[derive(Debug, Default)]
pub struct CruiseComputer {
    first_fix: Option<TimeStamp>,
    last_location: Option<GeoPoint>,
    distance_flown: f64,
    /// Climb samples as (fix time, m/s), oldest first.
    samples: VecDeque<(TimeStamp, f64)>,
}

impl CruiseComputer {
    /// A computer with no accumulated history.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Computer for CruiseComputer {
    fn compute(
        &mut self,
        input: &ComputeInput,
        cancel: &CancelToken,
    ) -> Result<DerivedResult, ComputeError> {
        if cancel.is_cancelled() {
            return Err(ComputeError::Cancelled);
        }
        let sensor = &input.current.sensor;
        if !sensor.location_available.valid() || !sensor.time_available.valid() {
            return Err(ComputeError::InsufficientData {
                reason: "no position fix".into(),
            });
        }
        let fix = sensor.time_of_fix;
        let first = *self.first_fix.get_or_insert(fix);

        // Great-circle integration fix to fix. A forced re-run on the
        // same fix adds a zero-length leg.
        if let Some(last) = self.last_location {
            self.distance_flown += last.distance_to(&sensor.location);
        }
        self.last_location = Some(sensor.location);

        // One climb sample per advancing fix: device TE vario when
        // supplied, the merge worker's GPS vario otherwise.
        let climb = if sensor.total_energy_vario_available.valid() {
            Some(sensor.total_energy_vario)
        } else if input.current.basic.gps_vario_available.valid() {
            Some(input.current.basic.gps_vario)
        } else {
            None
        };
        if let Some(climb) = climb {
            if self.samples.back().is_none_or(|&(t, _)| fix > t) {
                self.samples.push_back((fix, climb));
            }
        }
        while let Some(&(t, _)) = self.samples.front() {
            if fix.seconds() - t.seconds() > input.settings.average_climb_window {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        let mut result = DerivedResult {
            last_calculated: Some(fix),
            flight_time: fix.seconds() - first.seconds(),
            distance_flown_m: self.distance_flown,
            ..DerivedResult::default()
        };
        // A single sample is not an average yet.
        if self.samples.len() >= 2 {
            let sum: f64 = self.samples.iter().map(|&(_, v)| v).sum();
            result.average_climb = sum / self.samples.len() as f64;
            result.average_climb_available.update(sensor.received);
        }
        Ok(result)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use updraft_core::{CurrentSnapshot, SensorSnapshot, WallTime};

    fn fix_at(clock: f64, lat: f64, lon: f64) -> CurrentSnapshot {
        let mut sensor = SensorSnapshot::default();
        let wall = WallTime::from_seconds(clock);
        sensor.received = wall;
        sensor.connected.update(wall);
        sensor.time_of_fix = TimeStamp::from_seconds(clock);
        sensor.time_available.update(wall);
        sensor.location = GeoPoint::new(lat, lon);
        sensor.location_available.update(wall);
        CurrentSnapshot {
            sensor,
            ..CurrentSnapshot::default()
        }
    }

    fn input_for(current: CurrentSnapshot) -> ComputeInput {
        ComputeInput {
            current,
            settings: ComputeSettings::default(),
            previous: DerivedResult::default(),
        }
    }

    fn run(computer: &mut CruiseComputer, current: CurrentSnapshot) -> DerivedResult {
        computer
            .compute(&input_for(current), &CancelToken::new())
            .unwrap()
    }

    #[test]
    fn refuses_to_run_without_a_fix() {
        let mut computer = CruiseComputer::new();
        let err = computer
            .compute(&input_for(CurrentSnapshot::default()), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ComputeError::InsufficientData { .. }));
    }

    #[test]
    fn bails_out_when_cancelled() {
        let mut computer = CruiseComputer::new();
        let cancel = CancelToken::new();
        cancel.set();
        let err = computer
            .compute(&input_for(fix_at(10.0, 47.0, 9.0)), &cancel)
            .unwrap_err();
        assert_eq!(err, ComputeError::Cancelled);
    }

    #[test]
    fn integrates_distance_and_flight_time() {
        let mut computer = CruiseComputer::new();
        let first = run(&mut computer, fix_at(100.0, 47.0, 9.0));
        assert_eq!(first.flight_time, 0.0);
        assert_eq!(first.distance_flown_m, 0.0);
        assert_eq!(first.last_calculated, Some(TimeStamp::from_seconds(100.0)));

        let second = run(&mut computer, fix_at(160.0, 47.0, 9.01));
        assert_eq!(second.flight_time, 60.0);
        let leg = GeoPoint::new(47.0, 9.0).distance_to(&GeoPoint::new(47.0, 9.01));
        assert!((second.distance_flown_m - leg).abs() < 0.01);

        // Distance accumulates leg by leg.
        let third = run(&mut computer, fix_at(220.0, 47.0, 9.02));
        assert!((third.distance_flown_m - 2.0 * leg).abs() < 0.1);
    }

    #[test]
    fn forced_rerun_on_same_fix_adds_nothing() {
        let mut computer = CruiseComputer::new();
        run(&mut computer, fix_at(100.0, 47.0, 9.0));
        let again = run(&mut computer, fix_at(100.0, 47.0, 9.0));
        assert_eq!(again.distance_flown_m, 0.0);
        assert_eq!(again.flight_time, 0.0);
    }

    #[test]
    fn averages_climb_over_the_window() {
        let mut computer = CruiseComputer::new();
        let mut climbing = |clock: f64, vario: f64| {
            let mut current = fix_at(clock, 47.0, 9.0);
            current.sensor.total_energy_vario = vario;
            current
                .sensor
                .total_energy_vario_available
                .update(WallTime::from_seconds(clock));
            run(&mut computer, current)
        };

        let one = climbing(100.0, 2.0);
        assert!(
            !one.average_climb_available.valid(),
            "one sample is not an average"
        );

        let two = climbing(110.0, 1.0);
        assert!(two.average_climb_available.valid());
        assert!((two.average_climb - 1.5).abs() < 1e-9);

        // 30s window: the sample at 100 ages out by clock 135.
        let three = climbing(135.0, 3.0);
        assert!((three.average_climb - 2.0).abs() < 1e-9, "old sample kept");
    }

    #[test]
    fn falls_back_to_gps_vario_for_climb() {
        let mut computer = CruiseComputer::new();
        let mut current = fix_at(100.0, 47.0, 9.0);
        current.basic.gps_vario = 1.2;
        current
            .basic
            .gps_vario_available
            .update(WallTime::from_seconds(100.0));
        run(&mut computer, current);

        let mut current = fix_at(110.0, 47.0, 9.001);
        current.basic.gps_vario = 0.8;
        current
            .basic
            .gps_vario_available
            .update(WallTime::from_seconds(110.0));
        let result = run(&mut computer, current);
        assert!(result.average_climb_available.valid());
        assert!((result.average_climb - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reset_drops_all_history() {
        let mut computer = CruiseComputer::new();
        run(&mut computer, fix_at(100.0, 47.0, 9.0));
        run(&mut computer, fix_at(160.0, 47.0, 9.01));
        computer.reset();

        let fresh = run(&mut computer, fix_at(5.0, 47.0, 9.0));
        assert_eq!(fresh.flight_time, 0.0);
        assert_eq!(fresh.distance_flown_m, 0.0);
        assert_eq!(fresh.last_calculated, Some(TimeStamp::from_seconds(5.0)));
    }
}
