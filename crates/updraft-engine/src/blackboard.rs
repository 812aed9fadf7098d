//! The shared blackboard: per-source snapshot slots and the fused
//! current state.
//!
//! Drivers write whole [`SensorSnapshot`]s into their slot; the merge
//! worker folds the slots (or the simulator or replay source) into one
//! [`CurrentSnapshot`] that every consumer reads. Writers never touch
//! the current snapshot directly: it is replaced wholesale by a merge
//! and nowhere else, so readers always see one source's coherent state,
//! never a torn mix of two updates.
//!
//! All state lives behind a single mutex. Every hold is a copy, a fold
//! over at most [`MAX_DEVICES`](crate::config::MAX_DEVICES) slots, or
//! the cheap calculators; nothing blocks while holding it.

use std::sync::{Mutex, OnceLock};

use updraft_core::{
    Angle, ClockUnwrapper, ComputeSettings, CurrentSnapshot, DerivedResult, DeviceId, GeoPoint,
    SensorSnapshot, Source, TimeStamp, WallTime,
};

use crate::calc::{run_basic, CalcState};
use crate::config::EngineConfig;
use crate::device::{BridgeState, SettingChanges};
use crate::scheduler::TriggerHandle;

// ── Merge outcomes ───────────────────────────────────────────────

/// What one merge pass observed, for deciding downstream wake-ups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Which source won this merge.
    pub source: Source,
    /// A position fix is present where the previous merge had none.
    pub fix_appeared: bool,
    /// The previous merge had a position fix and this one does not.
    pub fix_lost: bool,
    /// The fix timestamp moved forward past the previous merge's.
    pub fix_advanced: bool,
}

impl MergeSummary {
    /// True when this merge changed what a position consumer sees.
    pub fn fix_event(&self) -> bool {
        self.fix_appeared || self.fix_lost || self.fix_advanced
    }
}

/// One merge worker pass: merge, cheap calculators, settings bridge,
/// all under a single lock hold.
pub(crate) struct MergeCycleOutcome {
    pub(crate) summary: MergeSummary,
    pub(crate) changes: SettingChanges,
}

/// Consistent copy handed to the compute worker, taken in one lock
/// hold so the expensive pass runs entirely outside the lock.
pub(crate) struct ComputeCopy {
    pub(crate) current: CurrentSnapshot,
    pub(crate) previous: DerivedResult,
    /// Fix time of `current`, present only with a valid fix and clock.
    pub(crate) fix_time: Option<TimeStamp>,
    /// The fix advanced past the compute worker's last processed fix.
    pub(crate) new_data: bool,
    /// The fix moved backwards: flight restart or replay rewind.
    pub(crate) regressed: bool,
}

// ── State ────────────────────────────────────────────────────────

struct DeviceSlot {
    snapshot: SensorSnapshot,
    clock: ClockUnwrapper,
}

struct BlackboardState {
    slots: Vec<DeviceSlot>,
    simulator: SensorSnapshot,
    simulator_enabled: bool,
    replay: SensorSnapshot,
    replay_active: bool,
    replay_clock: ClockUnwrapper,
    current: CurrentSnapshot,
    derived: DerivedResult,
}

impl BlackboardState {
    /// Pick the winning source and replace the current sensor state.
    ///
    /// Precedence is replay over simulator over the folded live slots;
    /// an active playback must never be contaminated by live input.
    /// The basic derived block is left for the caller: a bare merge
    /// refreshes only what was measured.
    fn merge_locked(&mut self) -> MergeSummary {
        let previous = &self.current.sensor;
        let had_fix = previous.location_available.valid();
        let previous_time = previous
            .time_available
            .valid()
            .then_some(previous.time_of_fix);

        let (sensor, source) = if self.replay_active {
            (self.replay.clone(), Source::Replay)
        } else if self.simulator_enabled {
            (self.simulator.clone(), Source::Simulator)
        } else {
            // Slot order is priority order: earlier slots keep their
            // fields, later slots only fill gaps.
            let mut folded = SensorSnapshot::default();
            for slot in &self.slots {
                folded.complement(&slot.snapshot);
            }
            (folded, Source::Real)
        };

        let has_fix = sensor.location_available.valid();
        let fix_advanced = has_fix
            && sensor.time_available.valid()
            && previous_time.is_none_or(|prev| sensor.time_of_fix > prev);

        self.current.sensor = sensor;
        self.current.source = source;

        MergeSummary {
            source,
            fix_appeared: has_fix && !had_fix,
            fix_lost: !has_fix && had_fix,
            fix_advanced,
        }
    }
}

// ── Blackboard ───────────────────────────────────────────────────

/// The shared snapshot store.
///
/// Created once per session and shared behind an `Arc`. All methods
/// take `&self`; writers come from driver threads, the two workers,
/// and the embedder's UI thread concurrently.
///
/// Nothing here watches the wall clock on its own. The embedder calls
/// [`expire_wall_clock`](Blackboard::expire_wall_clock) from a periodic
/// timer so silent devices are eventually declared disconnected.
pub struct Blackboard {
    state: Mutex<BlackboardState>,
    /// Filled once at session start; writes before that merge on demand
    /// only, which is exactly what direct (workerless) use wants.
    merge_trigger: OnceLock<TriggerHandle>,
    /// Connection expiry in seconds.
    expiry: f64,
}

impl Blackboard {
    /// Empty blackboard laid out per `config`.
    ///
    /// Call [`EngineConfig::validate`] first; this trusts the counts.
    pub fn new(config: &EngineConfig) -> Self {
        let clock = ClockUnwrapper::with_config(config.clock.epsilon, config.clock.rollover);
        let slots = (0..config.device_count)
            .map(|_| DeviceSlot {
                snapshot: SensorSnapshot::default(),
                clock: clock.clone(),
            })
            .collect();
        Self {
            state: Mutex::new(BlackboardState {
                slots,
                simulator: SensorSnapshot::default(),
                simulator_enabled: false,
                replay: SensorSnapshot::default(),
                replay_active: false,
                replay_clock: clock,
                current: CurrentSnapshot::default(),
                derived: DerivedResult::default(),
            }),
            merge_trigger: OnceLock::new(),
            expiry: config.connection_timeout.as_secs_f64(),
        }
    }

    /// Number of device slots.
    pub fn device_count(&self) -> usize {
        self.state.lock().unwrap().slots.len()
    }

    pub(crate) fn install_merge_trigger(&self, handle: TriggerHandle) {
        if self.merge_trigger.set(handle).is_err() {
            log::debug!("merge trigger already installed");
        }
    }

    fn schedule_merge(&self) {
        if let Some(trigger) = self.merge_trigger.get() {
            trigger.trigger();
        }
    }

    // ── Device slots ─────────────────────────────────────────────

    /// Store a device's snapshot and schedule a merge.
    ///
    /// The slot's clock unwrapper stamps `time_of_fix` from the raw
    /// `device_clock` here, at the write boundary, so everything past
    /// the slot sees monotonic time. A snapshot for an out-of-range
    /// device is dropped with a warning.
    pub fn write_device_slot(&self, device: DeviceId, mut snapshot: SensorSnapshot) {
        {
            let mut state = self.state.lock().unwrap();
            let Some(slot) = state.slots.get_mut(device.0) else {
                log::warn!("dropping snapshot for unknown device {device}");
                return;
            };
            if snapshot.time_available.valid() {
                snapshot.time_of_fix = slot.clock.unwrap_next(snapshot.device_clock);
            }
            slot.snapshot = snapshot;
        }
        self.schedule_merge();
    }

    /// Copy of a device slot's last snapshot; default for unknown ids.
    pub fn read_device_slot(&self, device: DeviceId) -> SensorSnapshot {
        let state = self.state.lock().unwrap();
        state
            .slots
            .get(device.0)
            .map(|slot| slot.snapshot.clone())
            .unwrap_or_default()
    }

    /// Expire silent connections against the wall clock.
    ///
    /// Every slot is checked on every call. Returns true only when some
    /// slot crossed from connected to disconnected on this call
    /// (edge-triggered); an edge also schedules a merge so the lost
    /// fields leave the current snapshot promptly.
    pub fn expire_wall_clock(&self, now: WallTime) -> bool {
        let mut expired = false;
        {
            let mut state = self.state.lock().unwrap();
            for (index, slot) in state.slots.iter_mut().enumerate() {
                if slot.snapshot.expire_wall_clock(now, self.expiry) {
                    log::info!(
                        "device {} disconnected after {:.0}s silence",
                        DeviceId(index),
                        self.expiry
                    );
                    expired = true;
                }
            }
        }
        if expired {
            self.schedule_merge();
        }
        expired
    }

    // ── Simulator source ─────────────────────────────────────────

    /// Switch the simulator source on or off.
    ///
    /// Turning it off invalidates the simulator snapshot's measurements
    /// so a later re-enable cannot resurrect a stale fix; position and
    /// controls are kept for [`simulate_step`](Blackboard::simulate_step)
    /// to continue from after a fresh init.
    pub fn set_simulator(&self, enabled: bool) {
        {
            let mut state = self.state.lock().unwrap();
            if state.simulator_enabled == enabled {
                return;
            }
            state.simulator_enabled = enabled;
            if !enabled {
                state.simulator.connected.clear();
                state.simulator.clear_measurements();
            }
        }
        self.schedule_merge();
    }

    /// Whether the simulator source is switched on.
    pub fn simulator_enabled(&self) -> bool {
        self.state.lock().unwrap().simulator_enabled
    }

    /// Place the simulated aircraft and start its clock at zero.
    pub fn simulator_init(&self, location: GeoPoint, altitude_m: f64, now: WallTime) {
        {
            let mut state = self.state.lock().unwrap();
            let sim = &mut state.simulator;
            *sim = SensorSnapshot::default();
            sim.received = now;
            sim.connected.update(now);
            sim.location = location;
            sim.location_available.update(now);
            sim.gps_altitude = altitude_m;
            sim.gps_altitude_available.update(now);
            sim.track_available.update(now);
            sim.ground_speed_available.update(now);
            sim.time_available.update(now);
        }
        self.schedule_merge();
    }

    /// Adjust the simulated track, ground speed, or altitude.
    pub fn simulator_controls(
        &self,
        track: Option<Angle>,
        ground_speed: Option<f64>,
        altitude_m: Option<f64>,
        now: WallTime,
    ) {
        {
            let mut state = self.state.lock().unwrap();
            let sim = &mut state.simulator;
            if let Some(track) = track {
                sim.track = track;
                sim.track_available.update(now);
            }
            if let Some(speed) = ground_speed {
                sim.ground_speed = speed;
                sim.ground_speed_available.update(now);
            }
            if let Some(altitude) = altitude_m {
                sim.gps_altitude = altitude;
                sim.gps_altitude_available.update(now);
            }
        }
        self.schedule_merge();
    }

    /// Advance the simulated aircraft by `dt` seconds along its track.
    ///
    /// No-op while the simulator is off, uninitialised, or shadowed by
    /// an active replay. The simulated clock is monotonic by
    /// construction and bypasses the unwrappers.
    pub fn simulate_step(&self, dt: f64, now: WallTime) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.simulator_enabled || state.replay_active {
                return;
            }
            let sim = &mut state.simulator;
            if !sim.connected.valid() {
                return;
            }
            let distance = sim.ground_speed * dt;
            if distance > 0.0 {
                sim.location = sim.location.offset(sim.track, distance);
            }
            sim.time_of_fix = TimeStamp::from_seconds(sim.time_of_fix.seconds() + dt);
            sim.device_clock = sim.time_of_fix.seconds();
            sim.received = now;
            sim.connected.update(now);
            sim.time_available.update(now);
            sim.location_available.update(now);
            sim.track_available.update(now);
            sim.ground_speed_available.update(now);
            sim.gps_altitude_available.update(now);
        }
        self.schedule_merge();
    }

    // ── Replay source ────────────────────────────────────────────

    /// Store the next replayed snapshot and activate the replay source.
    ///
    /// The replay clock unwrapper stamps `time_of_fix` like a device
    /// slot's, so logs spanning midnight play back monotonic.
    pub fn set_replay_state(&self, mut snapshot: SensorSnapshot) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.replay_active {
                log::info!("replay started, live sources shadowed");
            }
            if snapshot.time_available.valid() {
                snapshot.time_of_fix = state.replay_clock.unwrap_next(snapshot.device_clock);
            }
            state.replay = snapshot;
            state.replay_active = true;
        }
        self.schedule_merge();
    }

    /// Deactivate replay and hand the next merge back to the live
    /// sources. The replay snapshot and its clock are discarded.
    pub fn stop_replay(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.replay_active {
                return;
            }
            state.replay_active = false;
            state.replay = SensorSnapshot::default();
            state.replay_clock.reset();
            log::info!("replay stopped");
        }
        self.schedule_merge();
    }

    /// Whether a replay is currently shadowing the live sources.
    pub fn replay_active(&self) -> bool {
        self.state.lock().unwrap().replay_active
    }

    // ── Flight reset ─────────────────────────────────────────────

    /// Start a fresh monotonic epoch on every source clock.
    ///
    /// The next write through each source restarts its timeline at the
    /// raw reading; the compute worker observes the fix-time regression
    /// and resets its computer, so no further plumbing is needed.
    pub fn restart_flight(&self) {
        {
            let mut state = self.state.lock().unwrap();
            for slot in &mut state.slots {
                slot.clock.reset();
            }
            state.replay_clock.reset();
        }
        log::info!("flight restarted");
        self.schedule_merge();
    }

    // ── Fused state ──────────────────────────────────────────────

    /// Fold the winning source into the current snapshot.
    ///
    /// The workers call this for every tick; calling it directly is
    /// for workerless use and refreshes only the sensor part, not the
    /// basic derived block.
    pub fn merge(&self) -> MergeSummary {
        self.state.lock().unwrap().merge_locked()
    }

    /// One merge worker pass under a single lock hold: merge, rerun
    /// the cheap calculators, and collect device-reported setting
    /// changes from the live slots.
    pub(crate) fn merge_cycle(
        &self,
        calc: &mut CalcState,
        bridge: &mut BridgeState,
        settings: &ComputeSettings,
    ) -> MergeCycleOutcome {
        let mut state = self.state.lock().unwrap();
        let summary = state.merge_locked();
        run_basic(&mut state.current, calc, settings);
        let changes = bridge.collect(state.slots.iter().map(|slot| &slot.snapshot), settings);
        MergeCycleOutcome { summary, changes }
    }

    /// Copy of the fused current snapshot.
    pub fn read_current(&self) -> CurrentSnapshot {
        self.state.lock().unwrap().current.clone()
    }

    /// Copy of the last completed computation result.
    pub fn read_derived(&self) -> DerivedResult {
        self.state.lock().unwrap().derived.clone()
    }

    pub(crate) fn write_derived(&self, derived: DerivedResult) {
        self.state.lock().unwrap().derived = derived;
    }

    /// Consistent input copy for the compute worker, comparing the
    /// current fix time against the worker's last processed one.
    pub(crate) fn copy_for_compute(&self, last_fix: Option<TimeStamp>) -> ComputeCopy {
        let state = self.state.lock().unwrap();
        let sensor = &state.current.sensor;
        let fix_time = (sensor.location_available.valid() && sensor.time_available.valid())
            .then_some(sensor.time_of_fix);
        let (new_data, regressed) = match (fix_time, last_fix) {
            (Some(t), Some(prev)) => (t > prev, t < prev),
            (Some(_), None) => (true, false),
            (None, _) => (false, false),
        };
        ComputeCopy {
            current: state.current.clone(),
            previous: state.derived.clone(),
            fix_time,
            new_data,
            regressed,
        }
    }
}

const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Blackboard>();
};
