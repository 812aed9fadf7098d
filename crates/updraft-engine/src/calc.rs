//! Cheap always-on calculators run inside every merge tick.
//!
//! These fill the basic derived block of the current snapshot from the
//! freshly merged sensor values. Everything here is a few arithmetic
//! operations per tick and runs under the blackboard lock; anything
//! heavier belongs in a [`Computer`](updraft_core::Computer).

use updraft_core::{wind_triangle, ComputeSettings, CurrentSnapshot, Source, TimeStamp, GRAVITY};

/// Previous-tick observations the delta calculators need.
///
/// Owned by the merge worker. Reset when fix time regresses, which is
/// how flight restarts and replay rewinds propagate here.
#[derive(Debug, Default)]
pub(crate) struct CalcState {
    last_fix_time: Option<TimeStamp>,
    last_nav_altitude: Option<f64>,
    last_track: Option<updraft_core::Angle>,
}

impl CalcState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Rewrite `current.basic` from `current.sensor`.
///
/// Invalid inputs clear the corresponding outputs; no field here ever
/// aborts the tick.
pub(crate) fn run_basic(
    current: &mut CurrentSnapshot,
    state: &mut CalcState,
    settings: &ComputeSettings,
) {
    nav_altitude(current, settings);
    energy_height(current);
    fix_deltas(current, state);
    netto_estimate(current, settings);
    heading(current, settings);
}

/// Baro altitude when the pilot enabled it and a source supplies a
/// valid one; GPS altitude otherwise. Replay always uses the recorded
/// GPS altitude so the log is reproduced as flown.
fn nav_altitude(current: &mut CurrentSnapshot, settings: &ComputeSettings) {
    let sensor = &current.sensor;
    let basic = &mut current.basic;
    let use_baro = settings.enable_nav_baro_altitude
        && sensor.baro_altitude_available.valid()
        && current.source != Source::Replay;
    if use_baro {
        basic.nav_altitude = sensor.baro_altitude;
        basic.nav_altitude_available = sensor.baro_altitude_available;
    } else if sensor.gps_altitude_available.valid() {
        basic.nav_altitude = sensor.gps_altitude;
        basic.nav_altitude_available = sensor.gps_altitude_available;
    } else {
        basic.nav_altitude_available.clear();
    }
}

fn energy_height(current: &mut CurrentSnapshot) {
    let sensor = &current.sensor;
    current.basic.energy_height = if sensor.airspeed_available.valid() {
        let tas = sensor.airspeed.true_airspeed;
        tas * tas / (2.0 * GRAVITY)
    } else {
        0.0
    };
}

/// GPS vario and turn rate from deltas between ticks whose fix time
/// advanced. A backward fix time resets the delta state; an unchanged
/// one leaves the previous outputs standing.
fn fix_deltas(current: &mut CurrentSnapshot, state: &mut CalcState) {
    let sensor = &current.sensor;
    let basic = &mut current.basic;

    if !sensor.time_available.valid() {
        basic.gps_vario_available.clear();
        basic.turn_rate_available.clear();
        state.reset();
        return;
    }
    let fix = sensor.time_of_fix;

    match state.last_fix_time {
        Some(prev) if fix < prev => {
            basic.gps_vario_available.clear();
            basic.turn_rate_available.clear();
            state.reset();
        }
        Some(prev) if fix > prev => {
            let dt = fix - prev;
            if basic.nav_altitude_available.valid() {
                if let Some(prev_alt) = state.last_nav_altitude {
                    basic.gps_vario = (basic.nav_altitude - prev_alt) / dt;
                    basic.gps_vario_available.update(sensor.received);
                }
            }
            if sensor.track_available.valid() {
                if let Some(prev_track) = state.last_track {
                    basic.turn_rate = sensor.track.difference(prev_track) / dt;
                    basic.turn_rate_available.update(sensor.received);
                }
            }
        }
        _ => {}
    }

    state.last_fix_time = Some(fix);
    if basic.nav_altitude_available.valid() {
        state.last_nav_altitude = Some(basic.nav_altitude);
    }
    if sensor.track_available.valid() {
        state.last_track = Some(sensor.track);
    }
}

/// Device netto when supplied; otherwise the best total-energy reading
/// plus the configured still-air sink rate (positive-down).
fn netto_estimate(current: &mut CurrentSnapshot, settings: &ComputeSettings) {
    let sensor = &current.sensor;
    let basic = &mut current.basic;

    if sensor.netto_vario_available.valid() {
        basic.netto_vario_estimate = sensor.netto_vario;
        basic.netto_vario_estimate_available = sensor.netto_vario_available;
    } else if sensor.total_energy_vario_available.valid() {
        basic.netto_vario_estimate = sensor.total_energy_vario + settings.sink_rate_estimate;
        basic.netto_vario_estimate_available = sensor.total_energy_vario_available;
    } else if basic.gps_vario_available.valid() {
        basic.netto_vario_estimate = basic.gps_vario + settings.sink_rate_estimate;
        basic.netto_vario_estimate_available = basic.gps_vario_available;
    } else {
        basic.netto_vario_estimate_available.clear();
    }
}

/// Wind-triangle heading when wind and ground vector are known, track
/// otherwise.
fn heading(current: &mut CurrentSnapshot, settings: &ComputeSettings) {
    let sensor = &current.sensor;
    let basic = &mut current.basic;

    if !sensor.track_available.valid() {
        basic.heading_available.clear();
        return;
    }
    basic.heading = match settings.wind {
        Some(wind) if sensor.ground_speed_available.valid() => {
            let (heading, _true_airspeed) =
                wind_triangle(sensor.track, sensor.ground_speed, wind);
            heading
        }
        _ => sensor.track,
    };
    basic.heading_available = sensor.track_available;
}

#[cfg(test)]
mod tests {
    use super::*;
    use updraft_core::{Angle, SpeedVector, WallTime};

    fn at(s: f64) -> WallTime {
        WallTime::from_seconds(s)
    }

    fn snapshot_with_fix(fix: f64, wall: f64) -> CurrentSnapshot {
        let mut c = CurrentSnapshot::default();
        c.sensor.connected.update(at(wall));
        c.sensor.received = at(wall);
        c.sensor.time_of_fix = TimeStamp::from_seconds(fix);
        c.sensor.time_available.update(at(wall));
        c
    }

    #[test]
    fn nav_altitude_prefers_baro_when_enabled() {
        let mut c = snapshot_with_fix(10.0, 1.0);
        c.sensor.gps_altitude = 1000.0;
        c.sensor.gps_altitude_available.update(at(1.0));
        c.sensor.baro_altitude = 980.0;
        c.sensor.baro_altitude_available.update(at(1.0));

        let mut state = CalcState::new();
        let mut settings = ComputeSettings::default();
        run_basic(&mut c, &mut state, &settings);
        assert_eq!(c.basic.nav_altitude, 980.0);

        settings.enable_nav_baro_altitude = false;
        run_basic(&mut c, &mut state, &settings);
        assert_eq!(c.basic.nav_altitude, 1000.0);
    }

    #[test]
    fn nav_altitude_ignores_baro_during_replay() {
        let mut c = snapshot_with_fix(10.0, 1.0);
        c.source = Source::Replay;
        c.sensor.gps_altitude = 1000.0;
        c.sensor.gps_altitude_available.update(at(1.0));
        c.sensor.baro_altitude = 980.0;
        c.sensor.baro_altitude_available.update(at(1.0));

        run_basic(&mut c, &mut CalcState::new(), &ComputeSettings::default());
        assert_eq!(c.basic.nav_altitude, 1000.0);
    }

    #[test]
    fn nav_altitude_invalid_without_any_source() {
        let mut c = snapshot_with_fix(10.0, 1.0);
        run_basic(&mut c, &mut CalcState::new(), &ComputeSettings::default());
        assert!(!c.basic.nav_altitude_available.valid());
    }

    #[test]
    fn gps_vario_from_consecutive_fixes() {
        let mut state = CalcState::new();
        let settings = ComputeSettings::default();

        let mut c1 = snapshot_with_fix(100.0, 1.0);
        c1.sensor.gps_altitude = 1000.0;
        c1.sensor.gps_altitude_available.update(at(1.0));
        run_basic(&mut c1, &mut state, &settings);
        assert!(!c1.basic.gps_vario_available.valid(), "needs two fixes");

        let mut c2 = snapshot_with_fix(102.0, 3.0);
        c2.sensor.gps_altitude = 1003.0;
        c2.sensor.gps_altitude_available.update(at(3.0));
        run_basic(&mut c2, &mut state, &settings);
        assert!(c2.basic.gps_vario_available.valid());
        assert!((c2.basic.gps_vario - 1.5).abs() < 1e-9, "3m over 2s");
    }

    #[test]
    fn backward_fix_time_resets_deltas() {
        let mut state = CalcState::new();
        let settings = ComputeSettings::default();

        let mut c1 = snapshot_with_fix(100.0, 1.0);
        c1.sensor.gps_altitude = 1000.0;
        c1.sensor.gps_altitude_available.update(at(1.0));
        run_basic(&mut c1, &mut state, &settings);

        let mut c2 = snapshot_with_fix(102.0, 2.0);
        c2.sensor.gps_altitude = 1002.0;
        c2.sensor.gps_altitude_available.update(at(2.0));
        run_basic(&mut c2, &mut state, &settings);
        assert!(c2.basic.gps_vario_available.valid());

        // Flight restart: fix time jumps back.
        let mut c3 = snapshot_with_fix(5.0, 3.0);
        c3.sensor.gps_altitude = 400.0;
        c3.sensor.gps_altitude_available.update(at(3.0));
        run_basic(&mut c3, &mut state, &settings);
        assert!(!c3.basic.gps_vario_available.valid());

        // One advancing fix later the vario is back.
        let mut c4 = snapshot_with_fix(6.0, 4.0);
        c4.sensor.gps_altitude = 401.0;
        c4.sensor.gps_altitude_available.update(at(4.0));
        run_basic(&mut c4, &mut state, &settings);
        assert!(c4.basic.gps_vario_available.valid());
        assert!((c4.basic.gps_vario - 1.0).abs() < 1e-9);
    }

    #[test]
    fn turn_rate_uses_smallest_angle() {
        let mut state = CalcState::new();
        let settings = ComputeSettings::default();

        let mut c1 = snapshot_with_fix(100.0, 1.0);
        c1.sensor.track = Angle::degrees(350.0);
        c1.sensor.track_available.update(at(1.0));
        run_basic(&mut c1, &mut state, &settings);

        // 350° -> 10° is +20° through north, not -340°.
        let mut c2 = snapshot_with_fix(102.0, 2.0);
        c2.sensor.track = Angle::degrees(10.0);
        c2.sensor.track_available.update(at(2.0));
        run_basic(&mut c2, &mut state, &settings);
        assert!(c2.basic.turn_rate_available.valid());
        assert!((c2.basic.turn_rate - 10.0).abs() < 1e-9, "+20° over 2s");
    }

    #[test]
    fn energy_height_from_true_airspeed() {
        let mut c = snapshot_with_fix(10.0, 1.0);
        c.sensor.airspeed.true_airspeed = 30.0;
        c.sensor.airspeed_available.update(at(1.0));
        run_basic(&mut c, &mut CalcState::new(), &ComputeSettings::default());
        assert!((c.basic.energy_height - 30.0 * 30.0 / (2.0 * GRAVITY)).abs() < 1e-9);

        let mut without = snapshot_with_fix(10.0, 1.0);
        run_basic(&mut without, &mut CalcState::new(), &ComputeSettings::default());
        assert_eq!(without.basic.energy_height, 0.0);
    }

    #[test]
    fn netto_prefers_device_reading() {
        let mut c = snapshot_with_fix(10.0, 1.0);
        c.sensor.netto_vario = 2.0;
        c.sensor.netto_vario_available.update(at(1.0));
        c.sensor.total_energy_vario = 1.0;
        c.sensor.total_energy_vario_available.update(at(1.0));
        run_basic(&mut c, &mut CalcState::new(), &ComputeSettings::default());
        assert_eq!(c.basic.netto_vario_estimate, 2.0);
    }

    #[test]
    fn netto_estimated_from_te_vario_and_sink_rate() {
        let mut c = snapshot_with_fix(10.0, 1.0);
        c.sensor.total_energy_vario = -0.6;
        c.sensor.total_energy_vario_available.update(at(1.0));
        run_basic(&mut c, &mut CalcState::new(), &ComputeSettings::default());
        assert!(c.basic.netto_vario_estimate_available.valid());
        assert!(
            c.basic.netto_vario_estimate.abs() < 1e-9,
            "still-air sink estimates zero airmass motion"
        );
    }

    #[test]
    fn heading_follows_track_without_wind() {
        let mut c = snapshot_with_fix(10.0, 1.0);
        c.sensor.track = Angle::degrees(90.0);
        c.sensor.track_available.update(at(1.0));
        run_basic(&mut c, &mut CalcState::new(), &ComputeSettings::default());
        assert!(c.basic.heading_available.valid());
        assert_eq!(c.basic.heading.as_degrees(), 90.0);
    }

    #[test]
    fn heading_crabs_into_configured_wind() {
        let mut c = snapshot_with_fix(10.0, 1.0);
        c.sensor.track = Angle::degrees(0.0);
        c.sensor.track_available.update(at(1.0));
        c.sensor.ground_speed = 30.0;
        c.sensor.ground_speed_available.update(at(1.0));

        let mut settings = ComputeSettings::default();
        settings.wind = Some(SpeedVector {
            bearing: Angle::degrees(90.0),
            speed: 10.0,
        });
        run_basic(&mut c, &mut CalcState::new(), &settings);
        assert!(c.basic.heading_available.valid());
        let heading = c.basic.heading.as_bearing();
        assert!(
            heading > 0.0 && heading < 45.0,
            "nose points east of track into an easterly wind, got {heading}"
        );
    }

    #[test]
    fn invalid_fields_never_poison_others() {
        // A snapshot with only a fix and track still yields heading and
        // clears what it cannot compute.
        let mut c = snapshot_with_fix(10.0, 1.0);
        c.sensor.track = Angle::degrees(45.0);
        c.sensor.track_available.update(at(1.0));
        let mut state = CalcState::new();
        run_basic(&mut c, &mut state, &ComputeSettings::default());
        assert!(c.basic.heading_available.valid());
        assert!(!c.basic.nav_altitude_available.valid());
        assert!(!c.basic.gps_vario_available.valid());
        assert!(!c.basic.netto_vario_estimate_available.valid());
        assert_eq!(c.basic.energy_height, 0.0);
    }
}
