//! Benchmark fixtures for the Updraft fusion engine.
//!
//! Provides pre-populated snapshots and blackboards so the benches measure
//! the merge fold and the signal paths, not the setup:
//!
//! - [`full_snapshot`]: a snapshot with every measured field valid
//! - [`sparse_snapshot`]: a snapshot carrying only a baro altitude
//! - [`filled_board`]: a blackboard with every device slot populated

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use updraft_core::{Airspeed, Angle, DeviceId, GeoPoint, SensorSnapshot, WallTime};
use updraft_engine::{Blackboard, EngineConfig};

/// Build a snapshot with every measured field present and valid.
///
/// This is the worst case for the complement fold: nothing in a lower
/// priority slot can fill a gap, so every field comparison runs.
pub fn full_snapshot(wall_seconds: f64, device_clock: f64) -> SensorSnapshot {
    let now = WallTime::from_seconds(wall_seconds);
    let mut snapshot = SensorSnapshot::default();
    snapshot.connected.update(now);
    snapshot.received = now;
    snapshot.device_clock = device_clock;
    snapshot.time_available.update(now);
    snapshot.location = GeoPoint::new(47.0, 9.0);
    snapshot.location_available.update(now);
    snapshot.track = Angle::degrees(135.0);
    snapshot.track_available.update(now);
    snapshot.ground_speed = 31.5;
    snapshot.ground_speed_available.update(now);
    snapshot.gps_altitude = 1480.0;
    snapshot.gps_altitude_available.update(now);
    snapshot.baro_altitude = 1462.0;
    snapshot.baro_altitude_available.update(now);
    snapshot.airspeed = Airspeed {
        true_airspeed: 33.0,
        indicated_airspeed: 30.0,
    };
    snapshot.airspeed_available.update(now);
    snapshot.total_energy_vario = 0.8;
    snapshot.total_energy_vario_available.update(now);
    snapshot.netto_vario = 1.4;
    snapshot.netto_vario_available.update(now);
    snapshot.g_load = 1.05;
    snapshot.g_load_available.update(now);
    snapshot.settings.mac_cready = 1.2;
    snapshot.settings.mac_cready_available.update(now);
    snapshot.settings.ballast_fraction = 0.5;
    snapshot.settings.ballast_available.update(now);
    snapshot.settings.bugs = 0.95;
    snapshot.settings.bugs_available.update(now);
    snapshot.settings.qnh_hpa = 1018.0;
    snapshot.settings.qnh_available.update(now);
    snapshot
}

/// Build a snapshot carrying only a baro altitude.
///
/// The opposite extreme: almost every field is a gap, so the fold spends
/// its time filling from lower priority slots.
pub fn sparse_snapshot(wall_seconds: f64, baro_altitude: f64) -> SensorSnapshot {
    let now = WallTime::from_seconds(wall_seconds);
    let mut snapshot = SensorSnapshot::default();
    snapshot.connected.update(now);
    snapshot.received = now;
    snapshot.baro_altitude = baro_altitude;
    snapshot.baro_altitude_available.update(now);
    snapshot
}

/// Build a blackboard with `device_count` slots, each already holding a
/// full snapshot, so a merge folds real data across every slot.
pub fn filled_board(device_count: usize) -> Blackboard {
    let config = EngineConfig {
        device_count,
        ..EngineConfig::default()
    };
    let blackboard = Blackboard::new(&config);
    for device in 0..device_count {
        blackboard.write_device_slot(
            DeviceId(device),
            full_snapshot(10.0, 36_000.0 + device as f64),
        );
    }
    blackboard
}

#[cfg(test)]
mod tests {
    use super::*;
    use updraft_core::Source;

    #[test]
    fn full_snapshot_is_fully_valid() {
        let snapshot = full_snapshot(10.0, 36_000.0);
        assert!(snapshot.connected.valid());
        assert!(snapshot.time_available.valid());
        assert!(snapshot.location_available.valid());
        assert!(snapshot.settings.qnh_available.valid());
    }

    #[test]
    fn filled_board_merges_to_a_real_fix() {
        let blackboard = filled_board(4);
        let summary = blackboard.merge();
        assert!(summary.fix_appeared);

        let current = blackboard.read_current();
        assert_eq!(current.source, Source::Real);
        assert!(current.sensor.location_available.valid());
    }
}
