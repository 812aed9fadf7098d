//! Updraft quickstart — a complete, minimal engine run from scratch.
//!
//! Demonstrates:
//!   1. Building an EngineConfig
//!   2. Starting a FlightSession with the bundled CruiseComputer
//!   3. Feeding device snapshots the way a driver would
//!   4. Waiting on the consumer signals
//!   5. Reading fused state and derived results
//!   6. Shutting the session down
//!
//! Run with:
//!   cargo run --example quickstart

use std::thread;
use std::time::Duration;

use updraft_core::{Angle, DeviceId, GeoPoint, SensorSnapshot, WallTime};
use updraft_engine::{CruiseComputer, EngineConfig, FlightSession};

// ─── Driver-style snapshot assembly ─────────────────────────────

/// Build the snapshot a GPS driver would hand over for one fix: every
/// measured field paired with a validity stamped at receive time.
fn fix_snapshot(
    now: WallTime,
    clock: f64,
    location: GeoPoint,
    altitude: f64,
    vario: f64,
) -> SensorSnapshot {
    let mut snapshot = SensorSnapshot::default();
    snapshot.connected.update(now);
    snapshot.received = now;
    snapshot.device_clock = clock;
    snapshot.time_available.update(now);
    snapshot.location = location;
    snapshot.location_available.update(now);
    snapshot.gps_altitude = altitude;
    snapshot.gps_altitude_available.update(now);
    snapshot.total_energy_vario = vario;
    snapshot.total_energy_vario_available.update(now);
    snapshot.track = Angle::degrees(90.0);
    snapshot.track_available.update(now);
    snapshot.ground_speed = 30.0;
    snapshot.ground_speed_available.update(now);
    snapshot
}

// ─── Main ───────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Updraft Quickstart ===\n");

    // 1. Configure: one device slot, everything else at defaults.
    let config = EngineConfig::default();
    println!(
        "Config: {} device slot(s), merge no closer than {:?} apart",
        config.device_count, config.merge.period_min
    );

    // 2. Start the session. Both worker threads spawn here.
    let mut session = FlightSession::new(config, Box::new(CruiseComputer::new()))?;
    let derived_ready = session.signals().derived_ready().subscribe();
    println!("Session started: {session:?}\n");

    // 3. Feed a straight eastbound glide: one fix per flight second,
    //    compressed to 80 ms of wall time each.
    println!("Feeding 20 fixes...");
    let device = DeviceId(0);
    let track = Angle::degrees(90.0);
    let mut position = GeoPoint::new(47.0, 9.0);
    for i in 0..20u32 {
        let clock = 36_000.0 + f64::from(i);
        let altitude = 1500.0 - f64::from(i) * 0.8;
        let vario = if i % 5 == 0 { 1.4 } else { -0.9 };
        session.blackboard().write_device_slot(
            device,
            fix_snapshot(WallTime::now(), clock, position, altitude, vario),
        );
        position = position.offset(track, 30.0);
        thread::sleep(Duration::from_millis(80));
    }

    // 4. Wait for the compute worker to publish a fresh result.
    if derived_ready.wait_timeout(Duration::from_secs(2)) {
        println!("derived-ready signal received\n");
    }

    // 5. Read the fused state and the derived numbers.
    let current = session.blackboard().read_current();
    let derived = session.blackboard().read_derived();
    println!("Fused source:   {}", current.source);
    println!(
        "Position:       {:.5}, {:.5}",
        current.sensor.location.latitude, current.sensor.location.longitude
    );
    println!("Nav altitude:   {:.1} m", current.basic.nav_altitude);
    println!("Flight time:    {:.0} s", derived.flight_time);
    println!("Distance flown: {:.0} m", derived.distance_flown_m);
    if derived.average_climb_available.valid() {
        println!("Average climb:  {:+.2} m/s", derived.average_climb);
    }

    // 6. Shut down and report.
    let report = session.shutdown();
    println!(
        "\nShutdown in {} ms (merge join {} ms, compute join {} ms)",
        report.total_ms, report.merge_join_ms, report.compute_join_ms
    );
    println!("Done.");
    Ok(())
}
