//! Replay feed — playing a recorded flight back through the engine.
//!
//! Demonstrates:
//!   1. The replay source shadowing every live device
//!   2. Clock unwrapping across a midnight rollover in the log
//!   3. Handing control back to the live sources afterwards
//!
//! Run with:
//!   cargo run --example replay_feed

use std::thread;
use std::time::Duration;

use updraft_core::{Angle, DeviceId, GeoPoint, SensorSnapshot, WallTime};
use updraft_engine::{CruiseComputer, EngineConfig, FlightSession};

// ─── Log record assembly ────────────────────────────────────────

/// One replayed log record, shaped like a live device update.
fn log_record(clock: f64, location: GeoPoint, altitude: f64) -> SensorSnapshot {
    let mut snapshot = position_report(location, altitude);
    snapshot.device_clock = clock;
    snapshot.time_available.update(snapshot.received);
    snapshot
}

/// A position without a device clock: merges and draws, but carries no
/// fix time for the compute pass to integrate.
fn position_report(location: GeoPoint, altitude: f64) -> SensorSnapshot {
    let now = WallTime::now();
    let mut snapshot = SensorSnapshot::default();
    snapshot.connected.update(now);
    snapshot.received = now;
    snapshot.location = location;
    snapshot.location_available.update(now);
    snapshot.gps_altitude = altitude;
    snapshot.gps_altitude_available.update(now);
    snapshot
}

// ─── Main ───────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Updraft Replay Feed ===\n");

    let mut session = FlightSession::new(
        EngineConfig::default(),
        Box::new(CruiseComputer::new()),
    )?;

    // 1. One live position first, so there is something to shadow.
    session.blackboard().write_device_slot(
        DeviceId(0),
        position_report(GeoPoint::new(47.0, 9.0), 1200.0),
    );
    thread::sleep(Duration::from_millis(200));
    println!(
        "Live source merged: {}",
        session.blackboard().read_current().source
    );

    // 2. Play back a circling log that crosses midnight: the raw
    //    device clock wraps from 86399 back to 0, the engine's fix
    //    time keeps climbing.
    println!("\nReplaying 12 records across the midnight rollover...");
    let centre = GeoPoint::new(52.0, 13.0);
    for i in 0..12u32 {
        let raw_clock = (86_394.0 + f64::from(i)) % 86_400.0;
        let position = centre.offset(Angle::degrees(f64::from(i) * 30.0), 200.0);
        session
            .blackboard()
            .set_replay_state(log_record(raw_clock, position, 900.0));
        thread::sleep(Duration::from_millis(120));

        if i % 4 == 3 {
            let current = session.blackboard().read_current();
            println!(
                "  raw clock {:>7.1}  ->  source {}, fix time {:.1} s",
                raw_clock,
                current.source,
                current.sensor.time_of_fix.seconds()
            );
        }
    }

    // 3. Live writes during playback land in their slot but are
    //    shadowed until the replay stops.
    session.blackboard().write_device_slot(
        DeviceId(0),
        log_record(36_010.0, GeoPoint::new(47.001, 9.0), 1195.0),
    );
    thread::sleep(Duration::from_millis(200));
    println!(
        "\nDuring playback the fused source stays: {}",
        session.blackboard().read_current().source
    );

    let derived = session.blackboard().read_derived();
    println!(
        "Replayed flight time {:.0} s, distance {:.0} m",
        derived.flight_time, derived.distance_flown_m
    );

    // 4. Stop the replay; the next merge is live again, and the live
    //    fix time sitting far behind the replayed one makes the
    //    compute worker drop the replayed history on its own.
    session.blackboard().stop_replay();
    thread::sleep(Duration::from_millis(200));
    let current = session.blackboard().read_current();
    println!(
        "\nReplay stopped: source {} at {:.3}, {:.3}",
        current.source, current.sensor.location.latitude, current.sensor.location.longitude
    );

    session.shutdown();
    println!("Done.");
    Ok(())
}
