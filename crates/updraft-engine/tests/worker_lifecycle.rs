//! Integration test: worker lifecycle through the session.
//!
//! Suspension, trigger coalescing, cancellation of a blocked pass,
//! and flight restart, all through [`FlightSession`]'s public surface.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use updraft_core::{DeviceId, WallTime};
use updraft_engine::{CruiseComputer, EngineConfig, FlightSession, WorkerState};
use updraft_test_utils::fixtures::{BlockingComputer, CountingComputer};
use updraft_test_utils::{wait_for, SnapshotBuilder};

#[test]
fn suspend_freezes_the_fused_state() {
    let mut session = FlightSession::new(EngineConfig::default(), Box::new(CruiseComputer::new()))
        .expect("config");

    let wall = WallTime::now();
    session.blackboard().write_device_slot(
        DeviceId(0),
        SnapshotBuilder::at(wall).fix(47.0, 9.0, 100.0).build(),
    );
    assert!(
        wait_for(Duration::from_secs(2), || {
            session.blackboard().read_current().sensor.location_available.valid()
        }),
        "first fix never merged"
    );

    session.suspend_all();
    assert!(
        wait_for(Duration::from_secs(2), || {
            session.merge_state() == WorkerState::Suspended
                && session.compute_state() == WorkerState::Suspended
        }),
        "workers did not park"
    );

    // A write while suspended stays pending; the fused state is frozen.
    session.blackboard().write_device_slot(
        DeviceId(0),
        SnapshotBuilder::at(WallTime::from_seconds(wall.seconds() + 1.0))
            .fix(47.1, 9.0, 101.0)
            .build(),
    );
    thread::sleep(Duration::from_millis(300));
    let frozen = session.blackboard().read_current();
    assert!((frozen.sensor.location.latitude - 47.0).abs() < 1e-12);

    session.resume_all();
    assert!(
        wait_for(Duration::from_secs(2), || {
            (session.blackboard().read_current().sensor.location.latitude - 47.1).abs() < 1e-12
        }),
        "pending write was not merged after resume"
    );

    session.shutdown();
}

#[test]
fn trigger_burst_coalesces_into_bounded_passes() {
    let computer = CountingComputer::new();
    let calls = computer.calls();
    let mut session =
        FlightSession::new(EngineConfig::default(), Box::new(computer)).expect("config");

    session.blackboard().write_device_slot(
        DeviceId(0),
        SnapshotBuilder::at(WallTime::now()).fix(47.0, 9.0, 100.0).build(),
    );
    assert!(
        wait_for(Duration::from_secs(2), || calls.load(Ordering::Relaxed) == 1),
        "first pass never ran"
    );

    let fabric = session.fabric();
    for _ in 0..5 {
        fabric.force_compute();
    }
    assert!(
        wait_for(Duration::from_secs(2), || calls.load(Ordering::Relaxed) >= 2),
        "burst produced no pass at all"
    );
    // Rate limit window plus margin, so any second pass has landed.
    thread::sleep(Duration::from_millis(600));
    let extra = calls.load(Ordering::Relaxed) - 1;
    assert!(
        (1..=2).contains(&extra),
        "five forces must coalesce into one or two passes, got {extra}"
    );

    session.shutdown();
}

#[test]
fn blocked_pass_is_cancelled_on_shutdown() {
    let computer = BlockingComputer::new(Duration::from_secs(10));
    let entered = computer.entered();
    let mut session =
        FlightSession::new(EngineConfig::default(), Box::new(computer)).expect("config");

    session.blackboard().write_device_slot(
        DeviceId(0),
        SnapshotBuilder::at(WallTime::now()).fix(47.0, 9.0, 100.0).build(),
    );
    assert!(
        wait_for(Duration::from_secs(2), || entered.load(Ordering::Relaxed) >= 1),
        "pass never started"
    );

    // The pass would park for 10 s on its own; shutdown must cut it.
    let start = Instant::now();
    let report = session.shutdown();
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "shutdown waited out a blocked pass"
    );
    assert!(report.merge_joined && report.compute_joined);
}

#[test]
fn restart_flight_drops_derived_history() {
    let mut session = FlightSession::new(EngineConfig::default(), Box::new(CruiseComputer::new()))
        .expect("config");
    let wall = WallTime::now();

    // Two fixes 30 m apart integrate into the first leg. Waiting for
    // the first pass keeps the writes from coalescing into one merge.
    session.blackboard().write_device_slot(
        DeviceId(0),
        SnapshotBuilder::at(wall).fix(47.0, 9.0, 100.0).build(),
    );
    assert!(
        wait_for(Duration::from_secs(2), || {
            session.blackboard().read_derived().last_calculated.is_some()
        }),
        "first fix never computed"
    );
    session.blackboard().write_device_slot(
        DeviceId(0),
        SnapshotBuilder::at(WallTime::from_seconds(wall.seconds() + 1.0))
            .fix(47.00027, 9.0, 101.0)
            .build(),
    );
    assert!(
        wait_for(Duration::from_secs(2), || {
            session.blackboard().read_derived().distance_flown_m > 25.0
        }),
        "first leg never integrated"
    );

    // Restart: every source clock begins a fresh epoch. A regressed
    // fix on its own wakes no compute pass; the reset lands with the
    // next advancing fix. Gate each write on the state it produces so
    // no two writes share a pass.
    session.blackboard().restart_flight();
    session.blackboard().write_device_slot(
        DeviceId(0),
        SnapshotBuilder::at(WallTime::from_seconds(wall.seconds() + 2.0))
            .fix(47.1, 9.0, 50.0)
            .build(),
    );
    assert!(
        wait_for(Duration::from_secs(2), || {
            session.blackboard().read_current().sensor.time_of_fix.seconds() < 100.0
        }),
        "regressed fix never merged"
    );

    session.blackboard().write_device_slot(
        DeviceId(0),
        SnapshotBuilder::at(WallTime::from_seconds(wall.seconds() + 3.0))
            .fix(47.100135, 9.0, 51.0)
            .build(),
    );
    assert!(
        wait_for(Duration::from_secs(2), || {
            session
                .blackboard()
                .read_derived()
                .last_calculated
                .is_some_and(|t| t.seconds() < 100.0)
        }),
        "history was not rebuilt from the new epoch"
    );
    assert!(
        session.blackboard().read_derived().distance_flown_m.abs() < 1e-9,
        "the jump to the new start position must not be integrated"
    );

    session.blackboard().write_device_slot(
        DeviceId(0),
        SnapshotBuilder::at(WallTime::from_seconds(wall.seconds() + 4.0))
            .fix(47.10027, 9.0, 52.0)
            .build(),
    );
    assert!(
        wait_for(Duration::from_secs(2), || {
            session.blackboard().read_derived().distance_flown_m > 5.0
        }),
        "first new-epoch leg never integrated"
    );
    let derived = session.blackboard().read_derived();
    assert!(
        derived.distance_flown_m < 25.0,
        "old legs leaked into the new epoch, got {} m",
        derived.distance_flown_m
    );
    assert!(
        (derived.flight_time - 1.0).abs() < 1e-9,
        "flight time must restart, got {}",
        derived.flight_time
    );

    session.shutdown();
}
