//! Test utilities and scripted doubles for Updraft development.
//!
//! Provides a [`SnapshotBuilder`] for assembling valid
//! [`SensorSnapshot`] values without ceremony, scripted computer and
//! sink doubles in [`fixtures`], and a polling [`wait_for`] helper for
//! asserting on background-thread effects.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::thread;
use std::time::{Duration, Instant};

use updraft_core::{Airspeed, Angle, GeoPoint, SensorSnapshot, WallTime};

/// Poll `cond` every few milliseconds until it holds or `timeout`
/// elapses. Returns whether the condition was met.
///
/// Background workers run on their own schedule, so tests assert on
/// their effects with a deadline rather than a fixed sleep.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Builder assembling a [`SensorSnapshot`] with every touched field
/// marked valid at one instant.
///
/// Starts from a connected snapshot received at the given wall time;
/// each setter fills a value and stamps its validity at that time.
#[derive(Clone, Debug)]
pub struct SnapshotBuilder {
    snapshot: SensorSnapshot,
    stamp: WallTime,
}

impl SnapshotBuilder {
    /// Start a connected snapshot received at `stamp`.
    pub fn at(stamp: WallTime) -> Self {
        let mut snapshot = SensorSnapshot::default();
        snapshot.connected.update(stamp);
        snapshot.received = stamp;
        Self { snapshot, stamp }
    }

    /// Position fix and device clock in one call.
    pub fn fix(self, latitude: f64, longitude: f64, clock_seconds: f64) -> Self {
        self.location(latitude, longitude).clock(clock_seconds)
    }

    pub fn location(mut self, latitude: f64, longitude: f64) -> Self {
        self.snapshot.location = GeoPoint::new(latitude, longitude);
        self.snapshot.location_available.update(self.stamp);
        self
    }

    /// Raw device time-of-day in seconds. The blackboard unwraps this
    /// into the fix timestamp at the write boundary.
    pub fn clock(mut self, seconds: f64) -> Self {
        self.snapshot.device_clock = seconds;
        self.snapshot.time_available.update(self.stamp);
        self
    }

    pub fn track_and_speed(mut self, track_degrees: f64, ground_speed: f64) -> Self {
        self.snapshot.track = Angle::degrees(track_degrees);
        self.snapshot.track_available.update(self.stamp);
        self.snapshot.ground_speed = ground_speed;
        self.snapshot.ground_speed_available.update(self.stamp);
        self
    }

    pub fn gps_altitude(mut self, metres: f64) -> Self {
        self.snapshot.gps_altitude = metres;
        self.snapshot.gps_altitude_available.update(self.stamp);
        self
    }

    pub fn baro_altitude(mut self, metres: f64) -> Self {
        self.snapshot.baro_altitude = metres;
        self.snapshot.baro_altitude_available.update(self.stamp);
        self
    }

    pub fn airspeed(mut self, true_airspeed: f64, indicated_airspeed: f64) -> Self {
        self.snapshot.airspeed = Airspeed {
            true_airspeed,
            indicated_airspeed,
        };
        self.snapshot.airspeed_available.update(self.stamp);
        self
    }

    pub fn total_energy_vario(mut self, metres_per_second: f64) -> Self {
        self.snapshot.total_energy_vario = metres_per_second;
        self.snapshot.total_energy_vario_available.update(self.stamp);
        self
    }

    pub fn netto_vario(mut self, metres_per_second: f64) -> Self {
        self.snapshot.netto_vario = metres_per_second;
        self.snapshot.netto_vario_available.update(self.stamp);
        self
    }

    pub fn g_load(mut self, g: f64) -> Self {
        self.snapshot.g_load = g;
        self.snapshot.g_load_available.update(self.stamp);
        self
    }

    pub fn mac_cready(mut self, metres_per_second: f64) -> Self {
        self.snapshot.settings.mac_cready = metres_per_second;
        self.snapshot.settings.mac_cready_available.update(self.stamp);
        self
    }

    pub fn ballast(mut self, fraction: f64) -> Self {
        self.snapshot.settings.ballast_fraction = fraction;
        self.snapshot.settings.ballast_available.update(self.stamp);
        self
    }

    pub fn bugs(mut self, factor: f64) -> Self {
        self.snapshot.settings.bugs = factor;
        self.snapshot.settings.bugs_available.update(self.stamp);
        self
    }

    pub fn qnh(mut self, hectopascals: f64) -> Self {
        self.snapshot.settings.qnh_hpa = hectopascals;
        self.snapshot.settings.qnh_available.update(self.stamp);
        self
    }

    pub fn build(self) -> SensorSnapshot {
        self.snapshot
    }
}
