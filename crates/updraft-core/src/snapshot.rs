//! Sensor snapshots and the derived-state structures built from them.

use std::fmt;

use crate::geo::{Angle, GeoPoint};
use crate::time::{TimeStamp, WallTime};
use crate::validity::Validity;

/// True/indicated airspeed pair in m/s.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Airspeed {
    /// True airspeed.
    pub true_airspeed: f64,
    /// Indicated airspeed.
    pub indicated_airspeed: f64,
}

/// Setting overrides reported by a device, each with its own validity.
///
/// Instruments with their own input knobs (MacCready dials, ballast
/// switches) report the pilot's entries here; the engine forwards
/// changes into the shared computation settings and echoes them to the
/// other devices.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeviceSettingsReport {
    /// MacCready setting in m/s.
    pub mac_cready: f64,
    /// Validity of `mac_cready`.
    pub mac_cready_available: Validity,
    /// Water ballast as a fraction of capacity, 0 to 1.
    pub ballast_fraction: f64,
    /// Validity of `ballast_fraction`.
    pub ballast_available: Validity,
    /// Bugs factor: remaining polar performance, 0 to 1 (1 = clean wing).
    pub bugs: f64,
    /// Validity of `bugs`.
    pub bugs_available: Validity,
    /// QNH sea-level pressure in hectopascals.
    pub qnh_hpa: f64,
    /// Validity of `qnh_hpa`.
    pub qnh_available: Validity,
}

impl DeviceSettingsReport {
    fn complement(&mut self, other: &DeviceSettingsReport) {
        if !self.mac_cready_available.valid() && other.mac_cready_available.valid() {
            self.mac_cready = other.mac_cready;
            self.mac_cready_available = other.mac_cready_available;
        }
        if !self.ballast_available.valid() && other.ballast_available.valid() {
            self.ballast_fraction = other.ballast_fraction;
            self.ballast_available = other.ballast_available;
        }
        if !self.bugs_available.valid() && other.bugs_available.valid() {
            self.bugs = other.bugs;
            self.bugs_available = other.bugs_available;
        }
        if !self.qnh_available.valid() && other.qnh_available.valid() {
            self.qnh_hpa = other.qnh_hpa;
            self.qnh_available = other.qnh_available;
        }
    }
}

/// Which source snapshot won the last merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Source {
    /// Folded live device slots.
    #[default]
    Real,
    /// The simulator source.
    Simulator,
    /// The replay source.
    Replay,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Simulator => write!(f, "simulator"),
            Self::Replay => write!(f, "replay"),
        }
    }
}

/// One source's measured state at an instant.
///
/// Every measured field is paired with a [`Validity`]; a field's value
/// is unspecified unless its flag is valid. Snapshots are plain values:
/// drivers build one per update and hand it to the blackboard, which
/// copies it in and out under its lock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorSnapshot {
    /// Whether the producing device is alive. Updated by the driver on
    /// every accepted sentence, expired against the wall clock.
    pub connected: Validity,
    /// Wall time this snapshot was received, stamped by the driver.
    pub received: WallTime,
    /// Raw device time-of-day reading in seconds, as reported.
    pub device_clock: f64,
    /// Unwrapped fix timestamp. Filled by the blackboard from
    /// `device_clock` at the write boundary; monotonic per source.
    pub time_of_fix: TimeStamp,
    /// Validity of `device_clock`/`time_of_fix`.
    pub time_available: Validity,
    /// Position of the last fix.
    pub location: GeoPoint,
    /// Validity of `location`: the fix flag.
    pub location_available: Validity,
    /// Ground track bearing.
    pub track: Angle,
    /// Validity of `track`.
    pub track_available: Validity,
    /// Speed over ground in m/s.
    pub ground_speed: f64,
    /// Validity of `ground_speed`.
    pub ground_speed_available: Validity,
    /// GPS altitude in metres.
    pub gps_altitude: f64,
    /// Validity of `gps_altitude`.
    pub gps_altitude_available: Validity,
    /// Barometric altitude in metres.
    pub baro_altitude: f64,
    /// Validity of `baro_altitude`.
    pub baro_altitude_available: Validity,
    /// Airspeed pair.
    pub airspeed: Airspeed,
    /// Validity of `airspeed`.
    pub airspeed_available: Validity,
    /// Total-energy-compensated vario in m/s.
    pub total_energy_vario: f64,
    /// Validity of `total_energy_vario`.
    pub total_energy_vario_available: Validity,
    /// Airmass (netto) vario in m/s.
    pub netto_vario: f64,
    /// Validity of `netto_vario`.
    pub netto_vario_available: Validity,
    /// Load factor in g.
    pub g_load: f64,
    /// Validity of `g_load`.
    pub g_load_available: Validity,
    /// Device-reported setting overrides.
    pub settings: DeviceSettingsReport,
}

impl SensorSnapshot {
    /// Fill every field this snapshot lacks from `other`.
    ///
    /// Fields already valid here are left alone, so folding slots in
    /// index order makes slot order the priority order. A disconnected
    /// `other` contributes nothing.
    pub fn complement(&mut self, other: &SensorSnapshot) {
        if !other.connected.valid() {
            return;
        }
        if !self.connected.valid() {
            self.connected = other.connected;
            self.received = other.received;
        }
        if !self.time_available.valid() && other.time_available.valid() {
            self.device_clock = other.device_clock;
            self.time_of_fix = other.time_of_fix;
            self.time_available = other.time_available;
        }
        if !self.location_available.valid() && other.location_available.valid() {
            self.location = other.location;
            self.location_available = other.location_available;
        }
        if !self.track_available.valid() && other.track_available.valid() {
            self.track = other.track;
            self.track_available = other.track_available;
        }
        if !self.ground_speed_available.valid() && other.ground_speed_available.valid() {
            self.ground_speed = other.ground_speed;
            self.ground_speed_available = other.ground_speed_available;
        }
        if !self.gps_altitude_available.valid() && other.gps_altitude_available.valid() {
            self.gps_altitude = other.gps_altitude;
            self.gps_altitude_available = other.gps_altitude_available;
        }
        if !self.baro_altitude_available.valid() && other.baro_altitude_available.valid() {
            self.baro_altitude = other.baro_altitude;
            self.baro_altitude_available = other.baro_altitude_available;
        }
        if !self.airspeed_available.valid() && other.airspeed_available.valid() {
            self.airspeed = other.airspeed;
            self.airspeed_available = other.airspeed_available;
        }
        if !self.total_energy_vario_available.valid() && other.total_energy_vario_available.valid()
        {
            self.total_energy_vario = other.total_energy_vario;
            self.total_energy_vario_available = other.total_energy_vario_available;
        }
        if !self.netto_vario_available.valid() && other.netto_vario_available.valid() {
            self.netto_vario = other.netto_vario;
            self.netto_vario_available = other.netto_vario_available;
        }
        if !self.g_load_available.valid() && other.g_load_available.valid() {
            self.g_load = other.g_load;
            self.g_load_available = other.g_load_available;
        }
        self.settings.complement(&other.settings);
    }

    /// Expire this snapshot against the wall clock.
    ///
    /// When the connection has been silent for more than `max_age`
    /// seconds, every measurement is invalidated and the call returns
    /// true for exactly that transition (edge-triggered, like
    /// [`Validity::expire`]).
    pub fn expire_wall_clock(&mut self, now: WallTime, max_age: f64) -> bool {
        if self.connected.expire(now, max_age) {
            self.clear_measurements();
            true
        } else {
            false
        }
    }

    /// Invalidate every measured field, keeping the struct's values for
    /// debugging but making them unreadable through the flags.
    pub fn clear_measurements(&mut self) {
        self.time_available.clear();
        self.location_available.clear();
        self.track_available.clear();
        self.ground_speed_available.clear();
        self.gps_altitude_available.clear();
        self.baro_altitude_available.clear();
        self.airspeed_available.clear();
        self.total_energy_vario_available.clear();
        self.netto_vario_available.clear();
        self.g_load_available.clear();
        self.settings.mac_cready_available.clear();
        self.settings.ballast_available.clear();
        self.settings.bugs_available.clear();
        self.settings.qnh_available.clear();
    }
}

/// Cheap derived values recomputed on every merge tick.
///
/// Owned by the merge worker; the compute worker and consumers read it
/// as part of [`CurrentSnapshot`] but never write it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BasicDerived {
    /// Altitude used for navigation: baro when enabled and valid (and
    /// not replaying), GPS otherwise.
    pub nav_altitude: f64,
    /// Validity of `nav_altitude`.
    pub nav_altitude_available: Validity,
    /// Kinetic energy expressed as height, `TAS² / 2g`; zero when
    /// airspeed is unknown.
    pub energy_height: f64,
    /// Vertical speed from nav-altitude deltas between fixes, m/s.
    pub gps_vario: f64,
    /// Validity of `gps_vario`.
    pub gps_vario_available: Validity,
    /// Airmass vertical motion estimate in m/s: device netto when
    /// supplied, otherwise total-energy vario plus the configured sink
    /// rate.
    pub netto_vario_estimate: f64,
    /// Validity of `netto_vario_estimate`.
    pub netto_vario_estimate_available: Validity,
    /// Rate of track change in degrees per second, positive clockwise.
    pub turn_rate: f64,
    /// Validity of `turn_rate`.
    pub turn_rate_available: Validity,
    /// Estimated heading from the wind triangle; equals track when no
    /// wind is configured.
    pub heading: Angle,
    /// Validity of `heading`.
    pub heading_available: Validity,
}

/// The externally-visible fused state.
///
/// `sensor` is replaced wholesale by each merge; `basic` is rewritten
/// by the merge worker's calculators immediately after. Consumers read
/// the pair as one value under the blackboard lock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurrentSnapshot {
    /// The winning source snapshot.
    pub sensor: SensorSnapshot,
    /// Which source produced `sensor`.
    pub source: Source,
    /// Cheap derived values for `sensor`.
    pub basic: BasicDerived,
}

/// Output of the expensive computation pass.
///
/// Written back to the blackboard as a whole, never field-by-field, so
/// a failed computation leaves the previous result intact.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DerivedResult {
    /// Fix time of the snapshot this result was computed from.
    pub last_calculated: Option<TimeStamp>,
    /// Seconds since the first valid fix of the flight.
    pub flight_time: f64,
    /// Great-circle distance flown in metres, integrated fix to fix.
    pub distance_flown_m: f64,
    /// Mean total-energy climb over the configured window, m/s.
    pub average_climb: f64,
    /// Validity of `average_climb`.
    pub average_climb_available: Validity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(s: f64) -> WallTime {
        WallTime::from_seconds(s)
    }

    fn connected_with_location(wall: f64, lat: f64, lon: f64) -> SensorSnapshot {
        let mut s = SensorSnapshot::default();
        s.connected.update(at(wall));
        s.received = at(wall);
        s.location = GeoPoint::new(lat, lon);
        s.location_available.update(at(wall));
        s
    }

    #[test]
    fn complement_fills_only_absent_fields() {
        let mut a = connected_with_location(1.0, 47.0, 9.0);
        let mut b = connected_with_location(2.0, -34.0, 151.0);
        b.baro_altitude = 1200.0;
        b.baro_altitude_available.update(at(2.0));

        a.complement(&b);
        // Location was already valid in a: untouched.
        assert_eq!(a.location, GeoPoint::new(47.0, 9.0));
        // Baro was absent in a: filled from b.
        assert!(a.baro_altitude_available.valid());
        assert_eq!(a.baro_altitude, 1200.0);
    }

    #[test]
    fn complement_ignores_disconnected_source() {
        let mut a = SensorSnapshot::default();
        let mut b = connected_with_location(1.0, 47.0, 9.0);
        b.connected.clear();
        a.complement(&b);
        assert!(!a.location_available.valid());
        assert!(!a.connected.valid());
    }

    #[test]
    fn complement_is_idempotent() {
        let mut a = connected_with_location(1.0, 47.0, 9.0);
        let b = {
            let mut s = connected_with_location(2.0, -34.0, 151.0);
            s.settings.qnh_hpa = 1020.0;
            s.settings.qnh_available.update(at(2.0));
            s
        };
        a.complement(&b);
        let once = a.clone();
        a.complement(&b);
        assert_eq!(a, once);
    }

    #[test]
    fn expire_clears_all_measurements_on_edge() {
        let mut s = connected_with_location(0.0, 47.0, 9.0);
        s.settings.mac_cready = 1.5;
        s.settings.mac_cready_available.update(at(0.0));

        assert!(!s.expire_wall_clock(at(5.0), 10.0));
        assert!(s.location_available.valid());

        assert!(s.expire_wall_clock(at(20.0), 10.0), "edge on first crossing");
        assert!(!s.connected.valid());
        assert!(!s.location_available.valid());
        assert!(!s.settings.mac_cready_available.valid());

        assert!(!s.expire_wall_clock(at(30.0), 10.0), "no repeat edge");
    }

    fn arb_snapshot() -> impl Strategy<Value = SensorSnapshot> {
        (
            prop::bool::ANY,
            prop::bool::ANY,
            prop::bool::ANY,
            prop::bool::ANY,
            -80.0f64..80.0,
            -170.0f64..170.0,
            0.0f64..3000.0,
        )
            .prop_map(|(conn, loc, gps_alt, baro, lat, lon, alt)| {
                let mut s = SensorSnapshot::default();
                if conn {
                    s.connected.update(at(1.0));
                    if loc {
                        s.location = GeoPoint::new(lat, lon);
                        s.location_available.update(at(1.0));
                    }
                    if gps_alt {
                        s.gps_altitude = alt;
                        s.gps_altitude_available.update(at(1.0));
                    }
                    if baro {
                        s.baro_altitude = alt + 25.0;
                        s.baro_altitude_available.update(at(1.0));
                    }
                }
                s
            })
    }

    proptest! {
        #[test]
        fn complement_never_overwrites_valid_fields(
            base in arb_snapshot(),
            other in arb_snapshot(),
        ) {
            let mut merged = base.clone();
            merged.complement(&other);
            if base.location_available.valid() {
                prop_assert_eq!(merged.location, base.location);
            }
            if base.gps_altitude_available.valid() {
                prop_assert_eq!(merged.gps_altitude, base.gps_altitude);
            }
        }

        #[test]
        fn complement_absorbs_repeat_application(
            base in arb_snapshot(),
            other in arb_snapshot(),
        ) {
            let mut once = base.clone();
            once.complement(&other);
            let mut twice = once.clone();
            twice.complement(&other);
            prop_assert_eq!(once, twice);
        }
    }
}
