//! Shared computation settings.

use crate::geo::SpeedVector;

/// Pilot-adjustable parameters of the computation pass.
///
/// A session holds one copy behind its own mutex, separate from the
/// blackboard. The compute worker clones it at the top of every pass
/// and never writes it; changes arrive from the UI through update
/// closures on the compute handle or from device reports through the
/// settings bridge.
#[derive(Clone, Debug, PartialEq)]
pub struct ComputeSettings {
    /// MacCready setting in m/s.
    ///
    /// Default: `0.0`.
    pub mac_cready: f64,

    /// Water ballast as a fraction of capacity, 0 to 1.
    ///
    /// Default: `0.0`.
    pub ballast_fraction: f64,

    /// Bugs factor: remaining polar performance, 0 to 1.
    ///
    /// Default: `1.0` (clean wing).
    pub bugs: f64,

    /// QNH sea-level pressure in hectopascals.
    ///
    /// Default: `1013.25` (standard atmosphere).
    pub qnh_hpa: f64,

    /// Prefer barometric altitude for navigation when a source supplies
    /// a valid one. Ignored during replay, which always uses the
    /// recorded GPS altitude.
    ///
    /// Default: `true`.
    pub enable_nav_baro_altitude: bool,

    /// Still-air sink rate estimate in m/s, added to the total-energy
    /// vario to approximate airmass motion when no device reports a
    /// netto reading. Positive values mean sinking.
    ///
    /// Default: `0.6`.
    pub sink_rate_estimate: f64,

    /// Wind to use for the heading estimate, given as the direction the
    /// wind blows from. `None` disables the wind triangle and reports
    /// heading equal to track.
    ///
    /// Default: `None`.
    pub wind: Option<SpeedVector>,

    /// Averaging window for the climb average, in seconds of fix time.
    ///
    /// Default: `30.0`.
    pub average_climb_window: f64,
}

impl Default for ComputeSettings {
    fn default() -> Self {
        Self {
            mac_cready: 0.0,
            ballast_fraction: 0.0,
            bugs: 1.0,
            qnh_hpa: 1013.25,
            enable_nav_baro_altitude: true,
            sink_rate_estimate: 0.6,
            wind: None,
            average_climb_window: 30.0,
        }
    }
}
