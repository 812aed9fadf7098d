//! Updraft: a sensor fusion and compute scheduling engine for soaring
//! flight instruments.
//!
//! This is the top-level facade crate that re-exports the public API
//! from the Updraft sub-crates. For most users, adding `updraft` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use updraft::prelude::*;
//!
//! // A device driver hands the blackboard one snapshot per update,
//! // each measured field paired with a validity stamp.
//! let now = WallTime::from_seconds(0.0);
//! let mut report = SensorSnapshot::default();
//! report.connected.update(now);
//! report.received = now;
//! report.device_clock = 36_000.0;
//! report.time_available.update(now);
//! report.location = GeoPoint::new(47.0, 9.0);
//! report.location_available.update(now);
//!
//! // Workerless use: write, merge on demand, read the fused state.
//! // (A FlightSession does the same with background workers.)
//! let blackboard = Blackboard::new(&EngineConfig::default());
//! blackboard.write_device_slot(DeviceId(0), report);
//! let summary = blackboard.merge();
//! assert!(summary.fix_appeared);
//!
//! let current = blackboard.read_current();
//! assert_eq!(current.source, Source::Real);
//! assert_eq!(current.sensor.time_of_fix.seconds(), 36_000.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `updraft-core` | Snapshots, validity flags, clock unwrapping, geographic primitives, settings, core traits |
//! | [`engine`] | `updraft-engine` | The blackboard, scheduled workers, flight sessions, and consumer signals |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core value types and traits (`updraft-core`).
///
/// Contains [`types::SensorSnapshot`] and friends, the
/// [`types::Validity`] flag, the [`types::ClockUnwrapper`], geographic
/// primitives, shared [`types::ComputeSettings`], and the
/// [`types::Computer`] and [`types::SettingsSink`] traits.
pub use updraft_core as types;

/// Fusion, scheduling, and session wiring (`updraft-engine`).
///
/// [`engine::Blackboard`] for the shared state,
/// [`engine::FlightSession`] for the fully wired pipeline, and
/// [`engine::ScheduledWorker`] underneath both background threads.
pub use updraft_engine as engine;

/// Common imports for typical Updraft usage.
///
/// ```rust
/// use updraft::prelude::*;
/// ```
///
/// This imports the most frequently used types: snapshots and their
/// validity flags, time and geography, the session and blackboard, and
/// the extension traits.
pub mod prelude {
    // Snapshots and fused state
    pub use updraft_core::{
        BasicDerived, CurrentSnapshot, DerivedResult, DeviceSettingsReport, SensorSnapshot, Source,
        Validity,
    };

    // Time and geography
    pub use updraft_core::{Angle, GeoPoint, SpeedVector, TimeStamp, WallTime};

    // Settings, identity, and the extension traits
    pub use updraft_core::{
        CancelToken, ComputeInput, ComputeSettings, Computer, DeviceId, SettingsSink,
    };

    // Errors
    pub use updraft_core::{ComputeError, DeviceError};

    // Engine
    pub use updraft_engine::{
        Blackboard, ComputeHandle, CruiseComputer, EngineConfig, FlightSession, ShutdownReport,
        Signals, TriggerFabric, WorkerState,
    };
}
