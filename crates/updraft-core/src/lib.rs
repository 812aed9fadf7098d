//! Core types and traits for the Updraft soaring engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the value types that cross the engine's thread boundaries: sensor
//! snapshots and their validity flags, the per-source clock unwrapper,
//! geographic primitives, shared settings, error types, and the traits
//! computation passes and device sinks implement.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cancel;
pub mod clock;
pub mod error;
pub mod geo;
pub mod id;
pub mod settings;
pub mod snapshot;
pub mod time;
pub mod traits;
pub mod validity;

pub use cancel::CancelToken;
pub use clock::ClockUnwrapper;
pub use error::{ComputeError, DeviceError};
pub use geo::{wind_triangle, Angle, GeoPoint, SpeedVector, GRAVITY};
pub use id::{DeviceId, SubscriberId};
pub use settings::ComputeSettings;
pub use snapshot::{
    Airspeed, BasicDerived, CurrentSnapshot, DerivedResult, DeviceSettingsReport, SensorSnapshot,
    Source,
};
pub use time::{TimeStamp, WallTime};
pub use traits::{ComputeInput, Computer, SettingsSink};
pub use validity::Validity;
