//! Sensor fusion, compute scheduling, and session wiring for Updraft.
//!
//! This crate is the concurrent heart of the engine: the shared
//! [`Blackboard`] that fuses per-device snapshots into one current
//! state, the [`ScheduledWorker`] base both background workers run on,
//! the merge and compute passes themselves, and the [`FlightSession`]
//! that wires it all together for the life of one flight.
//!
//! Drivers, consumers, and computation passes plug in through the
//! traits in `updraft-core`; nothing here knows about wire protocols
//! or rendering.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod blackboard;
mod calc;
pub mod compute;
pub mod config;
mod device;
mod merge;
pub mod scheduler;
pub mod session;
pub mod signals;

pub use blackboard::{Blackboard, MergeSummary};
pub use compute::{ComputeHandle, CruiseComputer};
pub use config::{ClockConfig, ConfigError, EngineConfig, MAX_DEVICES};
pub use scheduler::{ScheduledWorker, Tickable, TriggerHandle, WorkerState, WorkerTiming};
pub use session::{FlightSession, ShutdownReport};
pub use signals::{Signal, SignalSubscription, Signals, TriggerFabric};
