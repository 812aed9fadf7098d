//! Core abstraction traits for computation passes and setting sinks.

use crate::cancel::CancelToken;
use crate::error::{ComputeError, DeviceError};
use crate::settings::ComputeSettings;
use crate::snapshot::{CurrentSnapshot, DerivedResult};

/// Everything a computation pass sees, copied out of the blackboard
/// before the pass runs.
///
/// The copy is what lets expensive passes run without holding the
/// blackboard lock. `previous` carries the pass's own last output so
/// integrations (flight time, distance) can continue from it.
#[derive(Clone, Debug)]
pub struct ComputeInput {
    /// The fused snapshot the pass computes from.
    pub current: CurrentSnapshot,
    /// Settings in effect for this pass.
    pub settings: ComputeSettings,
    /// The derived result from the previous pass.
    pub previous: DerivedResult,
}

/// An expensive computation pass run by the compute worker.
///
/// Implementations keep their own history between passes (climb
/// samples, last fix seen) and must reset it in [`reset`](Self::reset)
/// when the flight restarts or fix time regresses.
pub trait Computer: Send {
    /// Produce a fresh derived result from `input`.
    ///
    /// Runs outside the blackboard lock and may take its time, but
    /// should poll `cancel` in any loop and return
    /// [`ComputeError::Cancelled`] once it fires. The worker discards
    /// the pass's output on error and keeps the previous result.
    fn compute(
        &mut self,
        input: &ComputeInput,
        cancel: &CancelToken,
    ) -> Result<DerivedResult, ComputeError>;

    /// Background work to run after the main pass, while the worker is
    /// otherwise idle. Called on every tick, even when no new data
    /// arrived. The default does nothing.
    fn idle(&mut self, cancel: &CancelToken) {
        let _ = cancel;
    }

    /// Drop accumulated history. Called on flight restart and when fix
    /// time moves backwards.
    fn reset(&mut self);
}

/// Push-back channel for settings echoed to a device.
///
/// When the pilot turns a knob on one instrument, the bridge forwards
/// the new value to every other registered sink so cockpit displays
/// stay in agreement. Every method defaults to
/// [`DeviceError::Unsupported`]; implement only what the device can
/// accept.
pub trait SettingsSink: Send {
    /// Send a MacCready value in m/s.
    fn put_mac_cready(&mut self, value: f64) -> Result<(), DeviceError> {
        let _ = value;
        Err(DeviceError::Unsupported)
    }

    /// Send a ballast fraction, 0 to 1.
    fn put_ballast(&mut self, fraction: f64) -> Result<(), DeviceError> {
        let _ = fraction;
        Err(DeviceError::Unsupported)
    }

    /// Send a bugs factor, 0 to 1.
    fn put_bugs(&mut self, factor: f64) -> Result<(), DeviceError> {
        let _ = factor;
        Err(DeviceError::Unsupported)
    }

    /// Send a QNH value in hectopascals.
    fn put_qnh(&mut self, hectopascals: f64) -> Result<(), DeviceError> {
        let _ = hectopascals;
        Err(DeviceError::Unsupported)
    }

    /// Send an audio volume, 0 to 100 percent. A direct command, not a
    /// bridged setting: there is no merged volume state to echo.
    fn put_volume(&mut self, percent: u32) -> Result<(), DeviceError> {
        let _ = percent;
        Err(DeviceError::Unsupported)
    }

    /// Tune the active radio frequency, in kilohertz. A direct command
    /// like [`put_volume`](Self::put_volume).
    fn put_active_frequency(&mut self, kilohertz: u32) -> Result<(), DeviceError> {
        let _ = kilohertz;
        Err(DeviceError::Unsupported)
    }
}

const _: fn() = || {
    fn assert_send<T: Send + ?Sized>() {}
    assert_send::<dyn Computer>();
    assert_send::<dyn SettingsSink>();
};
