//! Error types shared across the engine.

use std::error::Error;
use std::fmt;

/// Errors from a computation pass.
///
/// Returned by `Computer::compute`; the compute worker logs failures
/// and keeps the previous derived result, so none of these tear down
/// the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComputeError {
    /// The pass observed the cancel token and bailed out early. Raised
    /// during shutdown; not a fault.
    Cancelled,
    /// The current snapshot lacks the inputs this pass needs.
    InsufficientData {
        /// Which input was missing.
        reason: String,
    },
    /// The computation itself failed.
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "computation cancelled"),
            Self::InsufficientData { reason } => write!(f, "insufficient data: {reason}"),
            Self::Failed { reason } => write!(f, "computation failed: {reason}"),
        }
    }
}

impl Error for ComputeError {}

/// Errors from pushing a setting out to a device.
///
/// Returned by `SettingsSink` methods. The bridge logs failures and
/// moves on to the next sink; a device that cannot accept a setting
/// does not block the others.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceError {
    /// The device has no way to receive this setting.
    Unsupported,
    /// The transport to the device failed.
    Io {
        /// Human-readable description of the transport failure.
        reason: String,
    },
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "setting not supported by device"),
            Self::Io { reason } => write!(f, "device transport failed: {reason}"),
        }
    }
}

impl Error for DeviceError {}
