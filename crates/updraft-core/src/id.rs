//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a device slot on the blackboard.
///
/// Slots are allocated at session creation and addressed by index.
/// `DeviceId(n)` corresponds to the n-th configured device port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for DeviceId {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Identifies one subscription on a signal.
///
/// Allocated per signal from a monotonic counter; never reused within
/// a signal's lifetime, so a dropped subscriber cannot be confused with
/// a later one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SubscriberId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_as_bare_numbers() {
        assert_eq!(DeviceId(3).to_string(), "3");
        assert_eq!(SubscriberId(40).to_string(), "40");
    }
}
