//! The per-field valid-flag pattern.

use crate::time::WallTime;

/// Tracks whether a field currently holds usable data and when it was
/// last updated.
///
/// Every measured field in a [`SensorSnapshot`](crate::SensorSnapshot)
/// is paired with a `Validity`. Consumers must check [`valid`](Self::valid)
/// before reading the paired value; an invalid field's value is
/// unspecified and must be ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Validity {
    last_update: Option<WallTime>,
}

impl Validity {
    /// An invalid (never updated) flag.
    pub const INVALID: Validity = Validity { last_update: None };

    /// A flag that is valid as of `at`.
    pub fn new(at: WallTime) -> Self {
        Self {
            last_update: Some(at),
        }
    }

    /// Whether the paired field holds usable data.
    pub fn valid(self) -> bool {
        self.last_update.is_some()
    }

    /// Mark the field valid as of `at`.
    pub fn update(&mut self, at: WallTime) {
        self.last_update = Some(at);
    }

    /// Mark the field invalid.
    pub fn clear(&mut self) {
        self.last_update = None;
    }

    /// The time of the last update, if valid.
    pub fn time(self) -> Option<WallTime> {
        self.last_update
    }

    /// Invalidate the field if it has not been updated within `max_age`
    /// seconds of `now`.
    ///
    /// Returns true only when this call performed the valid→invalid
    /// transition; an already-invalid flag returns false, so callers can
    /// use the return value for edge-triggered disconnect handling.
    pub fn expire(&mut self, now: WallTime, max_age: f64) -> bool {
        match self.last_update {
            Some(at) if now - at > max_age => {
                self.last_update = None;
                true
            }
            _ => false,
        }
    }

    /// Whether this flag is valid and was updated more recently than
    /// `other`'s last update.
    ///
    /// An invalid `other` counts as infinitely old, so any valid flag is
    /// modified with respect to it.
    pub fn modified_since(self, other: Validity) -> bool {
        match (self.last_update, other.last_update) {
            (Some(mine), Some(theirs)) => mine > theirs,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}
