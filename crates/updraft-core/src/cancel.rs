//! Cooperative cancellation for long computation passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag a worker raises to interrupt its tick body.
///
/// Cloning shares the flag. The scheduler raises it when the worker is
/// told to stop (not on suspend); tick bodies poll it at convenient
/// points and return [`ComputeError::Cancelled`] when it is set.
///
/// [`ComputeError::Cancelled`]: crate::error::ComputeError::Cancelled
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once [`set`](Self::set) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Raise the flag. Visible to all clones.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Lower the flag so the token can be reused across runs.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
