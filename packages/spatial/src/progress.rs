//! Progress reporting for per-point association work.
//!
//! [`ProgressCallback`] keeps the associator independent of how progress
//! is rendered. The CLI supplies an `indicatif` bar; library callers and
//! tests pass [`null_progress`].

use std::sync::Arc;

/// Receives progress updates from long-running pipeline stages.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total number of units (points) to process.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Replaces the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the work as complete with a final message.
    fn finish(&self, msg: String);
}

/// A [`ProgressCallback`] that ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
