//! Observer port for index builds.
//!
//! The builder never prints. It reports progress, per-chunk failures and
//! the failure-threshold warning through a [`BuildObserver`] handed to it by
//! the caller, and polls the same observer for cooperative cancellation.

use crate::error::CoreError;

/// Receives build events. All methods default to no-ops.
pub trait BuildObserver: Send + Sync {
    /// Called after every original chunk, whether it embedded or not.
    fn chunk_done(&self, _done: usize, _total: usize) {}

    /// Called when a chunk produced no embedding at all. `error` is the
    /// last failure seen while trying its pieces.
    fn chunk_failed(&self, _chunk_id: u64, _error: &CoreError) {}

    /// Called once, when the failed-chunk count first exceeds `threshold`.
    fn failure_threshold_exceeded(&self, _failed: usize, _threshold: usize) {}

    /// Polled before each chunk. Returning `true` stops the build and the
    /// partial index is returned.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl BuildObserver for NoopObserver {}

impl<O: BuildObserver + ?Sized> BuildObserver for Box<O> {
    fn chunk_done(&self, done: usize, total: usize) {
        (**self).chunk_done(done, total);
    }

    fn chunk_failed(&self, chunk_id: u64, error: &CoreError) {
        (**self).chunk_failed(chunk_id, error);
    }

    fn failure_threshold_exceeded(&self, failed: usize, threshold: usize) {
        (**self).failure_threshold_exceeded(failed, threshold);
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}
