//! Progress reporting for per-record loops.
//!
//! Origin sampling and route resolution walk the record set one row at a
//! time and can run for many minutes under the routing rate limit. They
//! report through [`ProgressCallback`] so the library crates stay free of
//! any terminal rendering.

/// Receives progress updates from a long-running per-record loop.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of records the loop will visit.
    fn set_total(&self, total: u64);

    /// Advances by `delta` records.
    fn inc(&self, delta: u64);

    /// Replaces the status message.
    fn set_message(&self, msg: String);

    /// Marks the loop as done.
    fn finish(&self, msg: String);
}

/// Discards all updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}
