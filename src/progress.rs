//! Progress-callback trait for export batch events.
//!
//! Pass an [`Arc<dyn ExportProgressCallback>`] to
//! [`crate::export::Exporter::with_progress`] to receive events as each job
//! moves through its states. The CLI renders them with an indicatif bar; a
//! GUI could forward them to its event loop instead.
//!
//! # Example
//!
//! ```rust
//! use pdfcover::ExportProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for CountingCallback {
//!     fn on_job_complete(&self, index: usize, total: usize, output: &std::path::Path) {
//!         let done = self.written.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{}/{} written ({} so far): {}", index + 1, total, done, output.display());
//!     }
//! }
//! ```

use crate::model::{BatchReport, JobState};
use std::path::Path;
use std::sync::Arc;

/// Called by the export coordinator as it runs a batch.
///
/// Implementations must be `Send + Sync`: the coordinator is async and may be
/// driven from any runtime thread. All methods default to no-ops.
///
/// `index` is the 0-based position of the job in the batch.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once before the first job.
    fn on_batch_start(&self, total_jobs: usize) {
        let _ = total_jobs;
    }

    /// Called when a job leaves `Pending`.
    ///
    /// # Arguments
    /// * `source`: the source PDF path
    fn on_job_start(&self, index: usize, total: usize, source: &Path) {
        let _ = (index, total, source);
    }

    /// Called on every state change, including the terminal one.
    fn on_job_state(&self, index: usize, state: &JobState) {
        let _ = (index, state);
    }

    /// Called when a job's output has been persisted.
    fn on_job_complete(&self, index: usize, total: usize, output: &Path) {
        let _ = (index, total, output);
    }

    /// Called when a job fails (including cancellation).
    ///
    /// # Arguments
    /// * `error`: human-readable error description
    fn on_job_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after all jobs have been attempted.
    fn on_batch_complete(&self, report: &BatchReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        started: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        states: Mutex<Vec<&'static str>>,
    }

    impl ExportProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_jobs: usize) {
            self.started.store(total_jobs, Ordering::SeqCst);
        }

        fn on_job_state(&self, _index: usize, state: &JobState) {
            self.states.lock().unwrap().push(state.name());
        }

        fn on_job_complete(&self, _index: usize, _total: usize, _output: &Path) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_job_start(0, 2, Path::new("a.pdf"));
        cb.on_job_state(0, &JobState::Validating);
        cb.on_job_complete(0, 2, Path::new("/out/a.pdf"));
        cb.on_job_error(1, 2, "no space");
        cb.on_batch_complete(&BatchReport::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(2);
        tracker.on_job_state(0, &JobState::Validating);
        tracker.on_job_state(0, &JobState::Rendering);
        tracker.on_job_complete(0, 2, Path::new("/out/a.pdf"));
        tracker.on_job_error(1, 2, "corrupt");

        assert_eq!(tracker.started.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.states.lock().unwrap(), vec!["validating", "rendering"]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_job_start(0, 10, Path::new("x.pdf"));
    }
}
