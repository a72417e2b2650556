//! Export coordinator: run a batch of cover-injection jobs.
//!
//! Jobs run one after another in input order. Each job walks
//! `Pending → Validating → Rendering → Writing → Succeeded`, dropping to
//! `Failed` at the first error; a failed job never stops the batch.
//!
//! Free space is checked twice: against the source size before any work,
//! and against the assembled output size right before writing. Rendering and
//! assembly run on the blocking thread pool.

use crate::config::ExportOptions;
use crate::error::{CoverError, JobError};
use crate::model::{BatchReport, CoverCandidate, ExportJob, ExportTarget, JobResult, JobState};
use crate::pipeline::{assemble, input, render};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::target::{self, SpaceProbe, SystemSpaceProbe};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared flag checked before each job starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Coordinator ──────────────────────────────────────────────────────────

/// Runs export batches with fixed options.
///
/// ```rust,no_run
/// use pdfcover::{pipeline::input, ExportJob, ExportOptions, ExportTarget, Exporter};
/// use std::sync::Arc;
///
/// # async fn demo() -> Result<(), pdfcover::CoverError> {
/// let cover = Arc::new(input::load_cover_image("cover.jpg")?);
/// let job = ExportJob::new(
///     input::open_source("book.pdf")?,
///     cover,
///     ExportTarget::folder("/media/alice/Kindle/documents"),
/// );
/// let report = Exporter::new(ExportOptions::default()).run_batch(vec![job]).await;
/// println!("{} written, {} failed", report.succeeded, report.failed);
/// # Ok(())
/// # }
/// ```
pub struct Exporter {
    options: ExportOptions,
    probe: Arc<dyn SpaceProbe>,
    progress: ProgressCallback,
    cancel: CancelToken,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Self {
            options,
            probe: Arc::new(SystemSpaceProbe),
            progress: Arc::new(NoopProgressCallback),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_space_probe(mut self, probe: Arc<dyn SpaceProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels the remaining jobs of a running batch.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Run `jobs` sequentially and report each outcome in input order.
    pub async fn run_batch(&self, jobs: Vec<ExportJob>) -> BatchReport {
        self.run_entries(jobs.into_iter().map(BatchEntry::Job).collect())
            .await
    }

    /// Open each source path and export it with `cover` to `target`.
    ///
    /// Sources that fail to open are reported as failed jobs at their
    /// position instead of aborting the batch.
    pub async fn run_sources(
        &self,
        sources: &[PathBuf],
        cover: Arc<CoverCandidate>,
        target: &ExportTarget,
    ) -> BatchReport {
        let entries = sources
            .iter()
            .map(|path| match input::open_source(path) {
                Ok(doc) => BatchEntry::Job(ExportJob::new(doc, Arc::clone(&cover), target.clone())),
                Err(e) => {
                    warn!("Cannot open {}: {e}", path.display());
                    BatchEntry::Rejected {
                        source: path.clone(),
                        target: target.path.clone(),
                        error: e.into(),
                    }
                }
            })
            .collect();
        self.run_entries(entries).await
    }

    /// Blocking wrapper around [`Exporter::run_batch`].
    ///
    /// Creates a temporary tokio runtime internally; do not call it from
    /// inside an async context.
    pub fn run_batch_sync(&self, jobs: Vec<ExportJob>) -> Result<BatchReport, CoverError> {
        Ok(tokio::runtime::Runtime::new()
            .map_err(|e| CoverError::Internal(format!("Failed to create tokio runtime: {e}")))?
            .block_on(self.run_batch(jobs)))
    }

    async fn run_entries(&self, entries: Vec<BatchEntry>) -> BatchReport {
        let total = entries.len();
        let batch_start = Instant::now();
        info!("Starting export batch: {} job(s)", total);
        self.progress.on_batch_start(total);

        let mut leaves = LeafCache::default();
        let mut report = BatchReport::default();

        for (index, entry) in entries.into_iter().enumerate() {
            let result = match entry {
                BatchEntry::Job(job) => self.run_job(index, total, &job, &mut leaves).await,
                BatchEntry::Rejected {
                    source,
                    target,
                    error,
                } => {
                    self.progress.on_job_start(index, total, &source);
                    let mut tracker = StateTracker::new(index, &self.progress);
                    tracker.fail(total, error);
                    JobResult {
                        source,
                        target,
                        state: tracker.state,
                    }
                }
            };
            report.push(result);
        }

        info!(
            "Export batch complete: {}/{} succeeded in {}ms",
            report.succeeded,
            total,
            batch_start.elapsed().as_millis()
        );
        self.progress.on_batch_complete(&report);
        report
    }

    async fn run_job(
        &self,
        index: usize,
        total: usize,
        job: &ExportJob,
        leaves: &mut LeafCache,
    ) -> JobResult {
        let source = job.source().path().to_path_buf();
        let target_dir = job.target().path.clone();
        self.progress.on_job_start(index, total, &source);

        let mut tracker = StateTracker::new(index, &self.progress);
        if self.cancel.is_cancelled() {
            info!("Job {}: cancelled before start", index + 1);
            tracker.fail(total, JobError::Cancelled);
        } else {
            info!(
                "Job {}/{}: {} → {}",
                index + 1,
                total,
                source.display(),
                target_dir.display()
            );
            match self.execute(job, &mut tracker, leaves).await {
                Ok(output) => {
                    info!("Job {}: wrote {}", index + 1, output.display());
                    self.progress.on_job_complete(index, total, &output);
                    tracker.advance(JobState::Succeeded { output });
                }
                Err(e) => {
                    warn!("Job {}: {e}", index + 1);
                    tracker.fail(total, e.into());
                }
            }
        }

        JobResult {
            source,
            target: target_dir,
            state: tracker.state,
        }
    }

    async fn execute(
        &self,
        job: &ExportJob,
        tracker: &mut StateTracker<'_>,
        leaves: &mut LeafCache,
    ) -> Result<PathBuf, CoverError> {
        let dir = job.target().path.clone();

        // ── Validating ───────────────────────────────────────────────────
        tracker.advance(JobState::Validating);
        target::validate_target(&dir, job.source().byte_size(), self.probe.as_ref())?;

        // ── Rendering ────────────────────────────────────────────────────
        tracker.advance(JobState::Rendering);
        let leaf = leaves.get_or_render(job.cover(), &self.options).await?;
        let source_path = job.source().path().to_path_buf();
        let replace = self.options.replace_first_page;
        let assembled = blocking(move || {
            let bytes = input::read_bytes(&source_path)?;
            assemble::prepend_with(&bytes, &leaf, replace)
        })
        .await?;

        // ── Writing ──────────────────────────────────────────────────────
        tracker.advance(JobState::Writing);
        target::check_space(&dir, assembled.len() as u64, self.probe.as_ref())?;
        let file_name = job.source().file_name();
        blocking(move || target::write_output(&dir, &file_name, &assembled)).await
    }
}

/// Convenience: run `jobs` with `options` and the system free-space probe.
pub async fn run_batch(jobs: Vec<ExportJob>, options: &ExportOptions) -> BatchReport {
    Exporter::new(options.clone()).run_batch(jobs).await
}

// ── Internals ────────────────────────────────────────────────────────────

enum BatchEntry {
    Job(ExportJob),
    Rejected {
        source: PathBuf,
        target: PathBuf,
        error: JobError,
    },
}

/// Tracks one job's state and reports every transition.
struct StateTracker<'a> {
    index: usize,
    state: JobState,
    progress: &'a ProgressCallback,
}

impl<'a> StateTracker<'a> {
    fn new(index: usize, progress: &'a ProgressCallback) -> Self {
        Self {
            index,
            state: JobState::Pending,
            progress,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "illegal transition {} → {}",
            self.state.name(),
            next.name()
        );
        debug!("Job {}: {} → {}", self.index + 1, self.state.name(), next.name());
        self.state = next;
        self.progress.on_job_state(self.index, &self.state);
    }

    fn fail(&mut self, total: usize, error: JobError) {
        self.progress.on_job_error(self.index, total, &error.to_string());
        self.advance(JobState::Failed { error });
    }
}

/// Cover leaves rendered during one batch, keyed by cover identity.
///
/// Jobs sharing an `Arc<CoverCandidate>` share one rendered leaf. The map
/// lives only as long as the batch, which also owns every cover `Arc`, so
/// pointer keys cannot be recycled while in use.
#[derive(Default)]
struct LeafCache {
    leaves: HashMap<usize, Arc<Vec<u8>>>,
}

impl LeafCache {
    async fn get_or_render(
        &mut self,
        cover: &Arc<CoverCandidate>,
        options: &ExportOptions,
    ) -> Result<Arc<Vec<u8>>, CoverError> {
        let key = Arc::as_ptr(cover) as usize;
        if let Some(leaf) = self.leaves.get(&key) {
            debug!("Reusing rendered cover leaf ({} bytes)", leaf.len());
            return Ok(Arc::clone(leaf));
        }

        let cover = Arc::clone(cover);
        let options = options.clone();
        let leaf = Arc::new(blocking(move || render::render(&cover, &options)).await?);
        debug!("Rendered cover leaf ({} bytes)", leaf.len());
        self.leaves.insert(key, Arc::clone(&leaf));
        Ok(leaf)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, CoverError>
where
    F: FnOnce() -> Result<T, CoverError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoverError::Internal(format!("Export task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CoverSource;
    use crate::pipeline::testing::sample_pdf;
    use crate::progress::ExportProgressCallback;
    use crate::target::FixedSpaceProbe;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Mutex;

    fn cover() -> Arc<CoverCandidate> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 40, Rgb([0, 80, 160])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        Arc::new(
            CoverCandidate::from_bytes(
                buf,
                CoverSource::Upload {
                    path: "cover.png".into(),
                },
            )
            .unwrap(),
        )
    }

    fn options() -> ExportOptions {
        ExportOptions::builder().dpi(72).build().unwrap()
    }

    fn write_source(dir: &Path, name: &str, pages: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, sample_pdf(pages)).unwrap();
        path
    }

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<(usize, &'static str)>>,
    }

    impl ExportProgressCallback for Recorder {
        fn on_job_state(&self, index: usize, state: &JobState) {
            self.states.lock().unwrap().push((index, state.name()));
        }
    }

    #[tokio::test]
    async fn states_follow_the_lifecycle() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let path = write_source(src.path(), "a.pdf", 2);
        let recorder = Arc::new(Recorder::default());

        let exporter = Exporter::new(options())
            .with_space_probe(Arc::new(FixedSpaceProbe(None)))
            .with_progress(recorder.clone());
        let report = exporter
            .run_sources(&[path], cover(), &ExportTarget::folder(out.path()))
            .await;

        assert_eq!(report.succeeded, 1);
        let states: Vec<&str> = recorder.states.lock().unwrap().iter().map(|(_, s)| *s).collect();
        assert_eq!(states, vec!["validating", "rendering", "writing", "succeeded"]);
    }

    #[tokio::test]
    async fn unopenable_source_fails_in_place() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let good = write_source(src.path(), "good.pdf", 1);
        let bad = src.path().join("bad.pdf");
        std::fs::write(&bad, b"not a pdf at all").unwrap();

        let report = Exporter::new(options())
            .with_space_probe(Arc::new(FixedSpaceProbe(None)))
            .run_sources(&[bad.clone(), good], cover(), &ExportTarget::folder(out.path()))
            .await;

        assert_eq!((report.succeeded, report.failed), (1, 1));
        assert_eq!(report.results[0].source, bad);
        assert_eq!(
            report.results[0].error().map(JobError::kind),
            Some(crate::error::ErrorKind::CorruptSource)
        );
    }

    #[tokio::test]
    async fn cancelled_batch_fails_remaining_jobs() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let a = write_source(src.path(), "a.pdf", 1);
        let b = write_source(src.path(), "b.pdf", 1);

        let exporter = Exporter::new(options()).with_space_probe(Arc::new(FixedSpaceProbe(None)));
        exporter.cancel_token().cancel();
        let report = exporter
            .run_sources(&[a, b], cover(), &ExportTarget::folder(out.path()))
            .await;

        assert_eq!(report.failed, 2);
        assert!(report
            .results
            .iter()
            .all(|r| r.error() == Some(&JobError::Cancelled)));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn shared_cover_is_rendered_once() {
        let mut cache = LeafCache::default();
        let c = cover();
        let first = cache.get_or_render(&c, &options()).await.unwrap();
        let second = cache.get_or_render(&c, &options()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.leaves.len(), 1);
    }

    #[test]
    fn sync_wrapper_runs_batch() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let path = write_source(src.path(), "sync.pdf", 1);
        let job = ExportJob::new(
            input::open_source(&path).unwrap(),
            cover(),
            ExportTarget::folder(out.path()),
        );
        let report = Exporter::new(options())
            .with_space_probe(Arc::new(FixedSpaceProbe(None)))
            .run_batch_sync(vec![job])
            .unwrap();
        assert!(report.all_succeeded());
        assert!(out.path().join("sync.pdf").exists());
    }
}
