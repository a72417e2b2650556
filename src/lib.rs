//! # pdfcover
//!
//! Give PDF ebooks a proper cover page and copy them onto an e-reader.
//!
//! E-readers show the first page of a PDF as its thumbnail in the library
//! view. Many PDFs open on a blank page or a plain title sheet, so the
//! library fills up with grey rectangles. This crate finds (or generates) a
//! cover image, renders it as a full-bleed first page and writes the new
//! PDF straight into a connected reader's documents folder.
//!
//! ## Pipeline Overview
//!
//! ```text
//! cover image ──┐
//!               ├─ 1. Render    scale-to-fill + centre crop into a page-sized JPEG page
//! source PDF ───┤
//!               ├─ 2. Assemble  cover page + every source page, metadata kept
//!               ├─ 3. Validate  target is a writable directory with room to spare
//!               └─ 4. Write     temp file in the target, atomically renamed
//! ```
//!
//! Cover images come from three places:
//!
//! - a local file ([`pipeline::input::load_cover_image`]),
//! - book-metadata search ([`providers::search_covers`] over Google Books and
//!   Open Library),
//! - AI generation ([`providers::OpenAiImageGenerator`]).
//!
//! Destinations are any folder, or a connected reader found by the
//! `reader-scan` crate ([`target::list_devices`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfcover::{pipeline::input, ExportJob, ExportOptions, ExportTarget, Exporter, PageSize};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ExportOptions::builder()
//!         .page_size(PageSize::A4)
//!         .dpi(300)
//!         .build()?;
//!     let cover = Arc::new(input::load_cover_image("cover.jpg")?);
//!     let job = ExportJob::new(
//!         input::open_source("book.pdf")?,
//!         cover,
//!         ExportTarget::folder("/media/alice/Kindle/documents"),
//!     );
//!     let report = Exporter::new(options).run_batch(vec![job]).await;
//!     for result in &report.results {
//!         println!("{} → {}", result.source.display(), result.state.name());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfcover` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfcover = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod providers;
pub mod target;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AppConfig, Credentials, ExportOptions, ExportOptionsBuilder, GenerationOptions, PageSize,
};
pub use error::{CoverError, ErrorKind, JobError};
pub use export::{run_batch, CancelToken, Exporter};
pub use model::{
    BatchReport, CoverCandidate, CoverSource, ExportJob, ExportTarget, JobResult, JobState,
    SourceDocument,
};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reader_scan::{DetectedReader, ReaderKind};

/// Open a source PDF and report its page count and size without exporting.
///
/// ```rust,no_run
/// let doc = pdfcover::inspect("book.pdf")?;
/// println!("{} pages, {} bytes", doc.page_count(), doc.byte_size());
/// # Ok::<(), pdfcover::CoverError>(())
/// ```
pub fn inspect(path: impl AsRef<std::path::Path>) -> Result<SourceDocument, CoverError> {
    pipeline::input::open_source(path)
}
