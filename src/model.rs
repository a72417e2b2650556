//! Domain types shared by the renderer, assembler and export coordinator.
//!
//! ```text
//! SourceDocument ─┐
//! CoverCandidate ─┼─▶ ExportJob ──run_batch──▶ JobResult … ─▶ BatchReport
//! ExportTarget ───┘
//! ```

use crate::error::{CoverError, JobError};
use image::{DynamicImage, ImageReader};
use reader_scan::ReaderKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Source document ──────────────────────────────────────────────────────

/// A PDF chosen for export. Immutable once opened; see
/// [`crate::pipeline::input::open_source`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDocument {
    path: PathBuf,
    page_count: usize,
    byte_size: u64,
}

impl SourceDocument {
    pub(crate) fn new(path: PathBuf, page_count: usize, byte_size: u64) -> Self {
        Self {
            path,
            page_count,
            byte_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// File name used for the exported copy.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book.pdf".to_string())
    }
}

// ── Cover candidate ──────────────────────────────────────────────────────

/// Where a cover image came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoverSource {
    Search {
        provider: String,
        title: String,
        url: String,
    },
    Upload {
        path: PathBuf,
    },
    Generated {
        model: String,
        prompt: String,
    },
}

impl fmt::Display for CoverSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverSource::Search { provider, title, .. } => write!(f, "{provider}: {title}"),
            CoverSource::Upload { path } => write!(f, "file {}", path.display()),
            CoverSource::Generated { model, .. } => write!(f, "generated by {model}"),
        }
    }
}

/// An encoded cover image with its pixel size.
///
/// Construction decodes the header, so a candidate always holds a readable
/// image.
#[derive(Clone, PartialEq, Eq)]
pub struct CoverCandidate {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    source: CoverSource,
}

impl fmt::Debug for CoverCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverCandidate")
            .field("bytes", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("source", &self.source)
            .finish()
    }
}

impl CoverCandidate {
    pub fn from_bytes(bytes: Vec<u8>, source: CoverSource) -> Result<Self, CoverError> {
        let decode_err = |detail: String| CoverError::ImageDecode {
            origin: source.to_string(),
            detail,
        };
        let (width, height) = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| decode_err(e.to_string()))?
            .into_dimensions()
            .map_err(|e| decode_err(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(decode_err("image has no pixels".into()));
        }
        Ok(Self {
            bytes,
            width,
            height,
            source,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn source(&self) -> &CoverSource {
        &self.source
    }

    /// Decode the full image.
    pub fn decode(&self) -> Result<DynamicImage, CoverError> {
        image::load_from_memory(&self.bytes).map_err(|e| CoverError::ImageDecode {
            origin: self.source.to_string(),
            detail: e.to_string(),
        })
    }
}

// ── Export target ────────────────────────────────────────────────────────

/// A destination directory: a detected reader or a user-chosen folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub path: PathBuf,
    pub label: String,
    /// `Some` for detected reader devices.
    pub device: Option<ReaderKind>,
    /// Bytes available, when the volume could be identified.
    pub free_space_bytes: Option<u64>,
    /// `None` until [`ExportTarget::probe`] has run.
    pub writable: Option<bool>,
}

impl ExportTarget {
    /// A plain folder target. Touches nothing on disk; call
    /// [`ExportTarget::probe`] to fill in free space and writability.
    pub fn folder(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            label: path.display().to_string(),
            free_space_bytes: None,
            writable: None,
            device: None,
            path,
        }
    }

    /// Look up free space and try a scratch write. Informational only: the
    /// export re-validates the directory before every write.
    pub fn probe(mut self) -> Self {
        self.free_space_bytes = reader_scan::available_space(&self.path);
        self.writable = Some(crate::target::probe_writable(&self.path).is_ok());
        self
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.device, self.free_space_bytes) {
            (Some(kind), Some(free)) => write!(
                f,
                "{} [{}] {} ({:.0} MB free)",
                self.label,
                kind.display_name(),
                self.path.display(),
                free as f64 / (1024.0 * 1024.0)
            ),
            (Some(kind), None) => write!(f, "{} [{}] {}", self.label, kind.display_name(), self.path.display()),
            (None, _) => write!(f, "{}", self.path.display()),
        }
    }
}

// ── Jobs ─────────────────────────────────────────────────────────────────

/// One source + one cover + one target. Consumed by the batch that runs it.
///
/// A job cannot be built without a cover, so every queued job has exactly
/// one resolved [`CoverCandidate`].
#[derive(Debug, Clone)]
pub struct ExportJob {
    source: SourceDocument,
    cover: Arc<CoverCandidate>,
    target: ExportTarget,
}

impl ExportJob {
    pub fn new(source: SourceDocument, cover: Arc<CoverCandidate>, target: ExportTarget) -> Self {
        Self {
            source,
            cover,
            target,
        }
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    pub fn cover(&self) -> &Arc<CoverCandidate> {
        &self.cover
    }

    pub fn target(&self) -> &ExportTarget {
        &self.target
    }
}

/// Job lifecycle.
///
/// ```text
/// Pending ─▶ Validating ─▶ Rendering ─▶ Writing ─▶ Succeeded
///    └───────────┴─────────────┴───────────┴─────▶ Failed
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Validating,
    Rendering,
    Writing,
    Succeeded { output: PathBuf },
    Failed { error: JobError },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded { .. } | JobState::Failed { .. })
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: &JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (s, Failed { .. }) => !s.is_terminal(),
            (Pending, Validating) | (Validating, Rendering) | (Rendering, Writing) => true,
            (Writing, Succeeded { .. }) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Validating => "validating",
            JobState::Rendering => "rendering",
            JobState::Writing => "writing",
            JobState::Succeeded { .. } => "succeeded",
            JobState::Failed { .. } => "failed",
        }
    }
}

/// Final outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub source: PathBuf,
    pub target: PathBuf,
    pub state: JobState,
}

impl JobResult {
    pub fn output(&self) -> Option<&Path> {
        match &self.state {
            JobState::Succeeded { output } => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.state {
            JobState::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Results of a batch in input order, with counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<JobResult>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    pub(crate) fn push(&mut self, result: JobResult) {
        match result.state {
            JobState::Succeeded { .. } => self.succeeded += 1,
            _ => self.failed += 1,
        }
        self.results.push(result);
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
