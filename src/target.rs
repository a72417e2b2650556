//! Export targets: destination listing, pre-write validation and the
//! collision-free atomic write.
//!
//! Free space is looked up through the [`SpaceProbe`] trait so the export
//! coordinator can be driven against a fake volume in tests.

use crate::config::AppConfig;
use crate::error::CoverError;
use crate::model::ExportTarget;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Upper bound on `<stem> (N).pdf` suffixes tried before giving up.
const MAX_NAME_SUFFIX: u32 = 9_999;

// ── Free space ───────────────────────────────────────────────────────────

/// Reports bytes available on the volume holding a path.
pub trait SpaceProbe: Send + Sync {
    /// `None` when the volume cannot be identified.
    fn available_bytes(&self, path: &Path) -> Option<u64>;
}

/// Queries the operating system's disk list.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpaceProbe;

impl SpaceProbe for SystemSpaceProbe {
    fn available_bytes(&self, path: &Path) -> Option<u64> {
        reader_scan::available_space(path)
    }
}

/// Reports the same figure for every path.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpaceProbe(pub Option<u64>);

impl SpaceProbe for FixedSpaceProbe {
    fn available_bytes(&self, _path: &Path) -> Option<u64> {
        self.0
    }
}

// ── Listing ──────────────────────────────────────────────────────────────

/// Detected readers (their documents folders) plus the configured default
/// export directory when it exists. Never fails.
pub fn list_devices(config: &AppConfig) -> Vec<ExportTarget> {
    let mut targets: Vec<ExportTarget> = reader_scan::detect_readers()
        .into_iter()
        .map(|reader| ExportTarget {
            writable: Some(probe_writable(&reader.documents_dir).is_ok()),
            path: reader.documents_dir,
            label: reader.label,
            device: Some(reader.kind),
            free_space_bytes: reader.free_space_bytes,
        })
        .collect();

    if let Some(dir) = config.export_directory() {
        if dir.is_dir() {
            targets.push(ExportTarget::folder(dir).probe());
        } else {
            debug!("Default export directory {} does not exist", dir.display());
        }
    }

    info!("{} export target(s) available", targets.len());
    targets
}

// ── Validation ───────────────────────────────────────────────────────────

pub fn ensure_directory(path: &Path) -> Result<(), CoverError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(CoverError::TargetNotDirectory {
            path: path.to_path_buf(),
        }),
    }
}

/// Create and remove a scratch file in `dir`.
pub fn probe_writable(dir: &Path) -> Result<(), CoverError> {
    tempfile::Builder::new()
        .prefix(".pdfcover-probe")
        .tempfile_in(dir)
        .map(drop)
        .map_err(|e| CoverError::TargetNotWritable {
            path: dir.to_path_buf(),
            detail: e.to_string(),
        })
}

/// Require strictly more than `needed` bytes free. Unknown free space passes
/// with a warning.
pub fn check_space(dir: &Path, needed: u64, probe: &dyn SpaceProbe) -> Result<(), CoverError> {
    match probe.available_bytes(dir) {
        Some(available) if available <= needed => Err(CoverError::InsufficientSpace {
            path: dir.to_path_buf(),
            needed,
            available,
        }),
        Some(available) => {
            debug!("{} has {} bytes free, need {}", dir.display(), available, needed);
            Ok(())
        }
        None => {
            warn!("Free space unknown for {}, proceeding", dir.display());
            Ok(())
        }
    }
}

/// Directory, write permission and free-space checks in that order.
pub fn validate_target(dir: &Path, needed: u64, probe: &dyn SpaceProbe) -> Result<(), CoverError> {
    ensure_directory(dir)?;
    probe_writable(dir)?;
    check_space(dir, needed, probe)
}

// ── Naming and writing ───────────────────────────────────────────────────

/// `dir/file_name` if free, else `dir/<stem> (N).<ext>` with the smallest free N.
pub fn derive_output_path(dir: &Path, file_name: &str) -> Result<PathBuf, CoverError> {
    candidate_names(file_name)
        .map(|name| dir.join(name))
        .find(|candidate| !is_taken(candidate))
        .ok_or_else(|| no_free_name(dir, file_name))
}

/// `file_name`, then `<stem> (1).<ext>` up to [`MAX_NAME_SUFFIX`].
fn candidate_names(file_name: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(file_name.to_string())
        .chain((1..=MAX_NAME_SUFFIX).map(move |n| suffixed_name(file_name, n)))
}

/// Any directory entry counts, including a symlink whose target is missing.
fn is_taken(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

fn suffixed_name(file_name: &str, n: u32) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    }
}

fn no_free_name(dir: &Path, file_name: &str) -> CoverError {
    CoverError::Internal(format!("no free name for '{file_name}' in {}", dir.display()))
}

/// Write `bytes` into `dir` under a derived, collision-free name.
///
/// The data goes to a temp file inside `dir` first and is then persisted
/// without clobbering; if another writer takes the name in between, the next
/// suffix is tried. On error the temp file is removed, leaving no partial
/// output behind.
pub fn write_output(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, CoverError> {
    let write_err = |source: std::io::Error| CoverError::OutputWriteFailed {
        path: dir.join(file_name),
        source,
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".pdfcover-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    persist_free_name(tmp, dir, file_name)
}

fn persist_free_name(mut tmp: NamedTempFile, dir: &Path, file_name: &str) -> Result<PathBuf, CoverError> {
    for name in candidate_names(file_name) {
        let path = dir.join(name);
        if is_taken(&path) {
            continue;
        }
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!("Persisted {}", path.display());
                return Ok(path);
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("{} appeared concurrently, trying the next name", path.display());
                tmp = e.file;
            }
            Err(e) => {
                return Err(CoverError::OutputWriteFailed {
                    path,
                    source: e.error,
                })
            }
        }
    }
    Err(no_free_name(dir, file_name))
}
