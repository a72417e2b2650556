//! Error types for the pdfcover library.
//!
//! Two error types reflect two failure scopes:
//!
//! * [`CoverError`]: the operation cannot proceed at all (unreadable input,
//!   provider not configured, invalid configuration). Returned as
//!   `Err(CoverError)` from library calls.
//!
//! * [`JobError`]: one export job failed while the rest of the batch carries
//!   on. Stored inside [`crate::model::JobState::Failed`] so a batch report can
//!   list every failure next to every success.
//!
//! Both map onto the coarse [`ErrorKind`] used for reporting and exit codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification shared by [`CoverError`] and [`JobError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// External search or generation service failed.
    Provider,
    /// The source PDF cannot be parsed, is encrypted, or has no pages.
    CorruptSource,
    InsufficientSpace,
    Permission,
    Config,
    Io,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Provider => "provider",
            ErrorKind::CorruptSource => "corrupt source",
            ErrorKind::InsufficientSpace => "insufficient space",
            ErrorKind::Permission => "permission",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// All operation-level errors returned by the pdfcover library.
///
/// Per-job failures inside a batch use [`JobError`] instead.
#[derive(Debug, Error)]
pub enum CoverError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Cover image bytes could not be decoded.
    #[error("Cannot decode cover image ({origin}): {detail}")]
    ImageDecode { origin: String, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Source PDF cannot be parsed, is encrypted, or has no pages.
    #[error("Source PDF is unusable: {detail}")]
    CorruptSource { detail: String },

    /// The cover leaf could not be produced.
    #[error("Cover rendering failed: {detail}")]
    RenderFailed { detail: String },

    /// pdfium-render failed to rasterise a page for a preview.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Target errors ─────────────────────────────────────────────────────
    /// The export target does not exist or is not a directory.
    #[error("Export target '{path}' is not an existing directory")]
    TargetNotDirectory { path: PathBuf },

    /// The export target refused a write probe.
    #[error("Export target '{path}' is not writable: {detail}")]
    TargetNotWritable { path: PathBuf, detail: String },

    /// Not enough room on the target volume.
    #[error(
        "Insufficient space on '{path}': need {needed} bytes, {available} available"
    )]
    InsufficientSpace {
        path: PathBuf,
        needed: u64,
        available: u64,
    },

    /// Could not create or persist the output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The provider has no credentials configured.
    #[error("Provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider answered with an error.
    #[error("Provider '{provider}' error: {message}")]
    ProviderApi { provider: String, message: String },

    /// The provider rejected the credentials (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The provider call exceeded its timeout.
    #[error("Provider '{provider}' timed out after {secs}s")]
    ProviderTimeout { provider: String, secs: u64 },

    /// An image download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file could not be read or parsed.
    #[error("Cannot load configuration '{path}': {detail}")]
    ConfigLoad { path: PathBuf, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Previews need the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place the library next to the executable.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Control ───────────────────────────────────────────────────────────
    /// The batch was cancelled before this work started.
    #[error("Cancelled")]
    Cancelled,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoverError::FileNotFound { .. }
            | CoverError::ImageDecode { .. }
            | CoverError::OutputWriteFailed { .. } => ErrorKind::Io,
            CoverError::PermissionDenied { .. } | CoverError::TargetNotWritable { .. } => {
                ErrorKind::Permission
            }
            CoverError::NotAPdf { .. } | CoverError::CorruptSource { .. } => {
                ErrorKind::CorruptSource
            }
            CoverError::TargetNotDirectory { .. } => ErrorKind::Permission,
            CoverError::InsufficientSpace { .. } => ErrorKind::InsufficientSpace,
            CoverError::ProviderNotConfigured { .. }
            | CoverError::ProviderApi { .. }
            | CoverError::AuthError { .. }
            | CoverError::ProviderTimeout { .. }
            | CoverError::DownloadFailed { .. } => ErrorKind::Provider,
            CoverError::InvalidConfig(_)
            | CoverError::ConfigLoad { .. }
            | CoverError::PdfiumBindingFailed(_) => ErrorKind::Config,
            CoverError::Cancelled => ErrorKind::Cancelled,
            CoverError::RenderFailed { .. }
            | CoverError::RasterisationFailed { .. }
            | CoverError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// A non-fatal error for a single export job.
///
/// Target-related variants carry the target path so the batch summary can
/// say where the write was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum JobError {
    #[error("Source is unusable: {detail}")]
    CorruptSource { detail: String },

    #[error("Insufficient space on '{target}': need {needed} bytes, {available} available")]
    InsufficientSpace {
        target: PathBuf,
        needed: u64,
        available: u64,
    },

    #[error("Cannot write to '{target}': {detail}")]
    Permission { target: PathBuf, detail: String },

    #[error("I/O error on '{path}': {detail}")]
    Io { path: PathBuf, detail: String },

    #[error("Provider failed: {detail}")]
    Provider { detail: String },

    #[error("Configuration error: {detail}")]
    Config { detail: String },

    #[error("Cancelled before start")]
    Cancelled,

    #[error("Internal error: {detail}")]
    Internal { detail: String },
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::CorruptSource { .. } => ErrorKind::CorruptSource,
            JobError::InsufficientSpace { .. } => ErrorKind::InsufficientSpace,
            JobError::Permission { .. } => ErrorKind::Permission,
            JobError::Io { .. } => ErrorKind::Io,
            JobError::Provider { .. } => ErrorKind::Provider,
            JobError::Config { .. } => ErrorKind::Config,
            JobError::Cancelled => ErrorKind::Cancelled,
            JobError::Internal { .. } => ErrorKind::Internal,
        }
    }
}

impl From<CoverError> for JobError {
    fn from(err: CoverError) -> Self {
        match err {
            CoverError::InsufficientSpace {
                path,
                needed,
                available,
            } => JobError::InsufficientSpace {
                target: path,
                needed,
                available,
            },
            CoverError::TargetNotWritable { path, detail } => JobError::Permission {
                target: path,
                detail,
            },
            CoverError::TargetNotDirectory { path } => JobError::Permission {
                detail: "not an existing directory".into(),
                target: path,
            },
            CoverError::PermissionDenied { path } => JobError::Permission {
                target: path,
                detail: "permission denied".into(),
            },
            CoverError::OutputWriteFailed { path, source } => JobError::Io {
                path,
                detail: source.to_string(),
            },
            CoverError::FileNotFound { path } => JobError::Io {
                detail: "file not found".into(),
                path,
            },
            CoverError::Cancelled => JobError::Cancelled,
            other => {
                let detail = other.to_string();
                match other.kind() {
                    ErrorKind::CorruptSource => JobError::CorruptSource { detail },
                    ErrorKind::Provider => JobError::Provider { detail },
                    ErrorKind::Config => JobError::Config { detail },
                    _ => JobError::Internal { detail },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_space_display() {
        let e = CoverError::InsufficientSpace {
            path: "/media/kindle".into(),
            needed: 2048,
            available: 0,
        };
        let msg = e.to_string();
        assert!(msg.contains("/media/kindle"), "got: {msg}");
        assert!(msg.contains("2048"), "got: {msg}");
    }

    #[test]
    fn auth_error_display() {
        let e = CoverError::AuthError {
            provider: "openai".into(),
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn kinds_follow_error_families() {
        assert_eq!(
            CoverError::CorruptSource { detail: "x".into() }.kind(),
            ErrorKind::CorruptSource
        );
        assert_eq!(
            CoverError::ProviderTimeout {
                provider: "openai".into(),
                secs: 120
            }
            .kind(),
            ErrorKind::Provider
        );
        assert_eq!(CoverError::InvalidConfig("x".into()).kind(), ErrorKind::Config);
        assert_eq!(CoverError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn job_error_keeps_target_path() {
        let job: JobError = CoverError::InsufficientSpace {
            path: "/mnt/kobo".into(),
            needed: 10,
            available: 1,
        }
        .into();
        assert_eq!(job.kind(), ErrorKind::InsufficientSpace);
        match job {
            JobError::InsufficientSpace { target, .. } => assert_eq!(target, PathBuf::from("/mnt/kobo")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn job_error_kind_survives_conversion() {
        let job: JobError = CoverError::NotAPdf {
            path: "a.pdf".into(),
            magic: *b"GIF8",
        }
        .into();
        assert_eq!(job.kind(), ErrorKind::CorruptSource);

        let job: JobError = CoverError::TargetNotWritable {
            path: "/ro".into(),
            detail: "read-only file system".into(),
        }
        .into();
        assert_eq!(job.kind(), ErrorKind::Permission);
    }

    #[test]
    fn job_error_serialises() {
        let json = serde_json::to_string(&JobError::Cancelled).unwrap();
        assert!(json.contains("Cancelled"));
        let kind = serde_json::to_string(&ErrorKind::InsufficientSpace).unwrap();
        assert_eq!(kind, "\"insufficient_space\"");
    }
}
