//! Input resolution: validate user-supplied PDF and image paths.
//!
//! Both helpers fail fast with a typed error (missing file, permission,
//! wrong magic bytes) so callers never hand garbage to the assembler.

use crate::error::CoverError;
use crate::model::{CoverCandidate, CoverSource, SourceDocument};
use crate::pipeline::assemble;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Open a PDF, check it parses and has pages, and record its size.
pub fn open_source(path: impl AsRef<Path>) -> Result<SourceDocument, CoverError> {
    let path = path.as_ref().to_path_buf();
    check_pdf_magic(&path)?;

    let bytes = read_bytes(&path)?;
    let doc = assemble::parse_source(&bytes).map_err(|e| match e {
        CoverError::CorruptSource { detail } => CoverError::CorruptSource {
            detail: format!("'{}': {detail}", path.display()),
        },
        other => other,
    })?;
    let page_count = doc.get_pages().len();

    debug!(
        "Opened source {} ({} pages, {} bytes)",
        path.display(),
        page_count,
        bytes.len()
    );
    Ok(SourceDocument::new(path, page_count, bytes.len() as u64))
}

/// Load a local image file as an uploaded cover candidate.
pub fn load_cover_image(path: impl AsRef<Path>) -> Result<CoverCandidate, CoverError> {
    let path = path.as_ref().to_path_buf();
    let bytes = read_bytes(&path)?;
    CoverCandidate::from_bytes(bytes, CoverSource::Upload { path })
}

/// Read a whole file, mapping errors the way the rest of the input stage does.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, CoverError> {
    std::fs::read(path).map_err(|e| io_error(path, e))
}

/// Validate existence, read permission and a `%PDF-` header near the start.
fn check_pdf_magic(path: &Path) -> Result<(), CoverError> {
    let file = std::fs::File::open(path).map_err(|e| io_error(path, e))?;
    let mut head = Vec::with_capacity(1100);
    file.take(1100)
        .read_to_end(&mut head)
        .map_err(|e| io_error(path, e))?;
    if assemble::header_offset(&head).is_none() {
        let mut magic = [0u8; 4];
        let n = head.len().min(4);
        magic[..n].copy_from_slice(&head[..n]);
        return Err(CoverError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> CoverError {
    let path: PathBuf = path.to_path_buf();
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => CoverError::PermissionDenied { path },
        std::io::ErrorKind::NotFound => CoverError::FileNotFound { path },
        _ => CoverError::Internal(format!("Cannot read '{}': {e}", path.display())),
    }
}
