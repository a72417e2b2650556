//! Search-query derivation from PDF file names.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\(\[][^)\]]*[\)\]]").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Turn `The_Rust-Book (2nd Edition) [v2].pdf` into `The Rust Book`.
///
/// Strips the directory and extension, maps `_`/`-` to spaces, removes
/// bracketed noise and collapses whitespace.
pub fn sanitise_query(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let spaced = stem.replace(['_', '-'], " ");
    let stripped = BRACKETED.replace_all(&spaced, "");
    let query = SPACES.replace_all(&stripped, " ").trim().to_string();
    debug!("Sanitised query: '{file_name}' → '{query}'");
    query
}

/// Whether `input` names a PDF file rather than a free-text title.
pub fn looks_like_pdf(input: &str) -> bool {
    Path::new(input)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
