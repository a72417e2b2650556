//! External cover providers: book-metadata search and image generation.
//!
//! ```text
//! title ──▶ GoogleBooksProvider ──┐
//!       └─▶ OpenLibraryProvider ──┴─▶ search_covers ──▶ CoverHit … ──fetch──▶ CoverCandidate
//! prompt ──▶ OpenAiImageGenerator ─────────────────────────────────────────▶ CoverCandidate
//! ```
//!
//! Search is forgiving: a failing provider contributes a warning and no hits.
//! Generation is not: every failure is returned to the caller. No call is
//! retried automatically.

pub mod google_books;
pub mod http;
pub mod open_library;
pub mod openai_images;
pub mod query;
pub mod thumbnails;

use crate::config::{Credentials, GenerationOptions};
use crate::error::CoverError;
use crate::model::{CoverCandidate, CoverSource};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

pub use google_books::GoogleBooksProvider;
pub use open_library::OpenLibraryProvider;
pub use openai_images::OpenAiImageGenerator;
pub use thumbnails::{Thumbnail, ThumbnailPool};

/// Per-request timeout for search and image downloads.
pub const SEARCH_TIMEOUT_SECS: u64 = 15;

/// Per-request timeout for image generation.
pub const GENERATION_TIMEOUT_SECS: u64 = 120;

// ── Search ───────────────────────────────────────────────────────────────

/// One search result: metadata plus the URLs to fetch the cover lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverHit {
    pub title: String,
    pub author: String,
    pub thumbnail_url: String,
    pub full_url: String,
    /// Provider display name.
    pub source: String,
}

impl CoverHit {
    /// Download the full-size image and turn it into a candidate.
    pub async fn fetch(&self, client: &reqwest::Client) -> Result<CoverCandidate, CoverError> {
        let bytes = http::fetch_bytes(client, &self.full_url).await?;
        CoverCandidate::from_bytes(
            bytes,
            CoverSource::Search {
                provider: self.source.clone(),
                title: self.title.clone(),
                url: self.full_url.clone(),
            },
        )
    }

    fn dedup_key(&self) -> String {
        self.title.trim().to_lowercase()
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` hits for `title`, in the provider's relevance order.
    async fn search(&self, title: &str, limit: usize) -> Result<Vec<CoverHit>, CoverError>;
}

/// Merged search result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    pub hits: Vec<CoverHit>,
    /// One line per provider that failed.
    pub warnings: Vec<String>,
}

/// Query every provider in order, merge, drop repeated titles and truncate.
///
/// Hits keep provider order, then each provider's own order.
pub async fn search_covers(
    providers: &[Box<dyn SearchProvider>],
    title: &str,
    limit: usize,
) -> SearchOutcome {
    let mut outcome = SearchOutcome::default();
    let title = title.trim();
    if title.is_empty() {
        outcome.warnings.push("Empty search query".into());
        return outcome;
    }

    let mut seen = HashSet::new();
    for provider in providers {
        match provider.search(title, limit).await {
            Ok(hits) => {
                info!("{} returned {} hit(s) for '{}'", provider.name(), hits.len(), title);
                outcome
                    .hits
                    .extend(hits.into_iter().filter(|hit| seen.insert(hit.dedup_key())));
            }
            Err(e) => {
                warn!("{} search failed: {e}", provider.name());
                outcome.warnings.push(format!("{}: {e}", provider.name()));
            }
        }
    }
    outcome.hits.truncate(limit);
    outcome
}

/// Search providers enabled by `credentials`: Google Books when a key is
/// present, then Open Library.
pub fn search_providers(credentials: &Credentials) -> Result<Vec<Box<dyn SearchProvider>>, CoverError> {
    let mut providers: Vec<Box<dyn SearchProvider>> = Vec::new();
    match credentials.google_books_key() {
        Some(key) => providers.push(Box::new(GoogleBooksProvider::new(key)?)),
        None => info!("Google Books skipped: no API key configured"),
    }
    providers.push(Box::new(OpenLibraryProvider::new()?));
    Ok(providers)
}

// ── Generation ───────────────────────────────────────────────────────────

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<CoverCandidate, CoverError>;
}
