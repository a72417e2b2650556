use super::google_books::join_names;
use super::{http, CoverHit, SearchProvider, SEARCH_TIMEOUT_SECS};
use crate::error::CoverError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

const ENDPOINT: &str = "https://openlibrary.org/search.json";
const COVER_URL: &str = "https://covers.openlibrary.org/b/olid";
const NAME: &str = "Open Library";

/// Open Library title search. Needs no credentials.
pub struct OpenLibraryProvider {
    client: Client,
}

impl OpenLibraryProvider {
    pub fn new() -> Result<Self, CoverError> {
        Ok(Self {
            client: http::client(SEARCH_TIMEOUT_SECS)?,
        })
    }
}

#[async_trait]
impl SearchProvider for OpenLibraryProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, title: &str, limit: usize) -> Result<Vec<CoverHit>, CoverError> {
        let query = [
            ("title", title.to_string()),
            ("limit", limit.max(1).to_string()),
            ("fields", "title,author_name,cover_edition_key,edition_key".to_string()),
        ];
        let body = http::get_json(&self.client, NAME, SEARCH_TIMEOUT_SECS, ENDPOINT, &query).await?;
        let mut hits = parse_docs(&body);
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Hits from a `search.json` response. Docs without an edition id are skipped.
pub fn parse_docs(body: &Value) -> Vec<CoverHit> {
    let Some(docs) = body.get("docs").and_then(Value::as_array) else {
        return Vec::new();
    };

    docs.iter()
        .filter_map(|doc| {
            let olid = doc
                .get("cover_edition_key")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    doc.get("edition_key")
                        .and_then(Value::as_array)
                        .and_then(|keys| keys.first())
                        .and_then(Value::as_str)
                })?;
            let url = cover_url(olid);
            Some(CoverHit {
                title: doc
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
                author: join_names(doc.get("author_name")),
                thumbnail_url: url.clone(),
                full_url: url,
                source: NAME.to_string(),
            })
        })
        .collect()
}

pub fn cover_url(olid: &str) -> String {
    format!("{COVER_URL}/{olid}-L.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_cover_edition_key() {
        let body = json!({"docs": [
            {"title": "The Hobbit", "author_name": ["J.R.R. Tolkien"],
             "cover_edition_key": "OL1M", "edition_key": ["OL9M"]},
            {"title": "Hobbit Notes", "edition_key": ["OL2M", "OL3M"]},
            {"title": "Nothing"}
        ]});
        let hits = parse_docs(&body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].full_url, "https://covers.openlibrary.org/b/olid/OL1M-L.jpg");
        assert_eq!(hits[0].thumbnail_url, hits[0].full_url);
        assert_eq!(hits[0].author, "J.R.R. Tolkien");
        assert_eq!(hits[1].full_url, "https://covers.openlibrary.org/b/olid/OL2M-L.jpg");
        assert_eq!(hits[1].author, "Unknown");
    }

    #[test]
    fn malformed_body_is_empty() {
        assert!(parse_docs(&json!({"docs": "nope"})).is_empty());
        assert!(parse_docs(&json!([])).is_empty());
    }
}
