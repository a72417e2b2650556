use super::{http, CoverHit, SearchProvider, SEARCH_TIMEOUT_SECS};
use crate::error::CoverError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

const ENDPOINT: &str = "https://www.googleapis.com/books/v1/volumes";
const NAME: &str = "Google Books";
/// The volumes endpoint rejects larger pages.
const MAX_PAGE: usize = 40;

/// Google Books volume search.
pub struct GoogleBooksProvider {
    client: Client,
    api_key: String,
}

impl GoogleBooksProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CoverError> {
        Ok(Self {
            client: http::client(SEARCH_TIMEOUT_SECS)?,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SearchProvider for GoogleBooksProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, title: &str, limit: usize) -> Result<Vec<CoverHit>, CoverError> {
        let query = [
            ("q", title.to_string()),
            ("maxResults", limit.clamp(1, MAX_PAGE).to_string()),
            ("printType", "books".to_string()),
            ("key", self.api_key.clone()),
        ];
        let body = http::get_json(&self.client, NAME, SEARCH_TIMEOUT_SECS, ENDPOINT, &query).await?;
        let mut hits = parse_volumes(&body);
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Hits from a `volumes` response. Volumes without a thumbnail are skipped.
pub fn parse_volumes(body: &Value) -> Vec<CoverHit> {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let info = item.get("volumeInfo")?;
            let links = info.get("imageLinks");
            let link = |key: &str| {
                links
                    .and_then(|l| l.get(key))
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            };
            let thumbnail = link("thumbnail")?;
            let full = link("large").or_else(|| link("medium")).unwrap_or(thumbnail);

            Some(CoverHit {
                title: info
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
                author: join_names(info.get("authors")),
                thumbnail_url: upgrade_https(thumbnail),
                full_url: upgrade_https(full),
                source: NAME.to_string(),
            })
        })
        .collect()
}

pub(crate) fn join_names(value: Option<&Value>) -> String {
    let names: Vec<&str> = value
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if names.is_empty() {
        "Unknown".to_string()
    } else {
        names.join(", ")
    }
}

fn upgrade_https(url: &str) -> String {
    url.replacen("http://", "https://", 1)
}
