//! Shared HTTP plumbing for providers: client construction, error mapping
//! and image downloads.

use crate::error::CoverError;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("pdfcover/", env!("CARGO_PKG_VERSION"));

/// A client whose every request is bounded by `timeout_secs`.
pub fn client(timeout_secs: u64) -> Result<Client, CoverError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CoverError::Internal(format!("Cannot build HTTP client: {e}")))
}

/// Map a transport error to a provider error.
pub fn transport_error(provider: &str, timeout_secs: u64, e: reqwest::Error) -> CoverError {
    if e.is_timeout() {
        CoverError::ProviderTimeout {
            provider: provider.to_string(),
            secs: timeout_secs,
        }
    } else {
        CoverError::ProviderApi {
            provider: provider.to_string(),
            message: e.to_string(),
        }
    }
}

/// Turn a non-success response into an error, surfacing `error.message`
/// from a JSON body when present.
pub async fn check_status(provider: &str, response: Response) -> Result<Response, CoverError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CoverError::AuthError {
            provider: provider.to_string(),
            detail: message,
        },
        _ => CoverError::ProviderApi {
            provider: provider.to_string(),
            message,
        },
    })
}

/// `error.message` (OpenAI, Google) or a string `error` field.
pub fn error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    match json.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("message")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// GET a JSON document.
pub async fn get_json(
    client: &Client,
    provider: &str,
    timeout_secs: u64,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, CoverError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| transport_error(provider, timeout_secs, e))?;
    let response = check_status(provider, response).await?;
    response
        .json::<Value>()
        .await
        .map_err(|e| CoverError::ProviderApi {
            provider: provider.to_string(),
            message: format!("malformed JSON: {e}"),
        })
}

/// Download raw bytes (cover images, thumbnails).
pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, CoverError> {
    let download_err = |reason: String| CoverError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_err(e.to_string()))?;
    if !response.status().is_success() {
        return Err(download_err(format!("HTTP {}", response.status())));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_err(e.to_string()))?;
    debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_nested_error_message() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("Incorrect API key provided"));
    }

    #[test]
    fn extracts_flat_error_message() {
        assert_eq!(error_message(r#"{"error": "quota"}"#).as_deref(), Some("quota"));
    }

    #[test]
    fn ignores_non_json_bodies() {
        assert_eq!(error_message("<html>502</html>"), None);
        assert_eq!(error_message(r#"{"ok": true}"#), None);
    }

    #[test]
    fn client_builds() {
        assert!(client(15).is_ok());
    }
}
