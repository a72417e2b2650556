//! OpenAI Images generation.
//!
//! `dall-e-*` models are asked for `b64_json` so the picture arrives in the
//! response body; newer models always return base64 and reject the
//! `response_format` field. A `url` payload is still honoured and downloaded.

use super::{http, ImageGenerator, GENERATION_TIMEOUT_SECS};
use crate::config::GenerationOptions;
use crate::error::CoverError;
use crate::model::{CoverCandidate, CoverSource};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

const ENDPOINT: &str = "https://api.openai.com/v1/images/generations";
const NAME: &str = "OpenAI";

/// Image payload found in a generation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    Base64(String),
    Url(String),
}

pub struct OpenAiImageGenerator {
    client: Client,
    api_key: String,
}

impl OpenAiImageGenerator {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CoverError> {
        Ok(Self {
            client: http::client(GENERATION_TIMEOUT_SECS)?,
            api_key: api_key.into(),
        })
    }

    /// Build from credentials; a missing key is a configuration problem the
    /// caller must surface.
    pub fn from_credentials(credentials: &crate::config::Credentials) -> Result<Self, CoverError> {
        let key = credentials
            .openai_key()
            .ok_or_else(|| CoverError::ProviderNotConfigured {
                provider: NAME.into(),
                hint: "Add your key to the credentials file:\n  \"openai_api_key\": \"sk-...\"".into(),
            })?;
        Self::new(key)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<CoverCandidate, CoverError> {
        info!(
            "Generating cover (model={}, size={})",
            options.model, options.size
        );
        debug!("Prompt: {prompt}");

        let response = self
            .client
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request_body(prompt, options))
            .send()
            .await
            .map_err(|e| http::transport_error(NAME, GENERATION_TIMEOUT_SECS, e))?;
        let response = http::check_status(NAME, response).await?;
        let body: Value = response.json().await.map_err(|e| CoverError::ProviderApi {
            provider: NAME.into(),
            message: format!("malformed JSON: {e}"),
        })?;

        let bytes = match extract_image(&body)? {
            GeneratedImage::Base64(data) => STANDARD.decode(data.trim()).map_err(|e| {
                CoverError::ProviderApi {
                    provider: NAME.into(),
                    message: format!("invalid base64 image: {e}"),
                }
            })?,
            GeneratedImage::Url(url) => http::fetch_bytes(&self.client, &url).await?,
        };

        let candidate = CoverCandidate::from_bytes(
            bytes,
            CoverSource::Generated {
                model: options.model.clone(),
                prompt: prompt.to_string(),
            },
        )?;
        info!(
            "Cover generated ({}x{})",
            candidate.width(),
            candidate.height()
        );
        Ok(candidate)
    }
}

/// JSON body for `POST /v1/images/generations`.
pub fn request_body(prompt: &str, options: &GenerationOptions) -> Value {
    let mut body = json!({
        "model": options.model,
        "prompt": prompt,
        "n": 1,
        "size": options.size,
    });
    if options.model != "dall-e-2" {
        body["quality"] = json!(options.quality);
    }
    if options.model.starts_with("dall-e") {
        body["response_format"] = json!("b64_json");
    }
    body
}

/// `data[0].b64_json`, else `data[0].url`.
pub fn extract_image(body: &Value) -> Result<GeneratedImage, CoverError> {
    let first = body
        .get("data")
        .and_then(Value::as_array)
        .and_then(|items| items.first());
    let field = |key: &str| {
        first
            .and_then(|item| item.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    field("b64_json")
        .map(GeneratedImage::Base64)
        .or_else(|| field("url").map(GeneratedImage::Url))
        .ok_or_else(|| CoverError::ProviderApi {
            provider: NAME.into(),
            message: "unexpected response: no image in data[0]".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    fn options(model: &str) -> GenerationOptions {
        GenerationOptions {
            model: model.into(),
            ..GenerationOptions::default()
        }
    }

    #[test]
    fn dalle3_body_has_quality_and_b64() {
        let body = request_body("a cover", &options("dall-e-3"));
        assert_eq!(body["model"], "dall-e-3");
        assert_eq!(body["n"], 1);
        assert_eq!(body["size"], "1024x1792");
        assert_eq!(body["quality"], "standard");
        assert_eq!(body["response_format"], "b64_json");
    }

    #[test]
    fn dalle2_body_omits_quality() {
        let body = request_body("a cover", &options("dall-e-2"));
        assert!(body.get("quality").is_none());
        assert_eq!(body["response_format"], "b64_json");
    }

    #[test]
    fn other_models_omit_response_format() {
        let body = request_body("a cover", &options("gpt-image-1"));
        assert!(body.get("response_format").is_none());
        assert_eq!(body["quality"], "standard");
    }

    #[test]
    fn extracts_base64_before_url() {
        let body = json!({"data": [{"b64_json": "aGVsbG8=", "url": "https://x"}]});
        assert_eq!(extract_image(&body).unwrap(), GeneratedImage::Base64("aGVsbG8=".into()));

        let body = json!({"data": [{"url": "https://x/img.png"}]});
        assert_eq!(extract_image(&body).unwrap(), GeneratedImage::Url("https://x/img.png".into()));
    }

    #[test]
    fn empty_data_is_an_error() {
        let err = extract_image(&json!({"data": []})).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Provider);
    }

    #[test]
    fn missing_key_is_not_configured() {
        match OpenAiImageGenerator::from_credentials(&Credentials::default()) {
            Err(CoverError::ProviderNotConfigured { provider, .. }) => assert_eq!(provider, "OpenAI"),
            Err(other) => panic!("unexpected: {other:?}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
