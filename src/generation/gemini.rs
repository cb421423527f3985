//! Gemini image model integration.
//!
//! Implements the GenerationClient trait for Google's Gemini API. Both input
//! photos are sent as inline base64 parts alongside an instruction prompt; the
//! first inline image in the first candidate is the result.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GenerationClient, GenerationError};
use crate::core::{GenerationConfig, ImageData};

/// Gemini API provider.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    prompt: String,
}

impl GeminiClient {
    /// Create a client from configuration.
    ///
    /// The API key is read from the environment variable named by
    /// `api_key_env`.
    pub fn from_config(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} not set", config.api_key_env))?;

        if api_key.trim().is_empty() {
            anyhow::bail!("{} is empty", config.api_key_env);
        }

        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            prompt: config.prompt.clone(),
        })
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Create with a specific base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, subject: &ImageData, garment: &ImageData) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::inline(subject),
                    Part::inline(garment),
                    Part { text: Some(self.prompt.clone()), inline_data: None },
                ],
            }],
            generation_config: GenerationSettings {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(
        &self,
        subject: &ImageData,
        garment: &ImageData,
    ) -> Result<ImageData, GenerationError> {
        let request = self.build_request(subject, garment);

        tracing::debug!(
            model = %self.model,
            subject_len = subject.len(),
            garment_len = garment.len(),
            "Sending try-on request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::new(format!("API error ({}): {}", status, body)));
        }

        let response: GeminiResponse = response.json().await?;
        extract_image(response)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Pull the first inline image out of a response.
fn extract_image(response: GeminiResponse) -> Result<ImageData, GenerationError> {
    let inline = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.inline_data))
        .ok_or_else(|| GenerationError::new("No image in response"))?;

    let bytes = STANDARD
        .decode(inline.data.trim())
        .map_err(|e| GenerationError::new(format!("Invalid image data: {e}")))?;
    if bytes.is_empty() {
        return Err(GenerationError::new("Empty image in response"));
    }

    Ok(ImageData::new(bytes, inline.mime_type))
}

/// Gemini generateContent request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

/// A text or inline-data part.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn inline(image: &ImageData) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type().to_string(),
                data: image.to_base64(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    response_modalities: Vec<String>,
}

/// Gemini generateContent response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn test_client() -> GeminiClient {
        GeminiClient {
            client: Client::new(),
            api_key: "test-key".to_string(),
            base_url: "http://localhost:9".to_string(),
            model: "test-model".to_string(),
            prompt: "dress them".to_string(),
        }
    }

    #[test]
    #[serial]
    fn test_creation_fails_without_key() {
        std::env::remove_var("TRYON_TEST_MISSING_KEY");
        let config = GenerationConfig {
            api_key_env: "TRYON_TEST_MISSING_KEY".to_string(),
            ..Default::default()
        };
        let result = GeminiClient::from_config(&config);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_creation_reads_named_env_var() {
        std::env::set_var("TRYON_TEST_PRESENT_KEY", "abc123");
        let config = GenerationConfig {
            api_key_env: "TRYON_TEST_PRESENT_KEY".to_string(),
            base_url: "https://example.test/v1beta/".to_string(),
            ..Default::default()
        };
        let client = GeminiClient::from_config(&config).unwrap();
        std::env::remove_var("TRYON_TEST_PRESENT_KEY");

        assert_eq!(client.api_key, "abc123");
        assert!(client.endpoint().starts_with("https://example.test/v1beta/models/"));
        assert!(client.endpoint().ends_with(":generateContent"));
    }

    #[test]
    fn test_request_shape() {
        let client = test_client().with_model("other-model");
        let subject = ImageData::new(b"subject".to_vec(), "image/png");
        let garment = ImageData::new(b"garment".to_vec(), "image/jpeg");

        let json = serde_json::to_value(client.build_request(&subject, &garment)).unwrap();
        let parts = &json["contents"][0]["parts"];

        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], subject.to_base64());
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[2]["text"], "dress them");
        assert!(parts[2].get("inlineData").is_none());
        assert_eq!(json["generationConfig"]["responseModalities"][0], "IMAGE");
        assert!(client.endpoint().contains("other-model"));
    }

    #[test]
    fn test_extract_image_skips_text_parts() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {
                        "parts": [
                            {"text": "Here is the result"},
                            {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
                        ]
                    }
                }]
            }"#,
        )
        .unwrap();

        let image = extract_image(response).unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.bytes(), b"hello");
    }

    #[test]
    fn test_extract_image_text_only_is_failure() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "I cannot do that"}]}}]}"#,
        )
        .unwrap();

        let err = extract_image(response).unwrap_err();
        assert_eq!(err.reason(), "No image in response");
    }

    #[test]
    fn test_extract_image_rejects_bad_payload() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "@@@"}}]}}]}"#,
        )
        .unwrap();
        assert!(extract_image(response).unwrap_err().reason().starts_with("Invalid image data"));

        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": ""}}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_image(response).unwrap_err().reason(), "Empty image in response");
    }

    #[test]
    fn test_extract_image_no_candidates_is_failure() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_image(response).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_generation_error() {
        let client = test_client();
        let subject = ImageData::new(b"a".to_vec(), "image/png");
        let garment = ImageData::new(b"b".to_vec(), "image/png");

        assert!(client.generate(&subject, &garment).await.is_err());
    }
}
