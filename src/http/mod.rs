//! HTTP-backed implementations of the capability traits: a chat-style text
//! endpoint, an image endpoint returning base64 inline payloads, a speech
//! endpoint, and a storage gateway that answers uploads with signed fetch
//! URLs.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::media::backends::{GenerateError, ImageGenerator, SpeechSynthesizer, TextGenerator};
use crate::media::ModelTier;
use crate::storage::{BlobStore, StorageError};

#[derive(Serialize, Debug)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize, Debug)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: String,
}

#[derive(Serialize, Debug)]
struct ImageRequestBody {
    model: String,
    prompt: String,
}

#[derive(Deserialize, Debug)]
struct ImageResponseBody {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize, Debug)]
struct ImageDatum {
    b64_json: String,
}

#[derive(Serialize, Debug)]
struct SpeechRequestBody {
    input: String,
    voice: String,
}

#[derive(Deserialize, Debug)]
struct SpeechResponseBody {
    audio_b64: String,
}

#[derive(Deserialize, Debug)]
struct UploadResponse {
    url: String,
}

/// Client for the generation API. One instance serves text, image and
/// speech requests; tiers map to the configured model names.
pub struct ApiClient {
    client: Client,
    config: GenerationConfig,
}

impl ApiClient {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| GenerateError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary => &self.config.primary_image_model,
            ModelTier::Fallback => &self.config.fallback_image_model,
            ModelTier::Legacy | ModelTier::Placeholder => &self.config.legacy_image_model,
        }
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, GenerateError> {
        let response = self
            .client
            .post(format!("{}/{}", self.config.api_url.trim_end_matches('/'), path))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Request("request timeout - the API took too long to respond".into())
                } else if e.is_connect() {
                    GenerateError::Request("connection error - unable to reach the API".into())
                } else {
                    GenerateError::Request(format!("network error: {e}"))
                }
            })?;
        map_status(response).await
    }
}

async fn map_status(response: Response) -> Result<Response, GenerateError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    Err(GenerateError::Request(match status {
        StatusCode::UNAUTHORIZED => "authentication failed - check your API key".to_string(),
        StatusCode::FORBIDDEN => "access forbidden - insufficient permissions".to_string(),
        StatusCode::TOO_MANY_REQUESTS => "rate limit exceeded - too many requests".to_string(),
        s if s.is_server_error() => format!("server error ({status}): {error_text}"),
        _ => format!("HTTP error {status}: {error_text}"),
    }))
}

#[async_trait]
impl TextGenerator for ApiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, GenerateError> {
        let mut messages = Vec::new();
        if let Some(system) = system_instruction {
            messages.push(Message {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let body = ChatRequest {
            model: self.config.text_model.clone(),
            messages,
            max_tokens: None,
            temperature: Some(0.7),
        };
        let response: ChatResponse = self
            .post_json("chat/completions", &body)
            .await?
            .json()
            .await
            .map_err(|e| GenerateError::Request(format!("failed to parse API response: {e}")))?;

        let content = response
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(GenerateError::EmptyResponse);
        }
        debug!(chars = content.len(), "text generation succeeded");
        Ok(content)
    }
}

#[async_trait]
impl ImageGenerator for ApiClient {
    async fn generate(&self, prompt: &str, tier: ModelTier) -> Result<Bytes, GenerateError> {
        let body = ImageRequestBody {
            model: self.model_for(tier).to_string(),
            prompt: prompt.to_string(),
        };
        let response: ImageResponseBody = self
            .post_json("images/generations", &body)
            .await?
            .json()
            .await
            .map_err(|e| GenerateError::Request(format!("failed to parse API response: {e}")))?;

        let datum = response.data.into_iter().next().ok_or(GenerateError::EmptyResponse)?;
        let bytes = BASE64
            .decode(datum.b64_json.as_bytes())
            .map_err(|e| GenerateError::InvalidPayload(format!("invalid base64 payload: {e}")))?;
        Ok(Bytes::from(bytes))
    }
}

#[async_trait]
impl SpeechSynthesizer for ApiClient {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes, GenerateError> {
        let body = SpeechRequestBody {
            input: text.to_string(),
            voice: voice.to_string(),
        };
        let response: SpeechResponseBody = self
            .post_json("audio/speech", &body)
            .await?
            .json()
            .await
            .map_err(|e| GenerateError::Request(format!("failed to parse API response: {e}")))?;

        let bytes = BASE64
            .decode(response.audio_b64.as_bytes())
            .map_err(|e| GenerateError::InvalidPayload(format!("invalid base64 payload: {e}")))?;
        if bytes.is_empty() {
            return Err(GenerateError::EmptyResponse);
        }
        Ok(Bytes::from(bytes))
    }
}

/// Storage gateway client: PUT the object, receive a signed fetch URL.
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpBlobStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StorageError::Upload(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError> {
        let response = self
            .client
            .put(format!("{}/objects/{key}", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Upload(format!("upload request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(StorageError::Upload(format!(
                "storage gateway returned HTTP {}",
                response.status()
            )));
        }
        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Upload(format!("invalid gateway response: {e}")))?;

        // Signed URLs must at least be well-formed before we hand them on.
        url::Url::parse(&upload.url).map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        Ok(upload.url)
    }
}
