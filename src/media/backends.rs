//! Capability traits for the generative collaborators. Everything the
//! pipelines call out to lives behind one of these seams, so tests can run
//! against in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use super::ModelTier;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("backend request failed: {0}")]
    Request(String),

    #[error("backend returned no usable payload")]
    EmptyResponse,

    #[error("payload failed validation: {0}")]
    InvalidPayload(String),
}

/// Text generation: given a prompt and optional system instruction, return
/// text. May fail nondeterministically; output is never assumed well-formed.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, GenerateError>;
}

/// Image generation at a specific model tier. Returns raw bytes of
/// unspecified-but-image-like content; validation is the caller's job.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, tier: ModelTier) -> Result<Bytes, GenerateError>;
}

/// Narration synthesis for lecture audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes, GenerateError>;
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Push-notification delivery. Strictly best-effort: pipelines log failures
/// and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, token: &str, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Bounded retry applied uniformly to every tier in the generation chain.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 2 }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }
}
