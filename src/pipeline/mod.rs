//! High-level coordinator: owns the injected collaborators, the image
//! resolver and the registries, and drives the document and structured
//! pipelines.

pub mod document;
pub mod structured;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use anyhow::Context;
use tracing::warn;

use crate::blocks::scanner::Scanner;
use crate::blocks::tokenizer::Tokenizer;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::media::backends::{
    ImageGenerator, Notifier, SpeechSynthesizer, TextGenerator,
};
use crate::media::consistency::ConsistencyRegistry;
use crate::media::prompt::{AspectRatio, ReadingLevel};
use crate::media::resolver::{ImageRequest, ImageResolver};
use crate::media::safety;
use crate::media::GeneratedAsset;
use crate::storage::BlobStore;

pub use document::{Document, DocumentRequest, ProfileContext};
pub use structured::{ComicResult, DialogueRequest, LectureResult, SectionAsset};

pub struct ContentEngine {
    text: Arc<dyn TextGenerator>,
    store: Arc<dyn BlobStore>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    notifier: Option<Arc<dyn Notifier>>,
    resolver: ImageResolver,
    scanner: Scanner,
    tokenizer: Tokenizer,
    config: EngineConfig,
}

impl ContentEngine {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        images: Arc<dyn ImageGenerator>,
        store: Arc<dyn BlobStore>,
        config: EngineConfig,
    ) -> Self {
        let consistency = Arc::new(ConsistencyRegistry::new());
        let resolver = ImageResolver::new(images, Arc::clone(&store), consistency, &config);
        Self {
            text,
            store,
            speech: None,
            notifier: None,
            resolver,
            scanner: Scanner::new(),
            tokenizer: Tokenizer::new(),
            config,
        }
    }

    /// Build a live engine from environment configuration: one API client
    /// serving text, image and speech generation, plus the storage gateway.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = EngineConfig::from_env();
        let api = Arc::new(
            crate::http::ApiClient::new(config.generation.clone())
                .context("creating generation API client")?,
        );
        let store = Arc::new(
            crate::http::HttpBlobStore::new(
                config.storage.gateway_url.clone(),
                config.generation.api_key.clone(),
            )
            .context("creating storage gateway client")?,
        );
        Ok(Self::new(api.clone(), api.clone(), store, config).with_speech(api))
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Character/style registries, exposed so callers can seed consistency
    /// references before generating.
    pub fn consistency(&self) -> &ConsistencyRegistry {
        self.resolver.consistency()
    }

    pub(crate) fn resolver(&self) -> &ImageResolver {
        &self.resolver
    }

    pub(crate) fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub(crate) fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub(crate) fn text_backend(&self) -> &dyn TextGenerator {
        self.text.as_ref()
    }

    pub(crate) fn blob_store(&self) -> &dyn BlobStore {
        self.store.as_ref()
    }

    pub(crate) fn speech_backend(&self) -> Option<&dyn SpeechSynthesizer> {
        self.speech.as_deref()
    }

    /// Resolve a single explicitly requested image (outside any document),
    /// with the safety filter applied first.
    pub async fn generate_image(
        &self,
        prompt: &str,
        level: ReadingLevel,
        style_hint: Option<String>,
        aspect_ratio: Option<AspectRatio>,
        story_id: Option<String>,
        character_name: Option<String>,
    ) -> Result<GeneratedAsset, EngineError> {
        if !safety::is_safe_prompt(prompt, level) {
            return Err(EngineError::UnsafePrompt(prompt.to_string()));
        }
        let request = ImageRequest::new(prompt, level)
            .with_style(style_hint)
            .with_aspect_ratio(aspect_ratio)
            .with_consistency(story_id, character_name);
        self.resolver.resolve(&request).await.map_err(EngineError::Backend)
    }

    /// Best-effort completion notification; failures are logged and
    /// swallowed.
    pub(crate) async fn notify(&self, token: Option<&str>, title: &str, body: &str) {
        let (Some(notifier), Some(token)) = (&self.notifier, token) else {
            return;
        };
        if let Err(e) = notifier.notify(token, title, body).await {
            warn!(error = %e, "completion notification failed");
        }
    }
}
