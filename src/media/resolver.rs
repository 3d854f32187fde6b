//! Asset resolution orchestrator: cache lookup, prompt enhancement, the
//! model fallback chain with uniform per-tier retries, payload validation,
//! upload, and placeholder degradation when everything else fails.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::storage::BlobStore;

use super::backends::{GenerateError, ImageGenerator, RetryPolicy};
use super::cache::AssetCache;
use super::consistency::ConsistencyRegistry;
use super::placeholder;
use super::prompt::{AspectRatio, PromptEnhancer, ReadingLevel};
use super::{GeneratedAsset, ModelTier, TIER_CHAIN};

/// One image to resolve.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub level: ReadingLevel,
    pub style_hint: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
    /// Story/character pairing for consistency lookups.
    pub story_id: Option<String>,
    pub character_name: Option<String>,
    pub use_cache: bool,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, level: ReadingLevel) -> Self {
        Self {
            prompt: prompt.into(),
            level,
            style_hint: None,
            aspect_ratio: None,
            story_id: None,
            character_name: None,
            use_cache: true,
        }
    }

    pub fn with_style(mut self, style_hint: Option<String>) -> Self {
        self.style_hint = style_hint;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: Option<AspectRatio>) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_consistency(mut self, story_id: Option<String>, character_name: Option<String>) -> Self {
        self.story_id = story_id;
        self.character_name = character_name;
        self
    }
}

pub struct ImageResolver {
    generator: Arc<dyn ImageGenerator>,
    store: Arc<dyn BlobStore>,
    cache: AssetCache,
    consistency: Arc<ConsistencyRegistry>,
    enhancer: PromptEnhancer,
    policy: RetryPolicy,
    min_image_bytes: usize,
    placeholder_size: u32,
    pool: Arc<Semaphore>,
}

impl ImageResolver {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        store: Arc<dyn BlobStore>,
        consistency: Arc<ConsistencyRegistry>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            generator,
            store,
            cache: AssetCache::new(
                config.cache.enabled,
                Duration::from_secs(config.cache.ttl_seconds),
            ),
            consistency,
            enhancer: PromptEnhancer::new(),
            policy: RetryPolicy::new(config.media.retries_per_tier),
            min_image_bytes: config.media.min_image_bytes,
            placeholder_size: config.media.placeholder_size,
            pool: Arc::new(Semaphore::new(config.media.image_pool_size.max(1))),
        }
    }

    pub fn consistency(&self) -> &ConsistencyRegistry {
        &self.consistency
    }

    /// Resolve one request to an uploaded asset. The fallback chain ends in
    /// a locally rendered placeholder; an error escapes only when even the
    /// placeholder could not be stored (the caller renders an error block).
    pub async fn resolve(&self, request: &ImageRequest) -> Result<GeneratedAsset, GenerateError> {
        let cache_key = AssetCache::key(
            &request.prompt,
            request.level.as_str(),
            request.style_hint.as_deref(),
            request.aspect_ratio.map(|a| a.as_str()),
        );

        if request.use_cache {
            if let Some((url, tier)) = self.cache.get(&cache_key) {
                info!(prompt = %truncate(&request.prompt), "using cached image");
                return Ok(GeneratedAsset { url, cache_key, tier });
            }
        }

        let directive = request.story_id.as_deref().and_then(|story| {
            request
                .character_name
                .as_deref()
                .and_then(|name| self.consistency.character_directive(story, name))
        });
        let enhanced = self.enhancer.enhance(
            &request.prompt,
            request.level,
            request.style_hint.as_deref(),
            request.aspect_ratio,
            directive.as_deref(),
        );

        for tier in TIER_CHAIN {
            for attempt in 1..=self.policy.attempts {
                match self.attempt(&enhanced, tier).await {
                    Ok(url) => {
                        if request.use_cache {
                            self.cache.insert(&cache_key, &url, tier);
                        }
                        info!(tier = tier.label(), attempt, "image generated");
                        return Ok(GeneratedAsset { url, cache_key, tier });
                    }
                    Err(e) => {
                        warn!(
                            tier = tier.label(),
                            attempt,
                            error = %e,
                            "image generation attempt failed"
                        );
                    }
                }
            }
        }

        warn!(
            prompt = %truncate(&request.prompt),
            "all generation tiers exhausted, falling back to placeholder"
        );
        self.upload_placeholder(&request.prompt, &cache_key).await
    }

    /// Resolve a batch on the bounded pool. Results come back in request
    /// order; one failed slot does not cancel or fail its siblings.
    pub async fn resolve_batch(
        &self,
        requests: &[ImageRequest],
    ) -> Vec<Result<GeneratedAsset, GenerateError>> {
        let tasks = requests.iter().map(|request| {
            let pool = Arc::clone(&self.pool);
            async move {
                // The semaphore is never closed while the resolver lives.
                let _permit = pool.acquire().await.map_err(|_| {
                    GenerateError::Request("image pool unavailable".to_string())
                })?;
                self.resolve(request).await
            }
        });
        join_all(tasks).await
    }

    /// One generation attempt at one tier: call the backend, validate the
    /// payload, flatten and re-encode, upload. A storage failure is a
    /// failure of the attempt, exactly like a generation failure.
    async fn attempt(&self, enhanced_prompt: &str, tier: ModelTier) -> Result<String, GenerateError> {
        let payload = self.generator.generate(enhanced_prompt, tier).await?;
        let normalized = self.validate_and_flatten(&payload)?;

        let object_key = format!("images/img_{}.png", uuid::Uuid::new_v4().simple());
        self.store
            .put(&object_key, Bytes::from(normalized), "image/png")
            .await
            .map_err(|e| GenerateError::Request(format!("upload failed: {e}")))
    }

    /// Reject truncated or non-image payloads; flatten any alpha channel
    /// onto a white background and re-encode as PNG.
    fn validate_and_flatten(&self, payload: &[u8]) -> Result<Vec<u8>, GenerateError> {
        if payload.len() < self.min_image_bytes {
            return Err(GenerateError::InvalidPayload(format!(
                "payload too small to be a valid image ({} bytes)",
                payload.len()
            )));
        }
        let decoded = image::load_from_memory(payload)
            .map_err(|e| GenerateError::InvalidPayload(format!("not a decodable image: {e}")))?;

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut flattened = RgbImage::new(width, height);
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let alpha = pixel[3] as u32;
            let blend = |channel: u8| ((channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
            flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
        }

        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(flattened)
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| GenerateError::InvalidPayload(format!("re-encoding failed: {e}")))?;
        debug!(bytes = buffer.get_ref().len(), "image payload normalized");
        Ok(buffer.into_inner())
    }

    async fn upload_placeholder(
        &self,
        prompt: &str,
        cache_key: &str,
    ) -> Result<GeneratedAsset, GenerateError> {
        let bytes = placeholder::render(prompt, self.placeholder_size)?;
        let object_key = format!("images/placeholder_{}.png", uuid::Uuid::new_v4().simple());
        let url = self
            .store
            .put(&object_key, Bytes::from(bytes), "image/png")
            .await
            .map_err(|e| GenerateError::Request(format!("placeholder upload failed: {e}")))?;
        // Placeholders are never cached: they are not reusable quality.
        Ok(GeneratedAsset {
            url,
            cache_key: cache_key.to_string(),
            tier: ModelTier::Placeholder,
        })
    }
}

fn truncate(prompt: &str) -> String {
    prompt.chars().take(50).collect()
}
