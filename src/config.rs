//! Engine configuration: defaults, env loading.

use serde::{Deserialize, Serialize};

/// Top-level configuration for a [`crate::ContentEngine`].
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EngineConfig {
    pub generation: GenerationConfig,
    pub media: MediaConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GenerationConfig {
    pub api_url: String,
    pub api_key: String,
    /// Model name attempted first for image generation.
    pub primary_image_model: String,
    /// Fast fallback tried when the primary model fails validation.
    pub fallback_image_model: String,
    /// Last-resort legacy model.
    pub legacy_image_model: String,
    pub text_model: String,
    pub request_timeout_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MediaConfig {
    /// Retry attempts per model tier before advancing down the chain.
    pub retries_per_tier: u32,
    /// Payloads smaller than this are rejected as truncated.
    pub min_image_bytes: usize,
    /// Width of the pool used for batch image generation.
    pub image_pool_size: usize,
    pub placeholder_size: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StorageConfig {
    /// Storage gateway answering uploads with signed fetch URLs.
    pub gateway_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/v1".to_string(),
            api_key: String::new(),
            primary_image_model: "pictor-pro".to_string(),
            fallback_image_model: "pictor-flash".to_string(),
            legacy_image_model: "pictor-legacy".to_string(),
            text_model: "scribe-1".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            retries_per_tier: 2,
            min_image_bytes: 1000,
            image_pool_size: 5,
            placeholder_size: 512,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8080/storage".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            media: MediaConfig::default(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment, falling back to defaults for
    /// anything unset. `.env` files are honored via `dotenv`.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Ok(url) = std::env::var("API_URL") {
            config.generation.api_url = url;
        }
        if let Ok(key) = std::env::var("API_KEY") {
            config.generation.api_key = key;
        }
        if let Ok(model) = std::env::var("TEXT_MODEL") {
            config.generation.text_model = model;
        }
        if let Ok(ttl) = std::env::var("IMAGE_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse() {
                config.cache.ttl_seconds = ttl;
            }
        }
        if let Ok(pool) = std::env::var("IMAGE_POOL_SIZE") {
            if let Ok(pool) = pool.parse() {
                config.media.image_pool_size = pool;
            }
        }
        if let Ok(url) = std::env::var("STORAGE_URL") {
            config.storage.gateway_url = url;
        }
        config
    }

    /// Check that the variables required for live generation are present.
    pub fn validate_environment() -> Result<(), String> {
        let required_vars = ["API_URL", "API_KEY"];
        let missing: Vec<_> = required_vars
            .iter()
            .filter(|var| std::env::var(var).is_err())
            .copied()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            ))
        }
    }
}
