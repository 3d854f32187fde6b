//! In-process TTL cache for resolved asset URLs.
//!
//! Keys are derived from the full request tuple; entries are evicted lazily
//! on the next lookup past their TTL. Losing an insert race costs one
//! redundant generation call, nothing more.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use super::ModelTier;

struct CacheEntry {
    url: String,
    tier: ModelTier,
    inserted: Instant,
}

pub struct AssetCache {
    inner: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    enabled: bool,
}

impl AssetCache {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
            enabled,
        }
    }

    /// Deterministic key over everything that affects the rendered image.
    pub fn key(
        prompt: &str,
        level: &str,
        style_hint: Option<&str>,
        aspect_ratio: Option<&str>,
    ) -> String {
        let material = format!(
            "{}|{}|{}|{}",
            prompt,
            level,
            style_hint.unwrap_or(""),
            aspect_ratio.unwrap_or("")
        );
        blake3::hash(material.as_bytes()).to_hex().to_string()
    }

    /// Live entry for `key`, if any. Expired entries are removed here.
    pub fn get(&self, key: &str) -> Option<(String, ModelTier)> {
        if !self.enabled {
            return None;
        }
        let mut inner = self.inner.lock().unwrap();
        match inner.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => {
                debug!(key, "asset cache hit");
                Some((entry.url.clone(), entry.tier))
            }
            Some(_) => {
                inner.remove(key);
                None
            }
            None => None,
        }
    }

    /// Record a freshly generated URL. Placeholder results must not be
    /// cached; callers only insert model-tier successes.
    pub fn insert(&self, key: &str, url: &str, tier: ModelTier) {
        if !self.enabled {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.insert(
            key.to_string(),
            CacheEntry {
                url: url.to_string(),
                tier,
                inserted: Instant::now(),
            },
        );
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
