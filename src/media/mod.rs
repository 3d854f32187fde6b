//! Asset generation and resolution: model tiers, caching, consistency
//! references, prompt enhancement and the resolution orchestrator.

pub mod backends;
pub mod cache;
pub mod consistency;
pub mod placeholder;
pub mod prompt;
pub mod resolver;
pub mod safety;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

/// Which backend produced an asset. The generation chain walks
/// [`TIER_CHAIN`] in order; `Placeholder` marks a locally synthesized image
/// after every tier was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTier {
    Primary,
    Fallback,
    Legacy,
    Placeholder,
}

/// Generation tiers in the order they are attempted.
pub const TIER_CHAIN: [ModelTier; 3] = [ModelTier::Primary, ModelTier::Fallback, ModelTier::Legacy];

impl ModelTier {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::Legacy => "legacy",
            Self::Placeholder => "placeholder",
        }
    }
}

/// The resolved result of an image request. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAsset {
    pub url: String,
    pub cache_key: String,
    pub tier: ModelTier,
}
