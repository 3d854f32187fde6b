//! Prompt enhancement: reading-level and visual-style descriptors folded
//! around the base prompt before it reaches an image model.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

/// Audience reading level. Affects both text prompts and the visual
/// descriptors applied to generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingLevel {
    Beginner,
    #[default]
    Moderate,
    Intermediate,
}

impl ReadingLevel {
    /// Lenient parse; anything unrecognized falls back to `Moderate`.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "beginner" => Self::Beginner,
            "moderate" => Self::Moderate,
            "intermediate" => Self::Intermediate,
            other => {
                warn!(level = other, "unknown reading level, defaulting to moderate");
                Self::Moderate
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Moderate => "moderate",
            Self::Intermediate => "intermediate",
        }
    }

    /// How prose should read at this level.
    pub fn prose_guidance(&self) -> &'static str {
        match self {
            Self::Beginner => {
                "Simple vocabulary, very short sentences, lots of examples, explain concepts very basically."
            }
            Self::Moderate => {
                "Slightly more complex words (defined simply), short to medium sentences, clear examples."
            }
            Self::Intermediate => {
                "Standard vocabulary, varied sentence length, relatable examples, explain key terms."
            }
        }
    }

    fn image_descriptors(&self) -> &'static [&'static str] {
        match self {
            Self::Beginner => &["simple", "friendly", "bright colors", "cartoon style"],
            Self::Moderate => &["engaging", "modern style", "relatable"],
            Self::Intermediate => &["stylish", "contemporary", "appealing to young adults"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Landscape,
    Portrait,
}

impl AspectRatio {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "square" => Some(Self::Square),
            "landscape" => Some(Self::Landscape),
            "portrait" => Some(Self::Portrait),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
        }
    }

    fn hint(&self) -> &'static str {
        match self {
            Self::Square => "1:1 aspect ratio, centered composition",
            Self::Landscape => "16:9 aspect ratio, wide composition, cinematic framing",
            Self::Portrait => "9:16 aspect ratio, vertical composition",
        }
    }
}

const QUALITY_DESCRIPTORS: &[&str] = &[
    "high quality",
    "detailed",
    "vibrant colors",
    "professional illustration",
    "crisp and clear",
];

#[derive(Debug, Deserialize)]
struct StyleCatalog {
    styles: HashMap<String, StyleEntry>,
}

#[derive(Debug, Deserialize)]
struct StyleEntry {
    descriptors: Vec<String>,
}

/// Builds the final prompt handed to the image backend.
pub struct PromptEnhancer {
    styles: HashMap<String, Vec<String>>,
}

impl Default for PromptEnhancer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEnhancer {
    pub fn new() -> Self {
        let catalog: StyleCatalog =
            toml::from_str(include_str!("./styles.toml")).expect("styles.toml is valid");
        Self {
            styles: catalog
                .styles
                .into_iter()
                .map(|(name, entry)| (name, entry.descriptors))
                .collect(),
        }
    }

    pub fn known_style(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    /// Concatenate the base prompt with quality, style and level
    /// descriptors, an optional aspect-ratio hint and an optional
    /// consistency directive. Always ends with the no-text directive.
    pub fn enhance(
        &self,
        base_prompt: &str,
        level: ReadingLevel,
        style_hint: Option<&str>,
        aspect_ratio: Option<AspectRatio>,
        consistency_directive: Option<&str>,
    ) -> String {
        let mut descriptors: Vec<&str> = QUALITY_DESCRIPTORS.to_vec();
        if let Some(style) = style_hint {
            match self.styles.get(style) {
                Some(style_descriptors) => {
                    descriptors.extend(style_descriptors.iter().map(String::as_str))
                }
                None => warn!(style, "unknown style hint, applying no style descriptors"),
            }
        }
        descriptors.extend(level.image_descriptors().iter().copied());

        let mut enhanced = format!("{}. {}", base_prompt.trim(), descriptors.join(", "));
        if let Some(ratio) = aspect_ratio {
            enhanced.push_str(&format!(". {}", ratio.hint()));
        }
        if let Some(directive) = consistency_directive {
            enhanced = format!("{} {}", directive, enhanced);
        }
        enhanced.push_str(". No text or captions in the image.");
        enhanced
    }
}
