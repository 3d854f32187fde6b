//! Character and style registries used to bias future generations toward a
//! previously established look. Process-wide, not persisted: a restart
//! deliberately loses all consistency history.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CharacterReference {
    pub description: String,
    pub reference_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StyleReference {
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct ConsistencyRegistry {
    characters: RwLock<HashMap<(String, String), CharacterReference>>,
    styles: RwLock<HashMap<(String, String), StyleReference>>,
}

impl ConsistencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_character(
        &self,
        story_id: &str,
        name: &str,
        description: &str,
        reference_url: Option<&str>,
    ) {
        let mut characters = self.characters.write().unwrap();
        characters.insert(
            (story_id.to_string(), name.to_string()),
            CharacterReference {
                description: description.to_string(),
                reference_url: reference_url.map(str::to_string),
                created_at: Utc::now(),
            },
        );
        info!(story_id, name, "registered character reference");
    }

    pub fn character_reference(&self, story_id: &str, name: &str) -> Option<CharacterReference> {
        let characters = self.characters.read().unwrap();
        characters
            .get(&(story_id.to_string(), name.to_string()))
            .cloned()
    }

    pub fn register_style(&self, content_id: &str, style_name: &str, description: &str) {
        let mut styles = self.styles.write().unwrap();
        styles.insert(
            (content_id.to_string(), style_name.to_string()),
            StyleReference {
                description: description.to_string(),
                created_at: Utc::now(),
            },
        );
        info!(content_id, style_name, "registered style reference");
    }

    pub fn style_reference(&self, content_id: &str, style_name: &str) -> Option<StyleReference> {
        let styles = self.styles.read().unwrap();
        styles
            .get(&(content_id.to_string(), style_name.to_string()))
            .cloned()
    }

    /// Directive describing the established appearance for a story/character
    /// pairing, prepended to enhanced prompts when a reference exists.
    pub fn character_directive(&self, story_id: &str, name: &str) -> Option<String> {
        let reference = self.character_reference(story_id, name)?;
        let mut directive = format!(
            "Maintain consistent character appearance: {}.",
            reference.description
        );
        if let Some(url) = &reference.reference_url {
            directive.push_str(&format!(" Reference the visual style from: {}", url));
        }
        Some(directive)
    }
}
