//! Typed records for each structured-output kind, plus the normalization
//! and synthetic-fallback logic that sits directly behind the recovery
//! ladder. Loosely-typed values never travel deeper than this module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use super::ladder;
use super::{ArrayShape, Recovered};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComicPanel {
    pub panel_id: u32,
    pub scene: String,
    pub image_prompt: String,
    pub dialogue: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComicScript {
    pub comic_title: String,
    pub theme: String,
    pub character_style_guide: BTreeMap<String, String>,
    pub panel_layout: Vec<ComicPanel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub content: String,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub content: String,
    pub level: String,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureSection {
    pub title: String,
    pub script: String,
    pub image_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    pub title: String,
    pub sections: Vec<LectureSection>,
}

fn field_str(value: &Value, name: &str) -> Option<String> {
    value.get(name).and_then(Value::as_str).map(|s| s.trim().to_string())
}

fn string_list(value: &Value, name: &str) -> Vec<String> {
    value
        .get(name)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Recover flashcards; the result is never shorter than `min_cards`.
pub fn recover_flashcards(raw: &str, min_cards: usize) -> Recovered<Vec<Flashcard>> {
    let shape = ArrayShape {
        required_fields: &["front", "back"],
        min_items: min_cards,
    };
    let recovered = ladder::recover_array(raw, &shape, || {
        vec![json!({
            "front": "No content",
            "back": "No flashcards could be generated for this topic."
        })]
    });

    pad_records(
        recovered.map(|items| {
            items
                .iter()
                .filter_map(|v| {
                    Some(Flashcard {
                        front: field_str(v, "front")?,
                        back: field_str(v, "back")?,
                    })
                })
                .collect()
        }),
        shape.min_items,
        |n| Flashcard {
            front: format!("Review card {}", n + 1),
            back: "No additional content was available for this card.".to_string(),
        },
    )
}

/// Recover slides; the result is never shorter than `min_slides`.
pub fn recover_slides(raw: &str, min_slides: usize) -> Recovered<Vec<Slide>> {
    let shape = ArrayShape {
        required_fields: &["content"],
        min_items: min_slides,
    };
    let recovered = ladder::recover_array(raw, &shape, || {
        vec![json!({ "title": null, "content": ["No content provided."] })]
    });

    pad_records(
        recovered.map(|items| {
            items
                .iter()
                .filter_map(|v| {
                    let content = string_list(v, "content");
                    (!content.is_empty()).then(|| Slide {
                        title: field_str(v, "title").filter(|t| !t.is_empty()),
                        content,
                    })
                })
                .collect()
        }),
        shape.min_items,
        |n| Slide {
            title: Some(format!("Slide {}", n + 1)),
            content: vec!["No content provided.".to_string()],
        },
    )
}

/// Pad a recovered record list up to the caller's minimum cardinality. A
/// `Parsed` outcome that needed padding is downgraded to `Partial`.
fn pad_records<T>(
    recovered: Recovered<Vec<T>>,
    min_items: usize,
    mut synth: impl FnMut(usize) -> T,
) -> Recovered<Vec<T>> {
    let mut pad = |records: &mut Vec<T>| {
        let missing = min_items.saturating_sub(records.len());
        for n in records.len()..min_items {
            records.push(synth(n));
        }
        missing
    };

    match recovered {
        Recovered::Parsed(mut records) => {
            let missing = pad(&mut records);
            if missing > 0 {
                warn!(missing, "padding parsed records up to minimum cardinality");
                Recovered::Partial(records, missing)
            } else {
                Recovered::Parsed(records)
            }
        }
        Recovered::Partial(mut records, dropped) => {
            let missing = pad(&mut records);
            Recovered::Partial(records, dropped + missing)
        }
        Recovered::Fallback(mut records) => {
            pad(&mut records);
            Recovered::Fallback(records)
        }
    }
}

/// Header half of a comic script: title, theme and the character style
/// guide. Style descriptions that arrive as objects are flattened into
/// readable strings.
pub fn recover_comic_header(raw: &str) -> Recovered<(String, String, BTreeMap<String, String>)> {
    let recovered = ladder::recover_object(
        raw,
        &["character_style_guide"],
        &["comic_title", "theme"],
        || {
            json!({
                "comic_title": "Generated Comic",
                "theme": "Adventure",
                "character_style_guide": { "Character": "A brave adventurer" }
            })
        },
    );

    recovered.map(|value| {
        let title = field_str(&value, "comic_title").unwrap_or_else(|| "Generated Comic".to_string());
        let theme = field_str(&value, "theme").unwrap_or_else(|| "Adventure".to_string());
        let guide = flatten_style_guide(value.get("character_style_guide"));
        (title, theme, guide)
    })
}

fn flatten_style_guide(value: Option<&Value>) -> BTreeMap<String, String> {
    let mut guide = BTreeMap::new();
    let Some(Value::Object(map)) = value else {
        return guide;
    };
    for (name, details) in map {
        let description = match details {
            Value::String(s) => s.clone(),
            Value::Object(fields) => fields
                .iter()
                .map(|(k, v)| {
                    let value = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    format!("{}: {}", title_case(k), value)
                })
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        };
        guide.insert(name.clone(), description);
    }
    guide
}

fn title_case(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recover the panel list; panels are re-numbered sequentially, every panel
/// gets at least one dialogue line, and the list is padded to `min_panels`
/// with generic narrative beats built from the known character names.
pub fn recover_panels(
    raw: &str,
    style_guide: &BTreeMap<String, String>,
    min_panels: usize,
) -> Recovered<Vec<ComicPanel>> {
    let shape = ArrayShape {
        required_fields: &["scene", "image_prompt"],
        min_items: min_panels,
    };
    let names = character_names(style_guide);
    let recovered = ladder::recover_array(raw, &shape, || {
        fallback_panels(style_guide, min_panels)
            .into_iter()
            .filter_map(|p| serde_json::to_value(p).ok())
            .collect()
    });

    let recovered = recovered.map(|items| {
        let mut panels: Vec<ComicPanel> = items
            .iter()
            .filter_map(|v| {
                let scene = field_str(v, "scene")?;
                let image_prompt = field_str(v, "image_prompt")?;
                Some(ComicPanel {
                    panel_id: v.get("panel_id").and_then(Value::as_u64).unwrap_or(0) as u32,
                    scene,
                    image_prompt,
                    dialogue: dialogue_map(v.get("dialogue")),
                    image_url: None,
                })
            })
            .collect();
        panels.sort_by_key(|p| p.panel_id);
        for (index, panel) in panels.iter_mut().enumerate() {
            panel.panel_id = index as u32 + 1;
            if panel.dialogue.is_empty() || has_generic_dialogue(&panel.dialogue) {
                panel.dialogue = synthesize_dialogue(&panel.scene, &names, panel.panel_id);
            }
        }
        panels
    });

    let guide = style_guide.clone();
    pad_records(recovered, min_panels, move |n| {
        fallback_panel(&guide, n as u32 + 1)
    })
    .map(|mut panels| {
        for (index, panel) in panels.iter_mut().enumerate() {
            panel.panel_id = index as u32 + 1;
        }
        panels
    })
}

fn dialogue_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let mut dialogue = BTreeMap::new();
    if let Some(Value::Object(map)) = value {
        for (speaker, line) in map {
            if let Some(line) = line.as_str() {
                if !line.trim().is_empty() {
                    dialogue.insert(speaker.clone(), line.trim().to_string());
                }
            }
        }
    }
    dialogue
}

fn has_generic_dialogue(dialogue: &BTreeMap<String, String>) -> bool {
    dialogue
        .values()
        .any(|line| line.contains("Panel") && line.contains("dialogue"))
}

fn character_names(style_guide: &BTreeMap<String, String>) -> Vec<String> {
    if style_guide.is_empty() {
        vec!["Character".to_string()]
    } else {
        style_guide.keys().cloned().collect()
    }
}

/// Scene-keyed dialogue synthesis for panels whose dialogue was missing or
/// generic model filler.
pub fn synthesize_dialogue(
    scene: &str,
    names: &[String],
    panel_id: u32,
) -> BTreeMap<String, String> {
    const PATTERNS: &[(&str, &[&str])] = &[
        ("watching", &["I wonder what's happening?", "This looks interesting!", "What's going on here?"]),
        ("approaching", &["Let me get a closer look.", "Time to explore!", "Getting closer..."]),
        ("noticing", &["Oh! What's that?", "Look at that!", "What's this?"]),
        ("discover", &["I found something!", "This changes everything!", "Look what I found!"]),
        ("thinking", &["Hmm...", "Let me think...", "Considering..."]),
        ("learning", &["I'm learning!", "This is new!", "Now I understand!"]),
        ("celebrat", &["We did it!", "What a day!", "Success!"]),
        ("working", &["Hard at work!", "Getting things done!", "Almost finished!"]),
    ];

    let scene_lower = scene.to_lowercase();
    let options: &[&str] = PATTERNS
        .iter()
        .find(|(keyword, _)| scene_lower.contains(keyword))
        .map(|(_, lines)| *lines)
        .unwrap_or(&["This is interesting!", "What happens next?", "Let's see what happens!"]);

    let index = (panel_id as usize + scene.len()) % options.len();
    let speaker = names.first().cloned().unwrap_or_else(|| "Character".to_string());

    let mut dialogue = BTreeMap::new();
    dialogue.insert(speaker, options[index].to_string());
    dialogue
}

fn fallback_panel(style_guide: &BTreeMap<String, String>, panel_id: u32) -> ComicPanel {
    let names = character_names(style_guide);
    let lead = names[0].clone();
    let pair = names.get(1).cloned().unwrap_or_else(|| "friends".to_string());

    let beats = [
        format!("Introduction scene showing {} in their environment", lead),
        format!("Action scene with {} and {} in motion", lead, pair),
        format!("Close-up on {}'s expressions and reactions", lead),
        "Wide shot of the environment with everyone interacting".to_string(),
        format!("Dramatic moment with {} facing a challenge", lead),
        format!("Discovery scene where {} finds something important", lead),
        "Resolution scene with everyone working together".to_string(),
        "Celebration scene with all characters sharing their success".to_string(),
    ];
    let scene = beats[(panel_id as usize - 1) % beats.len()].clone();

    let mut image_prompt = format!("{}. ", scene);
    for (name, description) in style_guide.iter().take(2) {
        let short: String = description.chars().take(100).collect();
        image_prompt.push_str(&format!("{}: {}. ", name, short));
    }
    image_prompt.push_str("NO TEXT, NO CAPTIONS, NO SPEECH BUBBLES.");

    ComicPanel {
        panel_id,
        scene: scene.clone(),
        image_prompt,
        dialogue: synthesize_dialogue(&scene, &names, panel_id),
        image_url: None,
    }
}

/// A full set of synthetic panels for when extraction yields nothing at all.
pub fn fallback_panels(style_guide: &BTreeMap<String, String>, count: usize) -> Vec<ComicPanel> {
    (1..=count.max(1) as u32)
        .map(|id| fallback_panel(style_guide, id))
        .collect()
}

/// Recover a story object. Partial extraction salvages `title`/`content`
/// and synthesizes a two-chapter structure from them.
pub fn recover_story(raw: &str, level: &str) -> Recovered<Story> {
    let recovered = ladder::recover_object(raw, &["title", "chapters"], &["title", "content"], || {
        json!({
            "title": "A Short Story",
            "content": "We couldn't build a full story this time.",
            "chapters": []
        })
    });

    let level = level.to_string();
    recovered.map(move |value| {
        let title = field_str(&value, "title").unwrap_or_else(|| "A Short Story".to_string());
        let content = field_str(&value, "content").unwrap_or_default();
        let mut chapters: Vec<Chapter> = value
            .get("chapters")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|c| {
                        Some(Chapter {
                            title: field_str(c, "title")?,
                            content: field_str(c, "content")?,
                            order: c.get("order").and_then(Value::as_u64).unwrap_or(0) as u32,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        chapters.sort_by_key(|c| c.order);

        if chapters.is_empty() {
            // Minimal valid structure from whatever fields survived.
            let body = if content.is_empty() {
                "No chapter content was available.".to_string()
            } else {
                content.clone()
            };
            chapters = vec![
                Chapter { title: "Chapter 1".to_string(), content: body.clone(), order: 1 },
                Chapter { title: "Chapter 2".to_string(), content: body, order: 2 },
            ];
        }
        for (index, chapter) in chapters.iter_mut().enumerate() {
            chapter.order = index as u32 + 1;
        }

        Story { title, content, level: level.clone(), chapters }
    })
}

/// Recover a lecture object: title plus sections with scripts and image
/// prompts.
pub fn recover_lecture(raw: &str) -> Recovered<Lecture> {
    let recovered = ladder::recover_object(raw, &["title", "sections"], &["title"], || {
        json!({ "title": "Lecture", "sections": [] })
    });

    recovered.map(|value| {
        let title = field_str(&value, "title").unwrap_or_else(|| "Lecture".to_string());
        let mut sections: Vec<LectureSection> = value
            .get("sections")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|s| {
                        Some(LectureSection {
                            title: field_str(s, "title")?,
                            script: field_str(s, "script")?,
                            image_prompt: field_str(s, "image_prompt").unwrap_or_default(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if sections.is_empty() {
            sections.push(LectureSection {
                title: title.clone(),
                script: "No lecture content was available for this topic.".to_string(),
                image_prompt: String::new(),
            });
        }

        Lecture { title, sections }
    })
}
