//! End-to-end pipeline tests against in-memory collaborators.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};

use crate::blocks::ContentBlock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::media::backends::{
    GenerateError, ImageGenerator, Notifier, NotifyError, SpeechSynthesizer, TextGenerator,
};
use crate::media::prompt::ReadingLevel;
use crate::media::ModelTier;
use crate::recovery::Recovered;
use crate::storage::MemoryStore;

use super::document::DocumentRequest;
use super::ContentEngine;

/// Text backend double that replays scripted responses in order.
struct ScriptedText {
    responses: Mutex<VecDeque<Result<String, ()>>>,
}

impl ScriptedText {
    fn new<I: IntoIterator<Item = &'static str>>(responses: I) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|s| Ok(s.to_string())).collect()),
        }
    }

    fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(())])),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate(&self, _prompt: &str, _system: Option<&str>) -> Result<String, GenerateError> {
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(())) | None => Err(GenerateError::EmptyResponse),
        }
    }
}

struct FixedImages {
    payload: Bytes,
    fail: bool,
    calls: AtomicUsize,
}

impl FixedImages {
    fn working() -> Self {
        Self {
            payload: png_payload(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn broken() -> Self {
        Self {
            payload: Bytes::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageGenerator for FixedImages {
    async fn generate(&self, _prompt: &str, _tier: ModelTier) -> Result<Bytes, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(GenerateError::EmptyResponse)
        } else {
            Ok(self.payload.clone())
        }
    }
}

struct FixedSpeech;

#[async_trait]
impl SpeechSynthesizer for FixedSpeech {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Bytes, GenerateError> {
        Ok(Bytes::from_static(b"mp3-bytes"))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, token: &str, title: &str, _body: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((token.to_string(), title.to_string()));
        Ok(())
    }
}

fn png_payload() -> Bytes {
    let canvas = RgbaImage::from_pixel(32, 32, Rgba([90, 120, 200, 255]));
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    Bytes::from(buffer.into_inner())
}

fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.media.min_image_bytes = 16;
    config.media.retries_per_tier = 1;
    config
}

fn engine_with(text: ScriptedText, images: FixedImages) -> ContentEngine {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    ContentEngine::new(
        Arc::new(text),
        Arc::new(images),
        Arc::new(MemoryStore::new()),
        test_config(),
    )
}

const QUIZ_DOCUMENT: &str = "**Intro**\nHello there.\n\n1. What color is the sky?\na) Red\nb) Blue\nCorrect Answer: b\nExplanation: Light scattering.\n\n[Image: a blue sky]\n";

#[tokio::test]
async fn document_pipeline_orders_blocks_and_resolves_images() {
    let engine = engine_with(ScriptedText::new([QUIZ_DOCUMENT]), FixedImages::working());
    let request = DocumentRequest::new("tell me about the sky", ReadingLevel::Moderate);
    let document = engine.generate_document(&request).await.unwrap();

    assert_eq!(document.blocks.len(), 4);
    assert!(matches!(&document.blocks[0], ContentBlock::Heading { content, .. } if content == "Intro"));
    assert!(matches!(&document.blocks[1], ContentBlock::Paragraph { content, .. } if content == "Hello there."));
    match &document.blocks[2] {
        ContentBlock::MultipleChoiceQuestion {
            options,
            correct_answer_id,
            ..
        } => {
            assert_eq!(options.len(), 2);
            let correct = options.iter().find(|o| &o.id == correct_answer_id).unwrap();
            assert_eq!(correct.text, "Blue");
        }
        other => panic!("expected question, got {:?}", other),
    }
    assert!(matches!(&document.blocks[3], ContentBlock::Image { alt, .. } if alt == "a blue sky"));
}

#[tokio::test]
async fn document_pipeline_degrades_failed_images_to_placeholders() {
    let engine = engine_with(ScriptedText::new([QUIZ_DOCUMENT]), FixedImages::broken());
    let request = DocumentRequest::new("tell me about the sky", ReadingLevel::Moderate);
    let document = engine.generate_document(&request).await.unwrap();

    // Generation failed at every tier, but storage works: the slot becomes
    // a placeholder image, not an error block.
    assert_eq!(document.blocks.len(), 4);
    match &document.blocks[3] {
        ContentBlock::Image { url, .. } => assert!(url.contains("placeholder_")),
        other => panic!("expected placeholder image, got {:?}", other),
    }
}

#[tokio::test]
async fn document_pipeline_surfaces_empty_generation() {
    let engine = engine_with(ScriptedText::failing(), FixedImages::working());
    let request = DocumentRequest::new("anything", ReadingLevel::Moderate);
    let result = engine.generate_document(&request).await;
    assert!(matches!(result, Err(EngineError::Backend(_))));

    let engine = engine_with(ScriptedText::new(["   \n  "]), FixedImages::working());
    let result = engine.generate_document(&request).await;
    assert!(matches!(result, Err(EngineError::EmptyGeneration)));
}

#[tokio::test]
async fn leading_ghibli_placeholder_becomes_first_block() {
    let text = "[GhibliImage: a valley at dawn]\n**Topic**\nBody text.\n";
    let engine = engine_with(ScriptedText::new([text]), FixedImages::working());
    let request = DocumentRequest::new("topic", ReadingLevel::Moderate);
    let document = engine.generate_document(&request).await.unwrap();

    match &document.blocks[0] {
        ContentBlock::Image { alt, .. } => {
            assert_eq!(alt, "Summary illustration: a valley at dawn");
        }
        other => panic!("expected summary image first, got {:?}", other),
    }
    assert!(matches!(&document.blocks[1], ContentBlock::Heading { content, .. } if content == "Topic"));
}

#[tokio::test]
async fn unparsable_text_still_yields_a_document() {
    let engine = engine_with(ScriptedText::new(["plain prose with no structure at all"]), FixedImages::working());
    let request = DocumentRequest::new("x", ReadingLevel::Moderate);
    let document = engine.generate_document(&request).await.unwrap();
    assert_eq!(document.blocks.len(), 1);
    assert!(matches!(&document.blocks[0], ContentBlock::Paragraph { .. }));
}

#[tokio::test]
async fn completion_notification_is_sent() {
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = engine_with(ScriptedText::new([QUIZ_DOCUMENT]), FixedImages::working())
        .with_notifier(notifier.clone());

    let mut request = DocumentRequest::new("sky", ReadingLevel::Moderate);
    request.notify_token = Some("device-token".to_string());
    engine.generate_document(&request).await.unwrap();

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "device-token");
    assert_eq!(sent[0].1, "Content Ready!");
}

#[tokio::test]
async fn flashcards_flow_recovers_and_pads() {
    let engine = engine_with(
        ScriptedText::new([r#"```json
[{"front": "Photosynthesis", "back": "How plants make food"}]
```"#]),
        FixedImages::working(),
    );
    let result = engine
        .generate_flashcards("plants", ReadingLevel::Moderate, None)
        .await
        .unwrap();
    assert_eq!(result.get().len(), 1);
    assert!(matches!(result, Recovered::Parsed(_)));
}

#[tokio::test]
async fn slides_flow_enforces_minimum() {
    let engine = engine_with(
        ScriptedText::new([r#"[{"title": "One", "content": ["a"]}]"#]),
        FixedImages::working(),
    );
    let result = engine
        .generate_slides("topic", ReadingLevel::Moderate, None)
        .await
        .unwrap();
    assert_eq!(result.get().len(), 3);
}

#[tokio::test]
async fn comic_flow_survives_truncated_panels() {
    let characters = r#"{"comic_title": "Sky Tales", "theme": "Science",
        "character_style_guide": {"Mira": "A curious girl in a yellow raincoat"}}"#;
    // Truncated after panel 2 of an intended 5.
    let panels = r#"[
        {"panel_id": 1, "scene": "Mira watching the rain", "image_prompt": "girl at a window", "dialogue": {"Mira": "Look at the rain!"}},
        {"panel_id": 2, "scene": "Mira approaching the door", "image_prompt": "girl at a door", "dialogue": {"Mira": "Let me get a closer look."}},
        {"panel_id": 3, "scene": "Mira steps outsi"#;

    let engine = engine_with(ScriptedText::new([characters, panels]), FixedImages::working());
    let result = engine
        .generate_comic("the water cycle", ReadingLevel::Moderate, None, None)
        .await
        .unwrap();

    let script = &result.get().script;
    assert_eq!(script.comic_title, "Sky Tales");
    assert!(script.panel_layout.len() >= 3);
    assert!(!result.is_fallback());
    for panel in &script.panel_layout {
        assert!(panel.image_url.is_some());
        assert!(!panel.dialogue.is_empty());
    }
}

#[tokio::test]
async fn comic_flow_synthesizes_panels_from_wreckage() {
    let engine = engine_with(
        ScriptedText::new(["not json at all", "also not json"]),
        FixedImages::working(),
    );
    let result = engine
        .generate_comic("anything", ReadingLevel::Moderate, None, None)
        .await
        .unwrap();

    assert!(result.is_fallback());
    let script = &result.get().script;
    assert!(script.panel_layout.len() >= 3);
    for panel in &script.panel_layout {
        assert!(!panel.scene.is_empty());
        assert!(!panel.dialogue.is_empty());
    }
}

#[tokio::test]
async fn lecture_flow_attaches_section_assets() {
    let lecture = r#"{"title": "Rain", "sections": [
        {"title": "Clouds", "script": "Clouds form when water vapor cools.", "image_prompt": "cumulus clouds"},
        {"title": "Drops", "script": "Drops fall when they grow heavy.", "image_prompt": "falling rain"}
    ]}"#;
    let engine = engine_with(ScriptedText::new([lecture]), FixedImages::working())
        .with_speech(Arc::new(FixedSpeech));

    let result = engine
        .generate_lecture("rain", ReadingLevel::Moderate, None, None)
        .await
        .unwrap();

    assert_eq!(result.title, "Rain");
    assert!(result.title_audio_url.is_some());
    assert_eq!(result.sections.len(), 2);
    for section in &result.sections {
        assert!(section.audio_url.is_some());
        assert!(section.image_url.is_some());
    }
}

#[tokio::test]
async fn lecture_flow_without_speech_backend_skips_audio() {
    let lecture = r#"{"title": "Rain", "sections": [
        {"title": "Clouds", "script": "Clouds form.", "image_prompt": "clouds"}
    ]}"#;
    let engine = engine_with(ScriptedText::new([lecture]), FixedImages::working());
    let result = engine
        .generate_lecture("rain", ReadingLevel::Moderate, None, None)
        .await
        .unwrap();
    assert!(result.title_audio_url.is_none());
    assert!(result.sections[0].audio_url.is_none());
    assert!(result.sections[0].image_url.is_some());
}

#[tokio::test]
async fn story_flow_recovers_structure() {
    let engine = engine_with(
        ScriptedText::new([r#"{"title": "The Lost Map", "content": "An explorer finds a map.",
            "level": "moderate", "chapters": [
                {"title": "The Find", "content": "...", "order": 1},
                {"title": "The Journey", "content": "...", "order": 2}
            ]}"#]),
        FixedImages::working(),
    );
    let story = engine
        .generate_story("exploration", ReadingLevel::Moderate, Some("Adventure"), None)
        .await
        .unwrap()
        .into_inner();
    assert_eq!(story.title, "The Lost Map");
    assert_eq!(story.chapters.len(), 2);
}

#[tokio::test]
async fn explicit_image_requests_pass_safety_filter() {
    let engine = engine_with(ScriptedText::new([]), FixedImages::working());
    let result = engine
        .generate_image(
            "a scene with blood",
            ReadingLevel::Moderate,
            None,
            None,
            None,
            None,
        )
        .await;
    assert!(matches!(result, Err(EngineError::UnsafePrompt(_))));

    let asset = engine
        .generate_image("a meadow", ReadingLevel::Moderate, None, None, None, None)
        .await
        .unwrap();
    assert_eq!(asset.tier, ModelTier::Primary);
}

#[tokio::test]
async fn consistency_reference_feeds_generation() {
    let engine = engine_with(ScriptedText::new([]), FixedImages::working());
    engine
        .consistency()
        .register_character("story-1", "Mira", "a girl in a yellow raincoat", None);

    let asset = engine
        .generate_image(
            "Mira jumps in a puddle",
            ReadingLevel::Moderate,
            None,
            None,
            Some("story-1".to_string()),
            Some("Mira".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(asset.tier, ModelTier::Primary);
}

#[tokio::test]
async fn dialogue_reply_uses_conversation_context() {
    let engine = engine_with(
        ScriptedText::new(["Good question - the sky scatters blue light most."]),
        FixedImages::working(),
    );
    let request = super::structured::DialogueRequest {
        selected_text: "Light scattering".to_string(),
        block_content: "Blue light scatters more than red.".to_string(),
        history: vec![("User".to_string(), "Why blue?".to_string())],
        question: "Can you say more?".to_string(),
        level: ReadingLevel::Moderate,
        profile: None,
    };
    let reply = engine.dialogue_reply(&request).await.unwrap();
    assert!(reply.contains("scatters"));
}

#[tokio::test]
async fn re_explain_returns_plain_text() {
    let engine = engine_with(ScriptedText::new(["Here is a simpler take."]), FixedImages::working());
    let text = engine
        .re_explain("Original paragraph.", ReadingLevel::Beginner, None)
        .await
        .unwrap();
    assert_eq!(text, "Here is a simpler take.");
}
