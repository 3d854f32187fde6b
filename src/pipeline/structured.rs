//! Structured-output pipelines: flashcards, slideshows, stories, comics and
//! lectures. Every flow routes the raw model text through the recovery
//! ladder before anything downstream sees it.

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::media::prompt::ReadingLevel;
use crate::media::resolver::ImageRequest;
use crate::recovery::records::{
    self, ComicScript, Flashcard, Lecture, LectureSection, Slide, Story,
};
use crate::recovery::Recovered;

use super::document::ProfileContext;
use super::ContentEngine;

const MIN_FLASHCARDS: usize = 1;
const MIN_SLIDES: usize = 3;
const MIN_COMIC_PANELS: usize = 3;
const NARRATOR_VOICE: &str = "narrator-warm";

const COMIC_STYLE_ENHANCER: &str = "Comic style, bright, vibrant colors, dynamic composition, \
expressive characters. IMPORTANT: NO TEXT, NO CAPTIONS, NO SPEECH BUBBLES, NO WRITING in the \
image - only visual art.";

#[derive(Debug, Clone)]
pub struct DialogueRequest {
    pub selected_text: String,
    pub block_content: String,
    pub history: Vec<(String, String)>,
    pub question: String,
    pub level: ReadingLevel,
    pub profile: Option<ProfileContext>,
}

/// A recovered comic script with its panel images attached.
#[derive(Debug, Clone)]
pub struct ComicResult {
    pub script: ComicScript,
}

/// One lecture section with its generated narration and illustration.
#[derive(Debug, Clone)]
pub struct SectionAsset {
    pub section: LectureSection,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LectureResult {
    pub title: String,
    pub title_audio_url: Option<String>,
    pub sections: Vec<SectionAsset>,
}

/// Worse-of combinator for flows made of several recovery steps.
fn combine<A, B>(a: Recovered<A>, b: Recovered<B>) -> Recovered<(A, B)> {
    use Recovered::*;
    match (a, b) {
        (Fallback(a), b) => Fallback((a, b.into_inner())),
        (a, Fallback(b)) => Fallback((a.into_inner(), b)),
        (Partial(a, n), b) => {
            let extra = if let Partial(_, m) = &b { *m } else { 0 };
            Partial((a, b.into_inner()), n + extra)
        }
        (a, Partial(b, m)) => Partial((a.into_inner(), b), m),
        (Parsed(a), Parsed(b)) => Parsed((a, b)),
    }
}

impl ContentEngine {
    /// Extract key concepts from the input into front/back flashcards.
    pub async fn generate_flashcards(
        &self,
        input_text: &str,
        level: ReadingLevel,
        profile: Option<&ProfileContext>,
    ) -> Result<Recovered<Vec<Flashcard>>, EngineError> {
        let prompt = format!(
            "Create educational flashcards from the text below. Each card has a 'front' (term or \
             question) and a 'back' (definition or answer). Generate between 3 and 10 cards. \
             Output ONLY a JSON array of objects with 'front' and 'back' keys; escape embedded \
             newlines as \\n.\n\nReading level: {}\nProfile: {}\n\nInput text:\n---\n{}\n---",
            level.as_str(),
            ProfileContext::describe(profile),
            input_text
        );
        let raw = self
            .text_backend()
            .generate(&prompt, Some("Output only the JSON array as specified."))
            .await?;

        let recovered = records::recover_flashcards(&raw, MIN_FLASHCARDS);
        info!(cards = recovered.get().len(), "flashcards recovered");
        Ok(recovered)
    }

    /// Summarize the input into a slideshow of titled bullet lists.
    pub async fn generate_slides(
        &self,
        input_text: &str,
        level: ReadingLevel,
        profile: Option<&ProfileContext>,
    ) -> Result<Recovered<Vec<Slide>>, EngineError> {
        let prompt = format!(
            "Break the text below into slides (typically 6-10, never fewer than 3). Each slide \
             has an optional 'title' (string or null) and a 'content' array of bullet strings. \
             Output ONLY a JSON array; escape embedded newlines as \\n.\n\nReading level: {}\n\
             Profile: {}\n\nInput text:\n---\n{}\n---",
            level.as_str(),
            ProfileContext::describe(profile),
            input_text
        );
        let raw = self
            .text_backend()
            .generate(&prompt, Some("Output only the JSON array as specified."))
            .await?;

        let recovered = records::recover_slides(&raw, MIN_SLIDES);
        info!(slides = recovered.get().len(), "slides recovered");
        Ok(recovered)
    }

    /// Turn the input into a short multi-chapter story at the given level.
    pub async fn generate_story(
        &self,
        input_text: &str,
        level: ReadingLevel,
        genre: Option<&str>,
        main_character: Option<&str>,
    ) -> Result<Recovered<Story>, EngineError> {
        let mut instruction = format!(
            "You adapt content into engaging stories. Transform the given text into a story with \
             2-3 chapters for the '{}' reading level: {}. Respond with ONLY a JSON object of the \
             form {{\"title\", \"content\", \"level\", \"chapters\": [{{\"title\", \"content\", \
             \"order\"}}]}}.",
            level.as_str(),
            level.prose_guidance()
        );
        if let Some(genre) = genre {
            instruction.push_str(&format!(" Write it as a {genre} story."));
        }
        if let Some(name) = main_character {
            instruction.push_str(&format!(" Feature {name} as the main character."));
        }

        let raw = self.text_backend().generate(input_text, Some(&instruction)).await?;
        Ok(records::recover_story(&raw, level.as_str()))
    }

    /// Two-step comic generation: characters and theme first, then panels,
    /// then batch panel illustration. Panel image failures leave the panel
    /// without a URL; they never fail the comic.
    pub async fn generate_comic(
        &self,
        input_text: &str,
        level: ReadingLevel,
        image_style: Option<String>,
        notify_token: Option<&str>,
    ) -> Result<Recovered<ComicResult>, EngineError> {
        let characters_prompt = format!(
            "Read the text below and invent a short comic adaptation. Respond with ONLY a JSON \
             object: {{\"comic_title\", \"theme\", \"character_style_guide\": {{name: visual \
             description}}}}.\n\nText:\n---\n{}\n---",
            input_text
        );
        let characters_raw = self
            .text_backend()
            .generate(
                &characters_prompt,
                Some("You are an expert comic scriptwriter. Always return valid JSON."),
            )
            .await?;
        let header = records::recover_comic_header(&characters_raw);

        let (title, theme, style_guide) = header.get().clone();
        let guide_json = serde_json::to_string(&style_guide).unwrap_or_else(|_| "{}".to_string());
        let panels_prompt = format!(
            "Write the panel list for a comic titled '{title}' (theme: {theme}) adapting the text \
             below. Respond with ONLY a JSON array of panels: {{\"panel_id\", \"scene\", \
             \"image_prompt\", \"dialogue\": {{character: line}}}}. Generate 7-20 panels with \
             meaningful, story-advancing dialogue.\n\nCharacter style guide: {guide_json}\n\n\
             Text:\n---\n{input_text}\n---"
        );
        let panels_raw = self
            .text_backend()
            .generate(
                &panels_prompt,
                Some("You are an expert comic scriptwriter. Always return valid JSON."),
            )
            .await?;
        let panels = records::recover_panels(&panels_raw, &style_guide, MIN_COMIC_PANELS);

        let combined = combine(header, panels);
        let style_guide_lines = style_guide
            .iter()
            .map(|(name, description)| format!("{name}: {description}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut result = combined.map(|((title, theme, style_guide), panels)| ComicResult {
            script: ComicScript {
                comic_title: title,
                theme,
                character_style_guide: style_guide,
                panel_layout: panels,
            },
        });

        // Illustrate every panel through the bounded pool, in order.
        let requests: Vec<ImageRequest> = result
            .get()
            .script
            .panel_layout
            .iter()
            .map(|panel| {
                let full_prompt = format!(
                    "{}\nCharacter Style Guide:\n{}\n{}",
                    panel.image_prompt, style_guide_lines, COMIC_STYLE_ENHANCER
                );
                ImageRequest::new(full_prompt, level).with_style(image_style.clone())
            })
            .collect();
        let resolved = self.resolver().resolve_batch(&requests).await;

        let panels = match &mut result {
            Recovered::Parsed(r) | Recovered::Partial(r, _) | Recovered::Fallback(r) => {
                &mut r.script.panel_layout
            }
        };
        for (panel, outcome) in panels.iter_mut().zip(resolved) {
            match outcome {
                Ok(asset) => panel.image_url = Some(asset.url),
                Err(e) => {
                    warn!(panel = panel.panel_id, error = %e, "panel illustration failed");
                    panel.image_url = None;
                }
            }
        }

        self.notify(
            notify_token,
            "Comic Ready!",
            &format!("Created {} panels for you", result.get().script.panel_layout.len()),
        )
        .await;

        Ok(result)
    }

    /// Generate a spoken-lecture breakdown with per-section narration audio
    /// and illustrations. A failed audio or image slot degrades to `None`
    /// for that section only.
    pub async fn generate_lecture(
        &self,
        input_text: &str,
        level: ReadingLevel,
        image_style: Option<String>,
        notify_token: Option<&str>,
    ) -> Result<LectureResult, EngineError> {
        let prompt = format!(
            "Turn the text below into a casual spoken lecture of 3-5 sections. Respond with ONLY \
             a JSON object: {{\"title\", \"sections\": [{{\"title\", \"script\", \
             \"image_prompt\"}}]}}.\n\nText:\n---\n{}\n---",
            truncate_chars(input_text, 8000)
        );
        let raw = self
            .text_backend()
            .generate(&prompt, Some("You are a smart, casual, friendly teacher."))
            .await?;
        let lecture: Lecture = records::recover_lecture(&raw).into_inner();

        let lecture_id = Uuid::new_v4().simple().to_string();
        let title_audio_url = self
            .synthesize_and_store(&lecture.title, &format!("audio/lecture_{lecture_id}_title.mp3"))
            .await;

        let mut sections = Vec::with_capacity(lecture.sections.len());
        for (index, section) in lecture.sections.into_iter().enumerate() {
            let audio_url = self
                .synthesize_and_store(
                    &section.script,
                    &format!("audio/lecture_{lecture_id}_section_{index}.mp3"),
                )
                .await;
            let image_url = if section.image_prompt.is_empty() {
                None
            } else {
                let request =
                    ImageRequest::new(section.image_prompt.clone(), level).with_style(image_style.clone());
                match self.resolver().resolve(&request).await {
                    Ok(asset) => Some(asset.url),
                    Err(e) => {
                        warn!(section = index, error = %e, "lecture illustration failed");
                        None
                    }
                }
            };
            sections.push(SectionAsset {
                section,
                audio_url,
                image_url,
            });
        }

        self.notify(
            notify_token,
            "Lecture Ready!",
            &format!("Prepared {} lecture sections for you", sections.len()),
        )
        .await;

        Ok(LectureResult {
            title: lecture.title,
            title_audio_url,
            sections,
        })
    }

    /// Re-explain one paragraph a different way at the same reading level.
    pub async fn re_explain(
        &self,
        paragraph: &str,
        level: ReadingLevel,
        profile: Option<&ProfileContext>,
    ) -> Result<String, EngineError> {
        let prompt = format!(
            "Re-explain the paragraph below differently: simpler terms, different examples or a \
             new perspective, same core meaning. Reading level: {} ({}). Profile: {}. Reply with \
             the re-explained paragraph only.\n\n---\n{}\n---",
            level.as_str(),
            level.prose_guidance(),
            ProfileContext::describe(profile),
            paragraph
        );
        let text = self
            .text_backend()
            .generate(&prompt, Some("You are an expert at rephrasing text for better understanding."))
            .await?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(EngineError::EmptyGeneration);
        }
        Ok(text)
    }

    /// One conversational tutoring turn about a selected span of content.
    pub async fn dialogue_reply(&self, request: &DialogueRequest) -> Result<String, EngineError> {
        let history = if request.history.is_empty() {
            "No previous conversation in this session.".to_string()
        } else {
            request
                .history
                .iter()
                .map(|(speaker, text)| format!("{speaker}: {text}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let prompt = format!(
            "Reading level: {}\nProfile: {}\n\nContent block:\n---\n{}\n---\n\nSelected text:\n\
             ---\n{}\n---\n\nConversation so far:\n---\n{}\n---\n\nUser's question:\n---\n{}\n---\n\n\
             Reply conversationally, staying focused on the selected text.",
            request.level.as_str(),
            ProfileContext::describe(request.profile.as_ref()),
            request.block_content,
            request.selected_text,
            history,
            request.question
        );
        let text = self
            .text_backend()
            .generate(
                &prompt,
                Some("You are a conversational tutor. Answer the user's latest question using the provided context."),
            )
            .await?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(EngineError::EmptyGeneration);
        }
        Ok(text)
    }

    async fn synthesize_and_store(&self, text: &str, key: &str) -> Option<String> {
        let speech = self.speech_backend()?;
        let audio = match speech.synthesize(text, NARRATOR_VOICE).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(error = %e, "narration synthesis failed");
                return None;
            }
        };
        match self.blob_store().put(key, audio, "audio/mpeg").await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "narration upload failed");
                None
            }
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
