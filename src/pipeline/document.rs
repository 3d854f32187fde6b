//! The document pipeline: level-adjusted generation, placeholder scanning,
//! tokenization, batch image resolution and ordered assembly.

use uuid::Uuid;

use crate::blocks::scanner::{Fragment, PlaceholderKind};
use crate::blocks::{assembler, ContentBlock};
use crate::error::EngineError;
use crate::media::prompt::ReadingLevel;
use crate::media::resolver::ImageRequest;

use super::ContentEngine;

const SYSTEM_INSTRUCTION: &str = "You are an expert assistant creating educational content for \
kids and young adults, especially readers who find dense text difficult. Rewrite the input as \
clear, engaging content for the stated reading level. Use bold headings (**Heading**), short \
paragraphs, and at least two [Image: description] placeholders where a picture would help. \
Begin the response with a single [GhibliImage: description] placeholder summarizing the topic. \
End with a quiz under a **Quiz Time!** heading: numbered questions, options like 'a) …', a \
'Correct Answer: letter' line and an optional 'Explanation: …' line per question.";

/// Profile information folded into prompts so examples land close to the
/// reader.
#[derive(Debug, Clone, Default)]
pub struct ProfileContext {
    pub student_level: Option<String>,
    pub interests: Vec<String>,
}

impl ProfileContext {
    pub(crate) fn describe(profile: Option<&ProfileContext>) -> String {
        match profile {
            Some(profile) => format!(
                "Student Level={}, Interests={}",
                profile.student_level.as_deref().unwrap_or("Not specified"),
                if profile.interests.is_empty() {
                    "Not specified".to_string()
                } else {
                    profile.interests.join(", ")
                }
            ),
            None => "Not specified".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentRequest {
    pub input_text: String,
    pub level: ReadingLevel,
    /// Named visual style applied to generated images.
    pub image_style: Option<String>,
    pub profile: Option<ProfileContext>,
    /// Push token for the best-effort completion notification.
    pub notify_token: Option<String>,
}

impl DocumentRequest {
    pub fn new(input_text: impl Into<String>, level: ReadingLevel) -> Self {
        Self {
            input_text: input_text.into(),
            level,
            image_style: None,
            profile: None,
            notify_token: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub request_id: String,
    pub blocks: Vec<ContentBlock>,
}

/// What each scanned fragment contributes to the final document, recorded
/// so assembly can happen strictly in source order after the image batch
/// completes.
enum PlannedPart {
    Blocks(Vec<ContentBlock>),
    Image {
        batch_index: usize,
        prompt: String,
        alt: String,
    },
}

impl ContentEngine {
    /// Generate a full document from input text. The only error surfaced is
    /// a text backend that produced nothing at all; everything downstream
    /// degrades into the returned blocks instead of failing.
    pub async fn generate_document(&self, request: &DocumentRequest) -> Result<Document, EngineError> {
        let request_id = Uuid::new_v4().to_string();
        let prompt = format!(
            "[Level: {}] [Profile: {}]\n\n{}",
            request.level.as_str(),
            ProfileContext::describe(request.profile.as_ref()),
            request.input_text
        );

        let text = self
            .text_backend()
            .generate(&prompt, Some(SYSTEM_INSTRUCTION))
            .await?;
        if text.trim().is_empty() {
            return Err(EngineError::EmptyGeneration);
        }

        let blocks = self.parse_and_resolve(&text, request).await;

        self.notify(
            request.notify_token.as_deref(),
            "Content Ready!",
            &format!("Generated {} content blocks for you", blocks.len()),
        )
        .await;

        Ok(Document { request_id, blocks })
    }

    /// Parse generated text into blocks, resolving every image placeholder
    /// through the batch pool. Never fails; the result always contains at
    /// least one renderable block.
    pub(crate) async fn parse_and_resolve(
        &self,
        text: &str,
        request: &DocumentRequest,
    ) -> Vec<ContentBlock> {
        let fragments = self.scanner().scan(text);

        let mut plan: Vec<PlannedPart> = Vec::new();
        let mut image_requests: Vec<ImageRequest> = Vec::new();
        let mut fallback_text = String::new();

        for fragment in fragments {
            match fragment {
                Fragment::Text(segment) => {
                    fallback_text.push_str(&segment);
                    plan.push(PlannedPart::Blocks(self.tokenizer().tokenize(&segment)));
                }
                Fragment::Placeholder(placeholder) => {
                    let (style_hint, alt) = match placeholder.kind {
                        PlaceholderKind::GhibliImage => (
                            request
                                .image_style
                                .clone()
                                .or_else(|| Some("Studio Ghibli".to_string())),
                            format!("Summary illustration: {}", placeholder.prompt),
                        ),
                        PlaceholderKind::Image => {
                            (request.image_style.clone(), placeholder.prompt.clone())
                        }
                    };
                    plan.push(PlannedPart::Image {
                        batch_index: image_requests.len(),
                        prompt: placeholder.prompt.clone(),
                        alt,
                    });
                    image_requests
                        .push(ImageRequest::new(placeholder.prompt, request.level).with_style(style_hint));
                }
            }
        }

        let resolved = self.resolver().resolve_batch(&image_requests).await;

        let mut blocks = Vec::new();
        for part in plan {
            match part {
                PlannedPart::Blocks(parsed) => blocks.extend(parsed),
                PlannedPart::Image {
                    batch_index,
                    prompt,
                    alt,
                } => match &resolved[batch_index] {
                    Ok(asset) => blocks.push(ContentBlock::image(&asset.url, alt)),
                    Err(_) => {
                        let short: String = prompt.chars().take(50).collect();
                        blocks.push(ContentBlock::error(format!(
                            "Failed to generate image for: {short}"
                        )));
                    }
                },
            }
        }

        assembler::finalize(blocks, &fallback_text)
    }
}
