//! Document model: the ordered block sequence a rendered document is made of.

pub mod assembler;
pub mod scanner;
pub mod tokenizer;


use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One answer choice inside a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
}

/// The atomic unit of a rendered document.
///
/// Block ids are assigned at creation and are stable for client-side
/// addressing only; ordering is positional in the containing sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "heading")]
    Heading { id: String, content: String },

    #[serde(rename = "paragraph")]
    Paragraph { id: String, content: String },

    #[serde(rename = "image")]
    Image { id: String, url: String, alt: String },

    /// An asset could not be produced; still renders as a placeholder slot.
    #[serde(rename = "error")]
    Error { id: String, content: String },

    #[serde(rename = "quizHeading")]
    QuizHeading { id: String, content: String },

    #[serde(rename = "multipleChoiceQuestion")]
    MultipleChoiceQuestion {
        id: String,
        content: String,
        options: Vec<QuizOption>,
        #[serde(rename = "correctAnswerID")]
        correct_answer_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl ContentBlock {
    pub fn heading(content: impl Into<String>) -> Self {
        Self::Heading {
            id: new_id(),
            content: content.into(),
        }
    }

    pub fn paragraph(content: impl Into<String>) -> Self {
        Self::Paragraph {
            id: new_id(),
            content: content.into(),
        }
    }

    pub fn image(url: impl Into<String>, alt: impl Into<String>) -> Self {
        Self::Image {
            id: new_id(),
            url: url.into(),
            alt: alt.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            id: new_id(),
            content: content.into(),
        }
    }

    pub fn quiz_heading(content: impl Into<String>) -> Self {
        Self::QuizHeading {
            id: new_id(),
            content: content.into(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Heading { id, .. }
            | Self::Paragraph { id, .. }
            | Self::Image { id, .. }
            | Self::Error { id, .. }
            | Self::QuizHeading { id, .. }
            | Self::MultipleChoiceQuestion { id, .. } => id,
        }
    }

    /// Whether this block carries readable text content (as opposed to an
    /// image slot or an asset-failure marker).
    pub fn is_textual(&self) -> bool {
        match self {
            Self::Heading { content, .. }
            | Self::Paragraph { content, .. }
            | Self::QuizHeading { content, .. } => !content.trim().is_empty(),
            Self::MultipleChoiceQuestion { content, .. } => !content.trim().is_empty(),
            Self::Image { .. } | Self::Error { .. } => false,
        }
    }

    /// Whether this block should survive final assembly.
    pub fn is_renderable(&self) -> bool {
        match self {
            Self::Image { .. } => true,
            Self::Error { content, .. } => !content.trim().is_empty(),
            _ => self.is_textual(),
        }
    }
}
