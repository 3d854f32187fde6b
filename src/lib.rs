//! # Minerva Content Engine
//!
//! Turns unstructured generative-model output into structured, accessible
//! learning documents. The engine is built around two subsystems:
//! - `blocks`: parses raw model text into an ordered document model
//!   (headings, paragraphs, images, quizzes), resolving inline image
//!   placeholders along the way.
//! - `recovery`: coerces unreliable, frequently malformed JSON output into
//!   typed records (flashcards, slides, comic scripts, lectures) through a
//!   layered repair ladder that always yields a usable value.
//!
//! ## Architecture
//!
//! ```text
//! model text → blocks::scanner → blocks::tokenizer ┐
//!                             └→ media::resolver   ┴→ blocks::assembler → document
//!
//! model JSON → recovery::ladder → recovery::records → typed result
//! ```
//!
//! All collaborators (text/image/speech generation, blob storage,
//! notifications) sit behind traits in `media::backends` and `storage`, so
//! the pipelines can be exercised end to end with in-memory fakes.

pub mod blocks;
pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod pipeline;
pub mod recovery;
pub mod storage;

pub use blocks::ContentBlock;
pub use config::EngineConfig;
pub use error::EngineError;
pub use pipeline::ContentEngine;
pub use recovery::Recovered;
