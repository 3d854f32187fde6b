//! Engine-level errors. Most failures inside the pipelines are downgraded to
//! degraded-but-valid output; the variants here are the ones that genuinely
//! cannot be.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The text backend produced nothing usable for the primary content
    /// body. This is the one document-level failure: there is no degraded
    /// form to fall back to.
    #[error("text generation returned no usable content")]
    EmptyGeneration,

    #[error("prompt rejected by safety filter: {0}")]
    UnsafePrompt(String),

    #[error("generation backend error: {0}")]
    Backend(#[from] crate::media::backends::GenerateError),
}
