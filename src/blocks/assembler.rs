//! Final document assembly: order-preserving merge plus the non-empty-result
//! invariant.

use tracing::warn;

use super::ContentBlock;

/// Drop unrenderable blocks and guarantee at least one renderable block in
/// the result. If parsing produced nothing readable, the entire remaining
/// source text becomes a single paragraph; failing even that, a single error
/// block is returned.
pub fn finalize(blocks: Vec<ContentBlock>, fallback_text: &str) -> Vec<ContentBlock> {
    let mut surviving: Vec<ContentBlock> = blocks.into_iter().filter(|b| b.is_renderable()).collect();

    let has_text = surviving.iter().any(|b| b.is_textual());
    if !has_text && !fallback_text.trim().is_empty() {
        warn!("no textual blocks parsed; falling back to a single paragraph");
        surviving.push(ContentBlock::paragraph(fallback_text.trim()));
    }

    if surviving.is_empty() {
        warn!("parsing produced zero renderable blocks");
        surviving.push(ContentBlock::error(
            "Failed to parse content into a readable format. The response might be empty or unparsable.",
        ));
    }

    surviving
}
