//! Placeholder scanner: splits raw model text into an ordered sequence of
//! literal text spans and recognized image directives.

use regex::Regex;

/// What kind of asset a directive asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// `[Image: …]`, recognized anywhere in the text.
    Image,
    /// `[GhibliImage: …]`, recognized only as the first non-whitespace
    /// content of the document.
    GhibliImage,
}

/// An extracted inline directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub prompt: String,
    /// Byte offsets of the matched directive in the original text.
    pub span: (usize, usize),
}

/// One piece of the scanned document, in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    Placeholder(Placeholder),
}

pub struct Scanner {
    lead_directive: Regex,
    image_directive: Regex,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            lead_directive: Regex::new(r"(?i)^\[GhibliImage:\s*(.*?)\s*\]\r?\n?").unwrap(),
            image_directive: Regex::new(r"(?i)\[Image:\s*(.*?)\s*\]").unwrap(),
        }
    }

    /// Split `text` into fragments covering the entire string, in order,
    /// with no gaps or overlaps. Concatenating the text fragments yields the
    /// original input minus exactly the matched directive spans.
    ///
    /// A `[GhibliImage: …]` tag is honored only when it is the first
    /// non-whitespace content; any later occurrence is not a directive and
    /// passes through as literal text.
    pub fn scan(&self, text: &str) -> Vec<Fragment> {
        let mut fragments = Vec::new();

        let lead_offset = text.len() - text.trim_start().len();
        let mut remainder = text.to_string();
        // Offset correction for spans that land after a removed lead tag.
        let mut removed = (0, 0);
        if let Some(caps) = self.lead_directive.captures(&text[lead_offset..]) {
            let whole = caps.get(0).unwrap();
            let span = (lead_offset + whole.start(), lead_offset + whole.end());
            fragments.push(Fragment::Placeholder(Placeholder {
                kind: PlaceholderKind::GhibliImage,
                prompt: caps[1].trim().to_string(),
                span,
            }));
            let mut rest = String::with_capacity(text.len() - (span.1 - span.0));
            rest.push_str(&text[..span.0]);
            rest.push_str(&text[span.1..]);
            remainder = rest;
            removed = (span.0, span.1 - span.0);
        }
        let original_span = |start: usize, end: usize| {
            if start >= removed.0 {
                (start + removed.1, end + removed.1)
            } else {
                (start, end)
            }
        };

        let mut last = 0;
        for caps in self.image_directive.captures_iter(&remainder) {
            let whole = caps.get(0).unwrap();
            if whole.start() > last {
                fragments.push(Fragment::Text(remainder[last..whole.start()].to_string()));
            }
            fragments.push(Fragment::Placeholder(Placeholder {
                kind: PlaceholderKind::Image,
                prompt: caps[1].trim().to_string(),
                span: original_span(whole.start(), whole.end()),
            }));
            last = whole.end();
        }
        if last < remainder.len() {
            fragments.push(Fragment::Text(remainder[last..].to_string()));
        }

        fragments
    }
}
