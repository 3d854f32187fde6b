//! Prompt safety filter for explicit image-generation requests.

use super::prompt::ReadingLevel;

const BLOCKED_TERMS: &[&str] = &[
    "violence", "gore", "explicit", "nude", "naked", "blood", "weapon",
    "drug", "alcohol", "tobacco", "gambling", "hate", "discrimination",
];

const BEGINNER_BLOCKED_TERMS: &[&str] = &["scary", "frightening", "horror"];

/// Whether a prompt is acceptable to send to the image backend. The
/// youngest reading level additionally blocks frightening themes.
pub fn is_safe_prompt(prompt: &str, level: ReadingLevel) -> bool {
    let prompt_lower = prompt.to_lowercase();
    if BLOCKED_TERMS.iter().any(|term| prompt_lower.contains(term)) {
        return false;
    }
    if level == ReadingLevel::Beginner
        && BEGINNER_BLOCKED_TERMS
            .iter()
            .any(|term| prompt_lower.contains(term))
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_listed_terms() {
        assert!(!is_safe_prompt("a scene with blood", ReadingLevel::Moderate));
        assert!(is_safe_prompt("a quiet meadow", ReadingLevel::Moderate));
    }

    #[test]
    fn beginner_level_is_stricter() {
        assert!(!is_safe_prompt("a scary forest", ReadingLevel::Beginner));
        assert!(is_safe_prompt("a scary forest", ReadingLevel::Intermediate));
    }
}
