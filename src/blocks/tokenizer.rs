//! Line-oriented state machine that classifies a placeholder-free text
//! fragment into headings, paragraphs and quiz blocks.
//!
//! Malformed quiz syntax never raises: a numbered line whose lookahead fails
//! the question contract degrades to plain paragraph prose.

use std::collections::HashMap;

use regex::Regex;
use uuid::Uuid;

use super::{ContentBlock, QuizOption};

/// Where the bounded question lookahead currently is. The states exist so
/// each transition can be reasoned about (and tested) on its own instead of
/// being buried inside one lookahead regex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookaheadState {
    CollectingOptions,
    AwaitingAnswer,
    AwaitingExplanation,
}

pub struct Tokenizer {
    question_start: Regex,
    option: Regex,
    correct_answer: Regex,
    explanation: Regex,
    quiz_heading: Regex,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            question_start: Regex::new(r"^\d+\.\s*(.+)$").unwrap(),
            option: Regex::new(r"(?i)^([a-z])\)\s*(.+)$").unwrap(),
            correct_answer: Regex::new(r"(?i)^Correct Answer:\s*([a-z])$").unwrap(),
            explanation: Regex::new(r"(?i)^Explanation:\s*(.+)$").unwrap(),
            quiz_heading: Regex::new(r"(?i)^(?:Quiz Time|Test Your Knowledge)[!?]?$").unwrap(),
        }
    }

    /// Tokenize one contiguous text fragment into blocks. Blank lines act as
    /// paragraph-flush boundaries.
    pub fn tokenize(&self, fragment: &str) -> Vec<ContentBlock> {
        let lines: Vec<&str> = fragment.split('\n').map(str::trim).collect();
        let mut blocks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        let mut idx = 0;

        while idx < lines.len() {
            let line = lines[idx];

            if line.is_empty() {
                flush_paragraph(&mut pending, &mut blocks);
                idx += 1;
                continue;
            }

            if let Some(inner) = bold_wrapped(line) {
                flush_paragraph(&mut pending, &mut blocks);
                if self.quiz_heading.is_match(inner) {
                    let title = inner.trim_matches(|c| c == '!' || c == '?' || c == ' ');
                    blocks.push(ContentBlock::quiz_heading(title));
                } else {
                    blocks.push(ContentBlock::heading(inner));
                }
                idx += 1;
                continue;
            }

            if self.question_start.is_match(line) {
                flush_paragraph(&mut pending, &mut blocks);
                match self.try_parse_question(&lines, idx) {
                    Some((block, next)) => {
                        blocks.push(block);
                        idx = next;
                    }
                    None => {
                        // Lookahead failed the question contract: keep the
                        // line as prose and re-evaluate everything after it
                        // as ordinary lines.
                        pending.push(line);
                        idx += 1;
                    }
                }
                continue;
            }

            pending.push(line);
            idx += 1;
        }

        flush_paragraph(&mut pending, &mut blocks);
        blocks
    }

    /// Bounded lookahead starting at a `N.` line. Succeeds only with at
    /// least one option and a correct-answer letter that maps to one of the
    /// collected options; returns the block and the index just past the
    /// consumed lines.
    fn try_parse_question(&self, lines: &[&str], start: usize) -> Option<(ContentBlock, usize)> {
        let caps = self.question_start.captures(lines[start])?;
        let question_text = caps[1].trim().to_string();
        if question_text.is_empty() {
            return None;
        }

        let mut state = LookaheadState::CollectingOptions;
        let mut options: Vec<QuizOption> = Vec::new();
        // Last-one-wins for the answer lookup; rendering keeps every option.
        let mut letter_ids: HashMap<char, String> = HashMap::new();
        let mut correct_id: Option<String> = None;
        let mut explanation: Option<String> = None;
        let mut idx = start + 1;

        while idx < lines.len() {
            match state {
                LookaheadState::CollectingOptions => {
                    // Blank lines between options are tolerated, but only
                    // consumed when another option actually follows.
                    let mut probe = idx;
                    while probe < lines.len() && lines[probe].is_empty() {
                        probe += 1;
                    }
                    match lines.get(probe).and_then(|l| self.option.captures(l)) {
                        Some(caps) => {
                            let letter = caps[1].to_lowercase().chars().next()?;
                            let id = format!("opt-{}-{}", letter, &Uuid::new_v4().simple().to_string()[..6]);
                            letter_ids.insert(letter, id.clone());
                            options.push(QuizOption {
                                id,
                                text: caps[2].trim().to_string(),
                            });
                            idx = probe + 1;
                        }
                        None => state = LookaheadState::AwaitingAnswer,
                    }
                }
                LookaheadState::AwaitingAnswer => {
                    // Policy: at most one blank line before the answer.
                    let probe = skip_one_blank(lines, idx);
                    let caps = lines.get(probe).and_then(|l| self.correct_answer.captures(l))?;
                    let letter = caps[1].to_lowercase().chars().next()?;
                    correct_id = Some(letter_ids.get(&letter)?.clone());
                    idx = probe + 1;
                    state = LookaheadState::AwaitingExplanation;
                }
                LookaheadState::AwaitingExplanation => {
                    // Same single-blank tolerance; the explanation itself is
                    // optional.
                    let probe = skip_one_blank(lines, idx);
                    if let Some(caps) = lines.get(probe).and_then(|l| self.explanation.captures(l)) {
                        explanation = Some(caps[1].trim().to_string());
                        idx = probe + 1;
                    }
                    break;
                }
            }
        }

        let correct_answer_id = correct_id?;
        if options.is_empty() {
            return None;
        }
        Some((
            ContentBlock::MultipleChoiceQuestion {
                id: Uuid::new_v4().to_string(),
                content: question_text,
                options,
                correct_answer_id,
                explanation,
            },
            idx,
        ))
    }
}

fn bold_wrapped(line: &str) -> Option<&str> {
    let inner = line.strip_prefix("**")?.strip_suffix("**")?;
    let inner = inner.trim();
    (!inner.is_empty()).then_some(inner)
}

fn skip_one_blank(lines: &[&str], idx: usize) -> usize {
    if idx < lines.len() && lines[idx].is_empty() {
        idx + 1
    } else {
        idx
    }
}

fn flush_paragraph(pending: &mut Vec<&str>, blocks: &mut Vec<ContentBlock>) {
    if pending.is_empty() {
        return;
    }
    let content = pending.join("\n").trim().to_string();
    pending.clear();
    if !content.is_empty() {
        blocks.push(ContentBlock::paragraph(content));
    }
}
