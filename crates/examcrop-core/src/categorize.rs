//! Conservative fallback categorization of text blocks.
//!
//! Categories supplied by an external categorizer are authoritative; these
//! heuristics only fill blocks that arrive without one, and leave a block
//! uncategorized whenever the text is ambiguous.

use std::sync::LazyLock;

use regex::Regex;

use crate::layout::{BlockCategory, TextBlock};

/// Leading choice letter or number: `A`, `B.`, `(c)`, `1)`, `D) 25 cm`.
static CHOICE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\(?([A-Ha-h]|[1-9])\s*(?:[.)](?:\s|$)|$)").expect("valid choice label regex")
});

/// Words that make "Part A" / "Parte B" style headings look like labels.
static PART_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(part|parte|section|sección|seccion)\b").expect("valid heading regex")
});

static CAPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(figure|figura|fig\.|table|tabla|gr[aá]fico|diagrama|imagen)\b")
        .expect("valid caption regex")
});

/// Return the choice letter of a label block (`"A"`, `"3"`), or `None` if
/// the text is not a short leading-letter/number label.
pub fn choice_label_letter(text: &str) -> Option<String> {
    if PART_HEADING.is_match(text) {
        return None;
    }
    let caps = CHOICE_LABEL.captures(text)?;
    let letter = caps.get(1)?.as_str().to_uppercase();
    // A bare capital "A" followed by prose ("A car travels...") is a sentence.
    let rest = &text[caps.get(0)?.end()..];
    let bare = !caps.get(0)?.as_str().trim_end().ends_with(['.', ')']);
    if bare && !rest.trim().is_empty() {
        return None;
    }
    // "1. Which of the following..." is a numbered question stem.
    if letter.starts_with(|c: char| c.is_ascii_digit()) && rest.split_whitespace().count() > 3 {
        return None;
    }
    Some(letter)
}

/// Whether a block's text looks like a short diagram label rather than prose.
pub fn looks_like_diagram_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    let words = trimmed.split_whitespace().count();
    let chars = trimmed.chars().count();
    let sentence_end = trimmed.ends_with(['.', '?', '!', ':']) && words > 2;
    words <= 4 && chars <= 30 && !sentence_end && trimmed.chars().any(|c| c.is_alphanumeric())
}

/// Guess a category from the text alone.
pub fn infer_category(text: &str) -> Option<BlockCategory> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if choice_label_letter(trimmed).is_some() {
        return Some(BlockCategory::AnswerChoice);
    }
    if CAPTION.is_match(trimmed) {
        return Some(BlockCategory::VisualContentTitle);
    }
    let words = trimmed.split_whitespace().count();
    if words >= 6 || trimmed.chars().count() >= 40 {
        return Some(BlockCategory::QuestionText);
    }
    if looks_like_diagram_text(trimmed) {
        return Some(BlockCategory::VisualContentLabel);
    }
    None
}

/// Fill in missing categories in place. Returns how many blocks were filled.
pub fn categorize_blocks(blocks: &mut [TextBlock]) -> usize {
    let mut filled = 0;
    for block in blocks.iter_mut().filter(|b| b.category.is_none()) {
        block.category = infer_category(&block.text);
        if block.category.is_some() {
            filled += 1;
        }
    }
    filled
}
