//! Deterministic acceptance rules for assembled question files.
//!
//! Rules run in a fixed order (`single_page`, `has_content`,
//! `question_number_match`) and the first failing rule is reported.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Configuration for [`check_acceptance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceOptions {
    /// Require exactly one page. Default: false.
    pub strict_single_page: bool,
    /// Require the expected question number in the text. Default: false.
    pub check_question_number: bool,
    /// Minimum trimmed text length when the file has no images. Default: 20.
    pub min_content_chars: usize,
}

impl Default for AcceptanceOptions {
    fn default() -> Self {
        Self {
            strict_single_page: false,
            check_question_number: false,
            min_content_chars: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceRule {
    SinglePage,
    HasContent,
    QuestionNumberMatch,
}

impl AcceptanceRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptanceRule::SinglePage => "single_page",
            AcceptanceRule::HasContent => "has_content",
            AcceptanceRule::QuestionNumberMatch => "question_number_match",
        }
    }
}

impl fmt::Display for AcceptanceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed acceptance rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub rule: AcceptanceRule,
    pub message: String,
}

impl Rejection {
    fn new(rule: AcceptanceRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule, self.message)
    }
}

/// What the rules need to know about an assembled file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContent {
    pub page_count: usize,
    /// Visible text in reading order, pages separated by newlines.
    pub text: String,
    /// Text of the question's own pages, without the shared reference
    /// pages assembled in front of them. The number rule reads only this.
    #[serde(default)]
    pub question_text: String,
    pub image_count: usize,
}

/// Outcome of looking for a question number in extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberMatch {
    Found,
    /// Another number sits where the question number should be.
    Different(u32),
    NotFound,
}

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*[.)]").expect("valid leading number regex"));

static PROMINENT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*(?:(\d+)\s*[.)](?:\s|$)|pregunta\s+(\d+)\b)")
        .expect("valid prominent number regex")
});

fn number_patterns(n: u32) -> [String; 4] {
    [
        format!(r"(?m)^\s*{n}\s*[.)]"),
        format!(r"(?i)\bpregunta\s+{n}\b"),
        format!(r"#\s*{n}\b"),
        format!(r"(?:^|[^\d]){n}\.(?:[^\d]|$)"),
    ]
}

/// Look for `expected` in `text`.
///
/// A number at the start of the first non-empty line decides on its own.
/// Otherwise any of `^N.`, `^N)`, `Pregunta N`, `#N` or `N.` counts, and
/// failing that a numbered line or `Pregunta M` elsewhere is reported as
/// [`NumberMatch::Different`].
pub fn find_question_number(text: &str, expected: u32) -> NumberMatch {
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if let Some(n) = LEADING_NUMBER
        .captures(first_line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        return if n == expected {
            NumberMatch::Found
        } else {
            NumberMatch::Different(n)
        };
    }

    let found = number_patterns(expected)
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .any(|re| re.is_match(text));
    if found {
        return NumberMatch::Found;
    }

    PROMINENT_NUMBER
        .captures_iter(text)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .find(|&n| n != expected)
        .map_or(NumberMatch::NotFound, NumberMatch::Different)
}

/// Apply the acceptance rules. `expected_number` is the question number to
/// look for; `None` skips the number rule.
pub fn check_acceptance(
    content: &AssembledContent,
    expected_number: Option<u32>,
    options: &AcceptanceOptions,
) -> Result<(), Rejection> {
    if options.strict_single_page && content.page_count != 1 {
        return Err(Rejection::new(
            AcceptanceRule::SinglePage,
            format!("expected exactly 1 page, found {}", content.page_count),
        ));
    }

    let chars = content.text.trim().chars().count();
    if chars < options.min_content_chars && content.image_count == 0 {
        return Err(Rejection::new(
            AcceptanceRule::HasContent,
            format!(
                "only {chars} characters of text and no images (need {})",
                options.min_content_chars
            ),
        ));
    }

    if let (true, Some(expected)) = (options.check_question_number, expected_number) {
        match find_question_number(&content.question_text, expected) {
            NumberMatch::Found => {}
            NumberMatch::Different(found) => {
                return Err(Rejection::new(
                    AcceptanceRule::QuestionNumberMatch,
                    format!("expected question {expected}, found question {found}"),
                ));
            }
            NumberMatch::NotFound => {
                return Err(Rejection::new(
                    AcceptanceRule::QuestionNumberMatch,
                    format!("question number {expected} not found"),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(text: &str, pages: usize, images: usize) -> AssembledContent {
        AssembledContent {
            page_count: pages,
            text: text.to_string(),
            question_text: text.to_string(),
            image_count: images,
        }
    }

    fn strict() -> AcceptanceOptions {
        AcceptanceOptions {
            strict_single_page: true,
            check_question_number: true,
            ..AcceptanceOptions::default()
        }
    }

    #[test]
    fn first_line_number_has_priority() {
        assert_eq!(find_question_number("12. ¿Cuánto es 3 + 4?", 12), NumberMatch::Found);
        assert_eq!(find_question_number("\n  12) Calcule", 12), NumberMatch::Found);
        assert_eq!(
            find_question_number("13. Calcule\nver pregunta 12", 12),
            NumberMatch::Different(13)
        );
    }

    #[test]
    fn other_patterns_are_searched() {
        assert_eq!(find_question_number("PREGUNTA 7\nTexto", 7), NumberMatch::Found);
        assert_eq!(find_question_number("Ítem #7 del bloque", 7), NumberMatch::Found);
        assert_eq!(find_question_number("Lea el texto\n7. ¿Qué dice?", 7), NumberMatch::Found);
        assert_eq!(find_question_number("Lea el texto, luego 7. responda", 7), NumberMatch::Found);
    }

    #[test]
    fn decimals_and_longer_numbers_do_not_match() {
        assert_eq!(find_question_number("El valor es 7.5 metros", 7), NumberMatch::NotFound);
        assert_eq!(find_question_number("Lea el texto #17", 7), NumberMatch::NotFound);
        assert_eq!(find_question_number("Lea\n17. responda", 7), NumberMatch::Different(17));
    }

    #[test]
    fn number_rule_ignores_reference_text() {
        let c = AssembledContent {
            page_count: 2,
            text: "1. En el siglo XIX la ciudad crecio\n6. Segun el texto, por que crecio la ciudad\n".to_string(),
            question_text: "6. Segun el texto, por que crecio la ciudad\n".to_string(),
            image_count: 0,
        };
        let options = AcceptanceOptions {
            check_question_number: true,
            ..AcceptanceOptions::default()
        };
        assert_eq!(check_acceptance(&c, Some(6), &options), Ok(()));
        assert!(check_acceptance(&c, Some(1), &options).is_err());
    }

    #[test]
    fn accepts_question_with_text() {
        let c = content("4. ¿Cuál es el perímetro del cuadrado?", 1, 0);
        assert_eq!(check_acceptance(&c, Some(4), &strict()), Ok(()));
    }

    #[test]
    fn single_page_rule_is_optional() {
        let c = content("4. ¿Cuál es el perímetro del cuadrado?", 2, 0);
        let err = check_acceptance(&c, Some(4), &strict()).unwrap_err();
        assert_eq!(err.rule, AcceptanceRule::SinglePage);
        assert_eq!(check_acceptance(&c, Some(4), &AcceptanceOptions::default()), Ok(()));
    }

    #[test]
    fn empty_files_are_rejected_unless_they_have_images() {
        let err = check_acceptance(&content("  4.  ", 1, 0), Some(4), &strict()).unwrap_err();
        assert_eq!(err.rule, AcceptanceRule::HasContent);
        assert_eq!(err.to_string(), "has_content: only 2 characters of text and no images (need 20)");

        let with_image = content("4.", 1, 1);
        assert_eq!(check_acceptance(&with_image, Some(4), &strict()), Ok(()));
    }

    #[test]
    fn wrong_number_reports_both() {
        let c = content("5. ¿Cuál es el perímetro del cuadrado?", 1, 0);
        let err = check_acceptance(&c, Some(4), &strict()).unwrap_err();
        assert_eq!(err.rule, AcceptanceRule::QuestionNumberMatch);
        assert_eq!(err.message, "expected question 4, found question 5");

        let missing = content("¿Cuál es el perímetro del cuadrado?", 1, 0);
        let err = check_acceptance(&missing, Some(4), &strict()).unwrap_err();
        assert_eq!(err.message, "question number 4 not found");
    }
}
