//! Structural validation of a segment set.
//!
//! Provides [`validate_segmentation`], which runs before any geometry work
//! and produces an immutable [`SegmentationReport`]. Findings are advisory
//! [`ValidationIssue`]s with a [`Severity`]; nothing here fails.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::segment::{Segment, SegmentId, SegmentRole};

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Expected by the test profile, reported for completeness.
    Info,
    /// Suspicious, but processing can go on.
    Warning,
    /// Structural problem likely to produce wrong output.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A finding about the segment set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Machine-readable issue code (e.g., "NUMBERING_GAP", "OVERSIZED_SEGMENT").
    pub code: String,
    pub message: String,
    /// Segment id the issue is about, if any.
    pub location: Option<String>,
}

impl ValidationIssue {
    pub fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            location: Some(location.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(ref loc) = self.location {
            write!(f, " (at {loc})")?;
        }
        Ok(())
    }
}

/// What a test type promises about its question numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestProfile {
    pub name: String,
    /// Number of questions a complete exam has, if fixed.
    pub expected_questions: Option<usize>,
    /// Question numbers run 1..=N without holes. Partial-selection tests
    /// skip numbers on purpose.
    pub sequential: bool,
}

impl TestProfile {
    pub fn invierno() -> Self {
        Self {
            name: "invierno".to_string(),
            expected_questions: Some(65),
            sequential: true,
        }
    }

    pub fn regular() -> Self {
        Self {
            name: "regular".to_string(),
            expected_questions: Some(65),
            sequential: true,
        }
    }

    pub fn seleccion() -> Self {
        Self {
            name: "seleccion".to_string(),
            expected_questions: None,
            sequential: false,
        }
    }

    /// Look up a built-in profile by name (case-insensitive).
    pub fn builtin(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "invierno" => Some(Self::invierno()),
            "regular" => Some(Self::regular()),
            "seleccion" | "selección" => Some(Self::seleccion()),
            _ => None,
        }
    }
}

impl Default for TestProfile {
    fn default() -> Self {
        Self::regular()
    }
}

/// Configuration for [`validate_segmentation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorOptions {
    /// Segments spanning more pages than this are flagged. Default: 5.
    pub max_pages: usize,
    /// Below this fraction of the expected count the shortfall is an error.
    /// Default: 0.7.
    pub low_count_ratio: f64,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            max_pages: 5,
            low_count_ratio: 0.7,
        }
    }
}

/// Outcome of comparing the question count with the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CountCheck {
    /// The profile has no fixed question count.
    NotApplicable { found: usize },
    /// Far fewer questions than expected; segmentation likely failed.
    AnomalouslyLow { expected: usize, found: usize },
    Missing { expected: usize, found: usize, missing: usize },
    Exact { expected: usize },
    /// More questions than expected; likely over-segmentation.
    Excess { expected: usize, found: usize, extra: usize },
}

impl CountCheck {
    pub fn evaluate(found: usize, expected: Option<usize>, low_ratio: f64) -> Self {
        let Some(expected) = expected else {
            return CountCheck::NotApplicable { found };
        };
        if found == expected {
            CountCheck::Exact { expected }
        } else if found > expected {
            CountCheck::Excess {
                expected,
                found,
                extra: found - expected,
            }
        } else if (found as f64) < expected as f64 * low_ratio {
            CountCheck::AnomalouslyLow { expected, found }
        } else {
            CountCheck::Missing {
                expected,
                found,
                missing: expected - found,
            }
        }
    }

    fn issue(&self) -> Option<ValidationIssue> {
        match *self {
            CountCheck::NotApplicable { .. } | CountCheck::Exact { .. } => None,
            CountCheck::AnomalouslyLow { expected, found } => Some(ValidationIssue::new(
                Severity::Error,
                "COUNT_ANOMALOUSLY_LOW",
                format!("found {found} of {expected} expected questions"),
            )),
            CountCheck::Missing {
                expected, missing, ..
            } => Some(ValidationIssue::new(
                Severity::Warning,
                "COUNT_MISSING",
                format!("{missing} of {expected} expected questions missing"),
            )),
            CountCheck::Excess {
                expected, extra, ..
            } => Some(ValidationIssue::new(
                Severity::Warning,
                "COUNT_EXCESS",
                format!("{extra} more questions than the {expected} expected"),
            )),
        }
    }
}

/// A segment spanning more pages than allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OversizedSegment {
    pub id: String,
    pub pages: usize,
}

/// Result of validating one document's segment set. Built once, read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationReport {
    profile: String,
    question_numbers: Vec<u32>,
    numbering_gaps: Vec<u32>,
    gaps_expected: bool,
    oversized: Vec<OversizedSegment>,
    count: CountCheck,
    issues: Vec<ValidationIssue>,
}

impl SegmentationReport {
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Sorted, de-duplicated question numbers.
    pub fn question_numbers(&self) -> &[u32] {
        &self.question_numbers
    }

    pub fn numbering_gaps(&self) -> &[u32] {
        &self.numbering_gaps
    }

    /// Gaps are informational for the profile rather than errors.
    pub fn gaps_expected(&self) -> bool {
        self.gaps_expected
    }

    pub fn oversized(&self) -> &[OversizedSegment] {
        &self.oversized
    }

    pub fn count(&self) -> CountCheck {
        self.count
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(ValidationIssue::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_warning())
    }
}

/// Most missing numbers one report lists.
pub const MAX_REPORTED_GAPS: usize = 200;

/// Missing integers between the smallest and largest number, ascending,
/// at most [`MAX_REPORTED_GAPS`] of them.
pub fn find_numbering_gaps(numbers: &[u32]) -> Vec<u32> {
    let present: BTreeSet<u32> = numbers.iter().copied().collect();
    present
        .iter()
        .zip(present.iter().skip(1))
        .flat_map(|(&a, &b)| a + 1..b)
        .take(MAX_REPORTED_GAPS)
        .collect()
}

/// Validate a segment set against a test profile.
///
/// `page_count`, when known, enables the page-range check.
pub fn validate_segmentation(
    segments: &[Segment],
    page_count: Option<usize>,
    profile: &TestProfile,
    options: &ValidatorOptions,
) -> SegmentationReport {
    let mut issues = Vec::new();

    let mut ids: HashMap<&str, usize> = HashMap::new();
    for segment in segments {
        *ids.entry(segment.id.as_str()).or_default() += 1;
    }
    let mut duplicated: Vec<&str> = ids.iter().filter(|&(_, &n)| n > 1).map(|(id, _)| *id).collect();
    duplicated.sort_unstable();
    for id in duplicated {
        issues.push(ValidationIssue::with_location(
            Severity::Error,
            "DUPLICATE_ID",
            format!("id {id} is used {} times", ids[id]),
            id,
        ));
    }

    for segment in segments {
        let id = segment.id.as_str();
        match SegmentId::parse(id) {
            Some(parsed) if parsed.role == segment.role => {}
            _ => issues.push(ValidationIssue::with_location(
                Severity::Warning,
                "MALFORMED_ID",
                format!("id {id:?} does not match the pattern for a {:?} segment", segment.role),
                id,
            )),
        }

        let mut seen = HashSet::new();
        if segment.page_nums.is_empty() {
            issues.push(ValidationIssue::with_location(
                Severity::Error,
                "EMPTY_PAGE_LIST",
                "segment lists no pages",
                id,
            ));
        } else if !segment.page_nums.iter().all(|p| seen.insert(*p)) {
            issues.push(ValidationIssue::with_location(
                Severity::Error,
                "DUPLICATE_PAGE",
                format!("page list {:?} repeats a page", segment.page_nums),
                id,
            ));
        }

        let beyond: Vec<usize> = segment
            .page_nums
            .iter()
            .copied()
            .filter(|&p| p == 0 || page_count.is_some_and(|n| p > n))
            .collect();
        if !beyond.is_empty() {
            issues.push(ValidationIssue::with_location(
                Severity::Error,
                "PAGE_OUT_OF_RANGE",
                format!("pages {beyond:?} are outside the document"),
                id,
            ));
        }

        for reference in &segment.references {
            let known = segments
                .iter()
                .any(|s| s.role == SegmentRole::Reference && &s.id == reference);
            if !known {
                issues.push(ValidationIssue::with_location(
                    Severity::Warning,
                    "DANGLING_REFERENCE",
                    format!("reference {reference} is not defined"),
                    id,
                ));
            }
        }

        if segment.is_question() && segment.multi_page != (segment.page_nums.len() > 1) {
            issues.push(ValidationIssue::with_location(
                Severity::Warning,
                "MULTI_PAGE_MISMATCH",
                format!(
                    "multi_page is {} but {} pages are listed",
                    segment.multi_page,
                    segment.page_nums.len()
                ),
                id,
            ));
        }
    }

    let oversized: Vec<OversizedSegment> = segments
        .iter()
        .filter(|s| s.page_nums.len() > options.max_pages)
        .map(|s| OversizedSegment {
            id: s.id.clone(),
            pages: s.page_nums.len(),
        })
        .collect();
    for o in &oversized {
        issues.push(ValidationIssue::with_location(
            Severity::Warning,
            "OVERSIZED_SEGMENT",
            format!(
                "spans {} pages (max {}); likely two merged segments",
                o.pages, options.max_pages
            ),
            o.id.clone(),
        ));
    }

    let mut question_numbers: Vec<u32> = segments.iter().filter_map(Segment::question_number).collect();
    question_numbers.sort_unstable();
    question_numbers.dedup();
    let numbering_gaps = find_numbering_gaps(&question_numbers);
    if !numbering_gaps.is_empty() {
        let severity = if profile.sequential {
            Severity::Error
        } else {
            Severity::Info
        };
        issues.push(ValidationIssue::new(
            severity,
            "NUMBERING_GAP",
            if numbering_gaps.len() == MAX_REPORTED_GAPS {
                format!("question numbers missing: {numbering_gaps:?} and more")
            } else {
                format!("question numbers missing: {numbering_gaps:?}")
            },
        ));
    }

    let found = segments.iter().filter(|s| s.is_question()).count();
    let count = CountCheck::evaluate(found, profile.expected_questions, options.low_count_ratio);
    issues.extend(count.issue());

    SegmentationReport {
        profile: profile.name.clone(),
        question_numbers,
        numbering_gaps,
        gaps_expected: !profile.sequential,
        oversized,
        count,
        issues,
    }
}
