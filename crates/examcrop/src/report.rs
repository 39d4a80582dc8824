//! JSON artifacts written next to the produced question files.

use std::collections::BTreeMap;
use std::path::Path;

use examcrop_core::{
    BBox, GeometryError, GeometryOutcome, PlacedSegment, Segment, SegmentKind, SegmentRole,
};
use serde::{Deserialize, Serialize};

use crate::error::ExamcropError;

pub const QUESTIONS_DIR: &str = "questions";
pub const FAILED_DIR: &str = "failed_questions";
pub const FAILED_LOG: &str = "failed_questions_log.json";
pub const STATISTICS_FILE: &str = "processing_statistics.json";
pub const QUESTIONS_LIST: &str = "questions_list.json";
pub const GEOMETRY_FILE: &str = "segments_with_bboxes.json";

/// One entry of `failed_questions_log.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedQuestion {
    pub question_id: String,
    pub pdf_name: String,
    pub reason: String,
}

/// Where a question ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Accepted,
    /// Produced but failed an acceptance rule.
    Rejected,
    /// No file could be produced.
    Failed,
    /// Geometry could not be resolved.
    Skipped,
}

/// A per-choice file written next to an accepted question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceFile {
    pub letter: String,
    pub page: usize,
    pub bbox: BBox,
    pub pdf: String,
}

/// One entry of `questions_list.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub id: String,
    pub text: String,
    pub pages: Vec<usize>,
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub references: Vec<String>,
    pub status: QuestionStatus,
    /// Output file relative to the part's output directory.
    pub pdf: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceFile>,
}

impl QuestionEntry {
    pub fn new(segment: &Segment, status: QuestionStatus, pdf: Option<String>) -> Self {
        Self {
            id: segment.id.clone(),
            text: segment.text.clone(),
            pages: segment.page_nums.clone(),
            kind: segment.kind,
            references: segment.references.clone(),
            status,
            pdf,
            choices: Vec::new(),
        }
    }
}

/// `processing_statistics.json`: counts over the segment set and outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatistics {
    pub total_segments: usize,
    pub questions: usize,
    pub references: usize,
    pub unrelated: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Segments per type.
    pub by_type: BTreeMap<String, usize>,
    /// Segments touching each page.
    pub by_page: BTreeMap<usize, usize>,
    /// Segments per number of pages spanned.
    pub by_page_span: BTreeMap<usize, usize>,
    /// Questions per number of shared references.
    pub by_reference_depth: BTreeMap<usize, usize>,
}

impl ProcessingStatistics {
    /// Count the segment set. Outcome counters start at zero.
    pub fn from_segments(segments: &[Segment]) -> Self {
        let mut stats = Self {
            total_segments: segments.len(),
            ..Self::default()
        };
        for segment in segments {
            match segment.role {
                SegmentRole::Question => {
                    stats.questions += 1;
                    *stats
                        .by_reference_depth
                        .entry(segment.references.len())
                        .or_default() += 1;
                }
                SegmentRole::Reference => stats.references += 1,
                SegmentRole::Unrelated => stats.unrelated += 1,
            }
            *stats.by_type.entry(segment.kind.to_string()).or_default() += 1;
            *stats.by_page_span.entry(segment.page_nums.len()).or_default() += 1;
            for &page in &segment.page_nums {
                *stats.by_page.entry(page).or_default() += 1;
            }
        }
        stats
    }

    pub fn record(&mut self, status: QuestionStatus) {
        match status {
            QuestionStatus::Accepted => self.accepted += 1,
            QuestionStatus::Rejected => self.rejected += 1,
            QuestionStatus::Failed => self.failed += 1,
            QuestionStatus::Skipped => self.skipped += 1,
        }
    }
}

/// A geometry problem in `segments_with_bboxes.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryIssue {
    pub segment_id: String,
    pub code: String,
    pub message: String,
}

impl From<&GeometryError> for GeometryIssue {
    fn from(err: &GeometryError) -> Self {
        Self {
            segment_id: err.segment_id().to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// `segments_with_bboxes.json`: placed segments plus what could not be placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryFile {
    pub segments: Vec<PlacedSegment>,
    /// Segments without geometry, as they came in.
    #[serde(default)]
    pub unplaced: Vec<Segment>,
    #[serde(default)]
    pub skipped: Vec<GeometryIssue>,
    #[serde(default)]
    pub fallbacks: Vec<GeometryIssue>,
}

impl GeometryFile {
    /// Pair a geometry pass with the segments it ran over.
    pub fn new(outcome: &GeometryOutcome, segments: &[Segment]) -> Self {
        let unplaced = segments
            .iter()
            .filter(|s| outcome.find(&s.id).is_none())
            .cloned()
            .collect();
        Self {
            segments: outcome.placed.clone(),
            unplaced,
            skipped: outcome.skipped.iter().map(GeometryIssue::from).collect(),
            fallbacks: outcome.fallbacks.iter().map(GeometryIssue::from).collect(),
        }
    }

    /// Every segment, placed ones first.
    pub fn all_segments(&self) -> Vec<Segment> {
        self.segments
            .iter()
            .map(|p| p.segment().clone())
            .chain(self.unplaced.iter().cloned())
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self, ExamcropError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Output file name of a question: `question_007.pdf` for `Q7`.
pub fn question_file_name(segment: &Segment) -> String {
    match segment.question_number() {
        Some(n) => format!("question_{n:03}.pdf"),
        None => {
            let id: String = segment
                .id
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            format!("question_{id}.pdf")
        }
    }
}

/// `question_007_choice_B.pdf`
pub fn choice_file_name(segment: &Segment, letter: &str) -> String {
    let base = question_file_name(segment);
    let stem = base.trim_end_matches(".pdf");
    format!("{stem}_choice_{letter}.pdf")
}

/// Pretty-print `value` to `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExamcropError> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
