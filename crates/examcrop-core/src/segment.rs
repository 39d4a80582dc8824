//! Segments: the logical units produced by the upstream segmenter.
//!
//! [`SegmentationInput`] mirrors the external segmentation JSON.
//! [`SegmentationInput::into_segments`] flattens its three arrays into
//! [`Segment`]s with reference links resolved in both directions. Once the
//! geometry is known, a segment becomes a [`PlacedSegment`], which is the
//! only type extraction and assembly accept.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::geometry::BBox;

static SEGMENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Q|R|UC)(\d+)$").expect("valid segment id regex"));

/// What a segment contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Question,
    SubQuestion,
    Citation,
    Figure,
    Table,
    Footnote,
    CoverPage,
    GeneralInstructions,
    #[serde(other)]
    Other,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Question => "question",
            SegmentKind::SubQuestion => "sub_question",
            SegmentKind::Citation => "citation",
            SegmentKind::Figure => "figure",
            SegmentKind::Table => "table",
            SegmentKind::Footnote => "footnote",
            SegmentKind::CoverPage => "cover_page",
            SegmentKind::GeneralInstructions => "general_instructions",
            SegmentKind::Other => "other",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which array of the segmentation JSON a segment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentRole {
    Question,
    Reference,
    Unrelated,
}

/// Parsed form of a `Q<n>` / `R<n>` / `UC<n>` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentId {
    pub role: SegmentRole,
    pub number: u32,
}

impl SegmentId {
    /// Parse an id; `None` when it does not follow the id pattern.
    pub fn parse(id: &str) -> Option<Self> {
        let caps = SEGMENT_ID.captures(id.trim())?;
        let role = match caps.get(1)?.as_str() {
            "Q" => SegmentRole::Question,
            "R" => SegmentRole::Reference,
            _ => SegmentRole::Unrelated,
        };
        let number = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { role, number })
    }
}

/// One logical unit of the exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub role: SegmentRole,
    /// Truncated text snippet, informational only.
    #[serde(default)]
    pub text: String,
    /// Literal text or an `"x,y"` coordinate pair.
    #[serde(default)]
    pub start_marker: String,
    /// 1-based page numbers in reading order.
    pub page_nums: Vec<usize>,
    #[serde(default)]
    pub multi_page: bool,
    /// Ids of shared references this segment depends on, in display order.
    #[serde(default)]
    pub references: Vec<String>,
}

impl Segment {
    /// Numeric suffix of a `Q<n>` id.
    pub fn question_number(&self) -> Option<u32> {
        SegmentId::parse(&self.id)
            .filter(|id| id.role == SegmentRole::Question)
            .map(|id| id.number)
    }

    pub fn is_question(&self) -> bool {
        self.role == SegmentRole::Question
    }
}

#[derive(Debug, Clone, Deserialize)]
struct QuestionEntry {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    start_marker: String,
    #[serde(default)]
    page_nums: Vec<usize>,
    #[serde(rename = "type", default = "default_question_kind")]
    kind: SegmentKind,
    #[serde(default)]
    multi_page: bool,
    #[serde(default)]
    multi_question_references: Vec<String>,
}

fn default_question_kind() -> SegmentKind {
    SegmentKind::Question
}

fn default_other_kind() -> SegmentKind {
    SegmentKind::Other
}

#[derive(Debug, Clone, Deserialize)]
struct ReferenceEntry {
    id: String,
    #[serde(rename = "type", default = "default_other_kind")]
    kind: SegmentKind,
    #[serde(default)]
    text: String,
    #[serde(default)]
    start_marker: String,
    #[serde(default)]
    page_nums: Vec<usize>,
    #[serde(default)]
    question_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UnrelatedEntry {
    id: String,
    #[serde(rename = "type", default = "default_other_kind")]
    kind: SegmentKind,
    #[serde(default)]
    text: String,
    #[serde(default)]
    start_marker: String,
    #[serde(default)]
    page_nums: Vec<usize>,
}

/// The external segmentation document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentationInput {
    #[serde(default)]
    questions: Vec<QuestionEntry>,
    #[serde(default)]
    multi_question_references: Vec<ReferenceEntry>,
    #[serde(default)]
    unrelated_content_segments: Vec<UnrelatedEntry>,
}

impl SegmentationInput {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Flatten into segments: questions, then references, then unrelated content.
    ///
    /// A question's reference list is its own `multi_question_references`
    /// followed by every reference whose `question_ids` names it.
    pub fn into_segments(self) -> Vec<Segment> {
        let mut segments = Vec::with_capacity(
            self.questions.len()
                + self.multi_question_references.len()
                + self.unrelated_content_segments.len(),
        );

        for q in &self.questions {
            let mut references = Vec::new();
            let mut seen = HashSet::new();
            let linked = self
                .multi_question_references
                .iter()
                .filter(|r| r.question_ids.iter().any(|qid| qid == &q.id))
                .map(|r| &r.id);
            for rid in q.multi_question_references.iter().chain(linked) {
                if seen.insert(rid.clone()) {
                    references.push(rid.clone());
                }
            }
            segments.push(Segment {
                id: q.id.clone(),
                kind: q.kind,
                role: SegmentRole::Question,
                text: q.text.clone(),
                start_marker: q.start_marker.clone(),
                page_nums: q.page_nums.clone(),
                multi_page: q.multi_page,
                references,
            });
        }

        for r in self.multi_question_references {
            let multi_page = r.page_nums.len() > 1;
            segments.push(Segment {
                id: r.id,
                kind: r.kind,
                role: SegmentRole::Reference,
                text: r.text,
                start_marker: r.start_marker,
                page_nums: r.page_nums,
                multi_page,
                references: Vec::new(),
            });
        }

        for u in self.unrelated_content_segments {
            let multi_page = u.page_nums.len() > 1;
            segments.push(Segment {
                id: u.id,
                kind: u.kind,
                role: SegmentRole::Unrelated,
                text: u.text,
                start_marker: u.start_marker,
                page_nums: u.page_nums,
                multi_page,
                references: Vec::new(),
            });
        }

        segments
    }
}

/// A segment whose geometry has been resolved: one box per listed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPlacedSegment")]
pub struct PlacedSegment {
    #[serde(flatten)]
    segment: Segment,
    bboxes: Vec<BBox>,
}

#[derive(Deserialize)]
struct RawPlacedSegment {
    #[serde(flatten)]
    segment: Segment,
    bboxes: Vec<BBox>,
}

impl TryFrom<RawPlacedSegment> for PlacedSegment {
    type Error = GeometryError;

    fn try_from(raw: RawPlacedSegment) -> Result<Self, Self::Error> {
        PlacedSegment::new(raw.segment, raw.bboxes)
    }
}

impl PlacedSegment {
    /// Attach geometry. Fails unless there is exactly one box per page entry.
    pub fn new(segment: Segment, bboxes: Vec<BBox>) -> Result<Self, GeometryError> {
        if bboxes.len() != segment.page_nums.len() {
            return Err(GeometryError::GeometryMismatch {
                segment_id: segment.id.clone(),
                pages: segment.page_nums.len(),
                bboxes: bboxes.len(),
            });
        }
        Ok(Self { segment, bboxes })
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn id(&self) -> &str {
        &self.segment.id
    }

    pub fn bboxes(&self) -> &[BBox] {
        &self.bboxes
    }

    /// `(page number, bbox)` pairs in page-list order.
    pub fn regions(&self) -> impl Iterator<Item = (usize, BBox)> + '_ {
        self.segment
            .page_nums
            .iter()
            .copied()
            .zip(self.bboxes.iter().copied())
    }

    pub fn into_parts(self) -> (Segment, Vec<BBox>) {
        (self.segment, self.bboxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "questions": [
            {"id": "Q1", "text": "1. Sea x...", "start_marker": "1. Sea", "page_nums": [2],
             "type": "question", "multi_page": false, "multi_question_references": ["R1"]},
            {"id": "Q2", "text": "2. Con...", "start_marker": "2. Con", "page_nums": [2, 3],
             "type": "question", "multi_page": true, "multi_question_references": []}
        ],
        "multi_question_references": [
            {"id": "R1", "type": "citation", "text": "Lee el texto", "start_marker": "Lee el",
             "page_nums": [1], "question_ids": ["Q1", "Q2"]}
        ],
        "unrelated_content_segments": [
            {"id": "UC1", "type": "cover_page", "text": "PAES", "start_marker": "10,10", "page_nums": [1]},
            {"id": "UC2", "type": "banner", "text": "", "start_marker": "", "page_nums": [4]}
        ]
    }"#;

    #[test]
    fn parses_segmentation_json() {
        let input = SegmentationInput::from_json(SAMPLE).unwrap();
        assert_eq!(input.question_count(), 2);
        let segments = input.into_segments();
        let ids: Vec<&str> = segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["Q1", "Q2", "R1", "UC1", "UC2"]);
        assert_eq!(segments[0].kind, SegmentKind::Question);
        assert_eq!(segments[2].kind, SegmentKind::Citation);
        assert_eq!(segments[2].role, SegmentRole::Reference);
        assert_eq!(segments[3].kind, SegmentKind::CoverPage);
    }

    #[test]
    fn unknown_type_maps_to_other() {
        let segments = SegmentationInput::from_json(SAMPLE).unwrap().into_segments();
        assert_eq!(segments[4].kind, SegmentKind::Other);
    }

    #[test]
    fn references_resolved_both_ways_without_duplicates() {
        let segments = SegmentationInput::from_json(SAMPLE).unwrap().into_segments();
        assert_eq!(segments[0].references, vec!["R1".to_string()]);
        assert_eq!(segments[1].references, vec!["R1".to_string()]);
    }

    #[test]
    fn segment_id_parsing() {
        assert_eq!(
            SegmentId::parse("Q12"),
            Some(SegmentId {
                role: SegmentRole::Question,
                number: 12
            })
        );
        assert_eq!(SegmentId::parse("UC3").map(|i| i.role), Some(SegmentRole::Unrelated));
        assert_eq!(SegmentId::parse("R1").map(|i| i.role), Some(SegmentRole::Reference));
        assert!(SegmentId::parse("Q").is_none());
        assert!(SegmentId::parse("P4").is_none());
        assert!(SegmentId::parse("Q4a").is_none());
    }

    #[test]
    fn question_number_only_for_questions() {
        let segments = SegmentationInput::from_json(SAMPLE).unwrap().into_segments();
        assert_eq!(segments[1].question_number(), Some(2));
        assert_eq!(segments[2].question_number(), None);
    }

    #[test]
    fn placed_segment_requires_one_box_per_page() {
        let segments = SegmentationInput::from_json(SAMPLE).unwrap().into_segments();
        let q2 = segments[1].clone();
        let err = PlacedSegment::new(q2.clone(), vec![BBox::new(0.0, 0.0, 10.0, 10.0)]);
        assert!(matches!(err, Err(GeometryError::GeometryMismatch { .. })));

        let placed = PlacedSegment::new(
            q2,
            vec![BBox::new(0.0, 0.0, 10.0, 10.0), BBox::new(0.0, 0.0, 20.0, 20.0)],
        )
        .unwrap();
        let regions: Vec<(usize, BBox)> = placed.regions().collect();
        assert_eq!(regions[1], (3, BBox::new(0.0, 0.0, 20.0, 20.0)));
    }

    #[test]
    fn placed_segment_json_enforces_invariant() {
        let json = r#"{"id":"Q1","type":"question","role":"question","page_nums":[1,2],
                       "bboxes":[{"x0":0.0,"top":0.0,"x1":10.0,"bottom":10.0}]}"#;
        assert!(serde_json::from_str::<PlacedSegment>(json).is_err());

        let json = r#"{"id":"Q1","type":"question","role":"question","page_nums":[1],
                       "bboxes":[{"x0":0.0,"top":0.0,"x1":10.0,"bottom":10.0}]}"#;
        let placed: PlacedSegment = serde_json::from_str(json).unwrap();
        assert_eq!(placed.id(), "Q1");
    }
}
