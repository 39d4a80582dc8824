//! Page layout model: positioned text spans, categorized text blocks and pages.
//!
//! Spans come from the PDF text layer in content-stream order. Blocks are
//! built from spans by [`group_spans_into_blocks`] and carry an optional
//! [`BlockCategory`] that either an external categorizer or the fallback
//! heuristics in [`crate::categorize`] supply.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::BBox;

/// A run of text shown by one text operator, in page space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BBox,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// Semantic role of a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    QuestionText,
    AnswerChoice,
    VisualContentTitle,
    VisualContentLabel,
    ChoiceVisualLabel,
    OtherLabel,
}

impl BlockCategory {
    /// Blocks that no produced image region may enclose.
    pub fn is_protected(&self) -> bool {
        matches!(self, BlockCategory::QuestionText | BlockCategory::AnswerChoice)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockCategory::QuestionText => "question_text",
            BlockCategory::AnswerChoice => "answer_choice",
            BlockCategory::VisualContentTitle => "visual_content_title",
            BlockCategory::VisualContentLabel => "visual_content_label",
            BlockCategory::ChoiceVisualLabel => "choice_visual_label",
            BlockCategory::OtherLabel => "other_label",
        }
    }
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group of spans that reads as one unit (a paragraph, a label, a caption).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub bbox: BBox,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<BlockCategory>,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            bbox,
            text: text.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: BlockCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn is_protected(&self) -> bool {
        self.category.is_some_and(|c| c.is_protected())
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Everything the geometry engine knows about one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// 0-based page index.
    pub index: usize,
    pub width: f64,
    pub height: f64,
    /// Text spans in content-stream order.
    #[serde(default)]
    pub spans: Vec<TextSpan>,
    /// Text blocks in reading order.
    #[serde(default)]
    pub blocks: Vec<TextBlock>,
    /// Placement boxes of image objects drawn on the page.
    #[serde(default)]
    pub images: Vec<BBox>,
}

impl PageLayout {
    pub fn new(index: usize, width: f64, height: f64) -> Self {
        Self {
            index,
            width,
            height,
            spans: Vec::new(),
            blocks: Vec::new(),
            images: Vec::new(),
        }
    }

    /// 1-based page number as used by segment page lists.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn bbox(&self) -> BBox {
        BBox::page(self.width, self.height)
    }

    /// Page box shrunk by `margin` on every side.
    pub fn content_box(&self, margin: f64) -> BBox {
        let margin = margin.max(0.0).min(self.width / 4.0).min(self.height / 4.0);
        BBox::new(margin, margin, self.width - margin, self.height - margin)
    }

    /// Spans sorted into reading order (top, then left).
    pub fn spans_in_reading_order(&self) -> Vec<&TextSpan> {
        let mut spans: Vec<&TextSpan> = self.spans.iter().collect();
        spans.sort_by(|a, b| {
            line_key(&a.bbox)
                .total_cmp(&line_key(&b.bbox))
                .then(a.bbox.x0.total_cmp(&b.bbox.x0))
        });
        spans
    }
}

/// Sorting key that keeps spans sharing a baseline together even when their
/// tops differ by a fraction of a point.
fn line_key(bbox: &BBox) -> f64 {
    (bbox.bottom * 2.0).round() / 2.0
}

/// Options for grouping spans into lines and blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Maximum baseline difference for two spans to share a line. Default: 3.0.
    pub line_tolerance: f64,
    /// Maximum horizontal gap between spans of one line. Default: 24.0.
    pub word_gap: f64,
    /// Maximum vertical gap between consecutive lines of one block,
    /// as a multiple of the line height. Default: 0.8.
    pub block_gap_ratio: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            line_tolerance: 3.0,
            word_gap: 24.0,
            block_gap_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone)]
struct Line {
    bbox: BBox,
    text: String,
}

/// Group spans into text blocks.
///
/// The algorithm:
/// 1. Sort spans into reading order.
/// 2. Join spans whose baselines agree within `line_tolerance` and that are
///    horizontally close into lines.
/// 3. Stack lines into a block while the vertical gap stays under
///    `block_gap_ratio` times the line height and the lines overlap
///    horizontally.
///
/// Blocks come back in reading order without categories.
pub fn group_spans_into_blocks(spans: &[TextSpan], options: &LayoutOptions) -> Vec<TextBlock> {
    let mut sorted: Vec<&TextSpan> = spans.iter().filter(|s| !s.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .bottom
            .total_cmp(&b.bbox.bottom)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut lines: Vec<Line> = Vec::new();
    for span in sorted {
        let joined = lines.iter_mut().rev().take(4).find(|line| {
            (line.bbox.bottom - span.bbox.bottom).abs() <= options.line_tolerance
                && span.bbox.x0 - line.bbox.x1 <= options.word_gap
                && span.bbox.x1 >= line.bbox.x0
        });
        match joined {
            Some(line) => {
                let sep = if line.text.ends_with(' ') || span.text.starts_with(' ') {
                    ""
                } else {
                    " "
                };
                line.text.push_str(sep);
                line.text.push_str(span.text.trim_end());
                line.bbox = line.bbox.union(&span.bbox);
            }
            None => lines.push(Line {
                bbox: span.bbox,
                text: span.text.trim().to_string(),
            }),
        }
    }

    lines.sort_by(|a, b| a.bbox.top.total_cmp(&b.bbox.top).then(a.bbox.x0.total_cmp(&b.bbox.x0)));

    let mut blocks: Vec<TextBlock> = Vec::new();
    for line in lines {
        let height = line.bbox.height().max(1.0);
        let target = blocks.iter_mut().rev().find(|block| {
            let gap = line.bbox.top - block.bbox.bottom;
            gap <= height * options.block_gap_ratio
                && gap >= -height
                && block.bbox.horizontal_overlap(&line.bbox) > 0.0
        });
        match target {
            Some(block) => {
                block.text.push('\n');
                block.text.push_str(&line.text);
                block.bbox = block.bbox.union(&line.bbox);
            }
            None => blocks.push(TextBlock::new(line.text, line.bbox)),
        }
    }

    blocks.sort_by(|a, b| a.bbox.top.total_cmp(&b.bbox.top).then(a.bbox.x0.total_cmp(&b.bbox.x0)));
    blocks
}
