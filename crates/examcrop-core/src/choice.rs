//! Partitioning of a page into one region per multiple-choice option.
//!
//! Used when the options are diagrams rather than text: each choice label
//! (`A)`, `B.`, `(c)`, ...) gets a cell bounded by its neighbouring labels,
//! and the region is the diagram content found inside that cell.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::categorize::{choice_label_letter, looks_like_diagram_text};
use crate::expand::{ExpandOptions, expand_bbox};
use crate::geometry::BBox;
use crate::layout::{BlockCategory, PageLayout, TextBlock};

/// Configuration for [`detect_choice_regions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceOptions {
    /// Margin trimmed from every page edge to form the default cell edges.
    /// Default: 18.0.
    pub page_margin: f64,
    /// Slack when deciding whether two labels share a row. Default: 4.0.
    pub neighbor_tolerance: f64,
    /// Grow each region toward nearby labels inside its cell. Default: false.
    pub expand_regions: bool,
    pub expand: ExpandOptions,
}

impl Default for ChoiceOptions {
    fn default() -> Self {
        Self {
            page_margin: 18.0,
            neighbor_tolerance: 4.0,
            expand_regions: false,
            expand: ExpandOptions::default(),
        }
    }
}

/// The region of one answer choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRegion {
    /// Upper-case letter or digit of the label.
    pub letter: String,
    /// Content of the choice, always inside `boundary`.
    pub bbox: BBox,
    /// Cell the choice owns on the page.
    pub boundary: BBox,
    /// 1-based page number.
    pub page_number: usize,
    /// Text blocks subsumed by the region, label included.
    pub block_count: usize,
}

#[derive(Debug, Clone)]
struct Label<'a> {
    letter: String,
    block: &'a TextBlock,
}

impl Label<'_> {
    fn bbox(&self) -> &BBox {
        &self.block.bbox
    }
}

fn is_label_category(category: Option<BlockCategory>) -> bool {
    matches!(
        category,
        Some(BlockCategory::AnswerChoice) | Some(BlockCategory::ChoiceVisualLabel)
    )
}

/// Whether a block can be part of a choice's diagram.
fn is_diagram_block(block: &TextBlock) -> bool {
    match block.category {
        Some(BlockCategory::VisualContentTitle)
        | Some(BlockCategory::VisualContentLabel)
        | Some(BlockCategory::OtherLabel) => true,
        Some(BlockCategory::QuestionText)
        | Some(BlockCategory::AnswerChoice)
        | Some(BlockCategory::ChoiceVisualLabel) => false,
        None => looks_like_diagram_text(&block.text),
    }
}

/// Choice labels of a page in reading order: rows top to bottom, each row
/// left to right. Repeated letters keep their first occurrence.
fn collect_labels<'a>(page: &'a PageLayout, tolerance: f64) -> Vec<Label<'a>> {
    let mut labels: Vec<Label<'a>> = page
        .blocks
        .iter()
        .filter(|b| is_label_category(b.category))
        .filter_map(|b| {
            choice_label_letter(&b.text).map(|letter| Label { letter, block: b })
        })
        .collect();
    labels.sort_by(|a, b| a.bbox().top.total_cmp(&b.bbox().top));

    let mut rows: Vec<Vec<Label<'a>>> = Vec::new();
    for label in labels {
        match rows.last_mut() {
            Some(row) if label.bbox().top - row[0].bbox().top <= tolerance => row.push(label),
            _ => rows.push(vec![label]),
        }
    }
    let mut ordered = Vec::new();
    for mut row in rows {
        row.sort_by(|a, b| a.bbox().x0.total_cmp(&b.bbox().x0));
        for label in row {
            if !ordered.iter().any(|l: &Label<'_>| l.letter == label.letter) {
                ordered.push(label);
            }
        }
    }
    ordered
}

struct Partition<'a> {
    labels: &'a [Label<'a>],
    content: Vec<BBox>,
    area: BBox,
    tolerance: f64,
}

impl Partition<'_> {
    fn same_row(&self, a: &BBox, b: &BBox) -> bool {
        a.top < b.bottom + self.tolerance && b.top < a.bottom + self.tolerance
    }

    /// Split between a label and the label to its right.
    fn column_split(&self, left: &BBox, right: &BBox) -> f64 {
        let own_right = self
            .content
            .iter()
            .filter(|b| {
                let c = b.center();
                c.x >= left.x0 && c.x < right.x0 && b.x1 <= right.x0
            })
            .map(|b| b.x1)
            .fold(left.x1.min(right.x0), f64::max);
        (own_right + right.x0) / 2.0
    }

    /// Split between a label and the label below it, looking only at
    /// content within `[x0, x1]`.
    fn row_split(&self, upper: &BBox, lower: &BBox, x0: f64, x1: f64) -> f64 {
        let own_bottom = self
            .content
            .iter()
            .filter(|b| {
                let c = b.center();
                c.y >= upper.top && c.y < lower.top && b.bottom <= lower.top && c.x >= x0 && c.x <= x1
            })
            .map(|b| b.bottom)
            .fold(upper.bottom.min(lower.top), f64::max);
        (own_bottom + lower.top) / 2.0
    }

    fn right_neighbor(&self, i: usize) -> Option<&BBox> {
        let me = self.labels[i].bbox();
        self.labels
            .iter()
            .map(Label::bbox)
            .filter(|b| b.x0 >= me.x1 && self.same_row(me, b))
            .min_by(|a, b| a.x0.total_cmp(&b.x0))
    }

    fn left_neighbor(&self, i: usize) -> Option<&BBox> {
        let me = self.labels[i].bbox();
        self.labels
            .iter()
            .map(Label::bbox)
            .filter(|b| b.x1 <= me.x0 && self.same_row(me, b))
            .max_by(|a, b| a.x0.total_cmp(&b.x0))
    }

    /// Nearest label below, preferring ones in the same column span.
    fn below_neighbor(&self, i: usize, x0: f64, x1: f64) -> Option<&BBox> {
        let me = self.labels[i].bbox();
        let below: Vec<&BBox> = self
            .labels
            .iter()
            .map(Label::bbox)
            .filter(|b| b.top >= me.bottom && !self.same_row(me, b))
            .collect();
        let in_column = below
            .iter()
            .copied()
            .filter(|b| b.x1.min(x1) - b.x0.max(x0) > 0.0)
            .min_by(|a, b| a.top.total_cmp(&b.top));
        in_column.or_else(|| below.into_iter().min_by(|a, b| a.top.total_cmp(&b.top)))
    }
}

/// Top edge of the choice area: below any question stem printed above the
/// first label.
fn choice_area(page: &PageLayout, labels: &[Label<'_>], margin: f64) -> BBox {
    let mut area = page.content_box(margin);
    let first_top = labels
        .iter()
        .map(|l| l.bbox().top)
        .fold(f64::INFINITY, f64::min);
    let stem_bottom = page
        .blocks
        .iter()
        .filter(|b| b.category == Some(BlockCategory::QuestionText) && b.bbox.bottom <= first_top)
        .map(|b| b.bbox.bottom)
        .fold(area.top, f64::max);
    area.top = stem_bottom;
    area
}

/// Fit a label's candidate cell around the cells resolved before it.
///
/// An earlier cell that ends above the label pushes the top edge down. One
/// that reaches past the label's top but sits beside it narrows the cell
/// sideways. One that covers the label's column is cut off at the label's
/// top. The candidate only ever shrinks, so a single pass leaves it
/// disjoint from every earlier cell.
fn fit_cell(mut cell: BBox, me: &BBox, earlier: &mut [BBox]) -> BBox {
    for prev in earlier.iter_mut() {
        if !prev.overlaps(&cell) {
            continue;
        }
        if prev.bottom <= me.top {
            cell.top = cell.top.max(prev.bottom);
        } else if prev.x1 <= me.x0 {
            cell.x0 = cell.x0.max(prev.x1);
        } else if prev.x0 >= me.x1 {
            cell.x1 = cell.x1.min(prev.x0);
        } else {
            prev.bottom = me.top.max(prev.top);
            cell.top = cell.top.max(prev.bottom);
        }
    }
    cell
}

/// Partition `page` into one region per choice label.
///
/// Returns an empty list when fewer than two labels are found; the caller
/// then treats the page as a single region. Cells are resolved in reading
/// order and each one is fitted around the cells resolved before it, so
/// cells never overlap. Regions are collected once every cell is final.
pub fn detect_choice_regions(page: &PageLayout, options: &ChoiceOptions) -> Vec<ChoiceRegion> {
    let labels = collect_labels(page, options.neighbor_tolerance);
    if labels.len() < 2 {
        return Vec::new();
    }

    let diagram_blocks: Vec<&TextBlock> = page
        .blocks
        .iter()
        .filter(|b| is_diagram_block(b))
        .collect();
    let mut content: Vec<BBox> = diagram_blocks.iter().map(|b| b.bbox).collect();
    content.extend(page.images.iter().copied());

    let area = choice_area(page, &labels, options.page_margin);
    let partition = Partition {
        labels: &labels,
        content,
        area,
        tolerance: options.neighbor_tolerance,
    };

    let mut cells: Vec<BBox> = Vec::with_capacity(labels.len());
    for (i, label) in labels.iter().enumerate() {
        let me = label.bbox();
        let left = partition
            .left_neighbor(i)
            .map_or(partition.area.x0, |n| partition.column_split(n, me));
        let right = partition
            .right_neighbor(i)
            .map_or(partition.area.x1, |n| partition.column_split(me, n));
        let bottom = partition
            .below_neighbor(i, left, right)
            .map_or(partition.area.bottom, |n| partition.row_split(me, n, left, right));
        let candidate = BBox::new(
            left.min(me.x0),
            partition.area.top.min(me.top),
            right.max(me.x1),
            bottom.max(me.bottom),
        );
        let cell = fit_cell(candidate, me, &mut cells);
        cells.push(cell);
    }

    let mut regions = Vec::with_capacity(labels.len());
    for (label, cell) in labels.iter().zip(cells) {
        let me = label.bbox();
        let members: Vec<&TextBlock> = diagram_blocks
            .iter()
            .copied()
            .filter(|b| cell.contains_point(b.bbox.center()))
            .collect();
        let images: Vec<&BBox> = page
            .images
            .iter()
            .filter(|b| cell.contains_point(b.center()))
            .collect();

        let bbox = if members.is_empty() && images.is_empty() {
            cell
        } else {
            let union = members
                .iter()
                .map(|b| &b.bbox)
                .chain(images.iter().copied())
                .fold(*me, |acc, b| acc.union(b));
            let clipped = union.intersection(&cell).unwrap_or(cell);
            if options.expand_regions {
                expand_bbox(&clipped, &page.blocks, &cell, &options.expand).bbox
            } else {
                clipped
            }
        };

        debug!(page = page.number(), letter = %label.letter, ?cell, ?bbox, "choice region");
        regions.push(ChoiceRegion {
            letter: label.letter.clone(),
            bbox,
            boundary: cell,
            page_number: page.number(),
            block_count: members.len() + 1,
        });
    }
    regions
}
