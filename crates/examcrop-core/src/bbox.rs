//! Bounding box computation: one box per (segment, page) pair.
//!
//! Every segment that anchors on a page claims a slot on that page. Slots
//! are laid out row by row: anchors whose tops agree within
//! `row_tolerance` sit side by side and split the row horizontally, and
//! consecutive rows split the page vertically. A split always lies at the
//! midpoint between the end of the earlier slot's own content and the later
//! anchor, so neighbouring slots never overlap. Pages a segment continues
//! onto get the content box down to the first foreign anchor on that page.
//!
//! The computation is a pure function of the segments and page layouts.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::anchor::{AnchorOptions, AnchorPosition, locate_anchor};
use crate::error::GeometryError;
use crate::geometry::{BBox, MIN_EXTENT};
use crate::layout::PageLayout;
use crate::segment::{PlacedSegment, Segment};

/// Configuration for bounding box computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BBoxOptions {
    /// Margin kept clear on every page edge. Default: 18.0.
    pub page_margin: f64,
    /// Space kept above an anchor so the first line is not clipped. Default: 4.0.
    pub anchor_padding: f64,
    /// Smallest width/height a box may have. Default: [`MIN_EXTENT`].
    pub min_extent: f64,
    /// Anchors whose tops differ by at most this share a row. Default: 6.0.
    pub row_tolerance: f64,
    pub anchor: AnchorOptions,
}

impl Default for BBoxOptions {
    fn default() -> Self {
        Self {
            page_margin: 18.0,
            anchor_padding: 4.0,
            min_extent: MIN_EXTENT,
            row_tolerance: 6.0,
            anchor: AnchorOptions::default(),
        }
    }
}

/// Result of a geometry pass over a segment set.
#[derive(Debug, Clone, Default)]
pub struct GeometryOutcome {
    /// Segments with resolved geometry, in input order.
    pub placed: Vec<PlacedSegment>,
    /// Segments that could not be placed.
    pub skipped: Vec<GeometryError>,
    /// Boxes that collapsed and were replaced by the page content box.
    pub fallbacks: Vec<GeometryError>,
}

impl GeometryOutcome {
    pub fn find(&self, id: &str) -> Option<&PlacedSegment> {
        self.placed.iter().find(|p| p.id() == id)
    }
}

#[derive(Debug, Clone, Copy)]
struct AnchorEntry {
    segment: usize,
    position: AnchorPosition,
}

#[derive(Debug, Default)]
struct PagePlan {
    /// Anchor-page box per segment index.
    slots: BTreeMap<usize, BBox>,
    /// Bottom edge for segments continuing onto this page from elsewhere.
    continuation_bottom: Option<f64>,
}

/// Check a segment's page list before any geometry work.
fn check_pages(segment: &Segment, page_count: usize) -> Result<(), GeometryError> {
    let mut seen = HashSet::new();
    if segment.page_nums.is_empty() || !segment.page_nums.iter().all(|p| seen.insert(*p)) {
        return Err(GeometryError::InvalidPageList {
            segment_id: segment.id.clone(),
            pages: segment.page_nums.clone(),
        });
    }
    if let Some(&page) = segment
        .page_nums
        .iter()
        .find(|&&p| p == 0 || p > page_count)
    {
        return Err(GeometryError::PageOutOfRange {
            segment_id: segment.id.clone(),
            page,
            page_count,
        });
    }
    Ok(())
}

/// Boxes that count as content when measuring where a slot's text ends.
fn content_boxes(page: &PageLayout) -> Vec<BBox> {
    let mut boxes: Vec<BBox> = if page.blocks.is_empty() {
        page.spans.iter().map(|s| s.bbox).collect()
    } else {
        page.blocks.iter().map(|b| b.bbox).collect()
    };
    boxes.extend(page.images.iter().copied());
    boxes
}

/// Midpoint between the last content ending in `[band_top, next_top]` and `next_top`.
fn vertical_split(band_top: f64, next_top: f64, default_end: f64, boxes: &[BBox]) -> f64 {
    let own_end = boxes
        .iter()
        .filter(|b| b.top >= band_top - 0.5 && b.bottom <= next_top)
        .map(|b| b.bottom)
        .fold(default_end.min(next_top), f64::max);
    ((own_end + next_top) / 2.0).clamp(band_top.min(next_top), next_top)
}

/// Midpoint between the right edge of content starting in `[left_x0, right_x0)`
/// inside the band and `right_x0`.
fn horizontal_split(left: &AnchorPosition, right_x0: f64, band: &BBox, boxes: &[BBox]) -> f64 {
    let own_right = boxes
        .iter()
        .filter(|b| {
            let c = b.center();
            c.y >= band.top
                && c.y <= band.bottom
                && c.x >= left.x0()
                && c.x < right_x0
                && b.x1 <= right_x0
        })
        .map(|b| b.x1)
        .fold(left.x1().min(right_x0), f64::max);
    (own_right + right_x0) / 2.0
}

fn plan_page(page: &PageLayout, mut entries: Vec<AnchorEntry>, options: &BBoxOptions) -> PagePlan {
    let content = page.content_box(options.page_margin);
    let boxes = content_boxes(page);
    let mut plan = PagePlan::default();
    if entries.is_empty() {
        return plan;
    }

    entries.sort_by(|a, b| {
        a.position
            .top()
            .total_cmp(&b.position.top())
            .then(a.position.x0().total_cmp(&b.position.x0()))
    });

    let mut rows: Vec<Vec<AnchorEntry>> = Vec::new();
    for entry in entries {
        match rows.last_mut() {
            Some(row) if entry.position.top() - row[0].position.top() <= options.row_tolerance => {
                row.push(entry)
            }
            _ => rows.push(vec![entry]),
        }
    }
    for row in &mut rows {
        row.sort_by(|a, b| a.position.x0().total_cmp(&b.position.x0()));
    }

    let row_top = |row: &[AnchorEntry]| {
        row.iter()
            .map(|e| e.position.top())
            .fold(f64::INFINITY, f64::min)
    };
    let row_anchor_bottom = |row: &[AnchorEntry]| {
        row.iter()
            .map(|e| e.position.bottom())
            .fold(f64::NEG_INFINITY, f64::max)
    };

    let first_top = row_top(&rows[0]);
    let above = vertical_split(content.top.min(first_top), first_top, content.top, &boxes);
    plan.continuation_bottom = Some(above);

    let mut prev_boundary = above;
    for (r, row) in rows.iter().enumerate() {
        let top = (row_top(row) - options.anchor_padding).max(prev_boundary);
        let bottom = match rows.get(r + 1) {
            Some(next) => vertical_split(row_top(row), row_top(next), row_anchor_bottom(row), &boxes),
            None => content.bottom.max(row_anchor_bottom(row)),
        };
        let band = BBox::new(content.x0, top, content.x1, bottom);

        let mut left = content.x0.min(row[0].position.x0());
        for (c, entry) in row.iter().enumerate() {
            let right = match row.get(c + 1) {
                Some(next) => horizontal_split(&entry.position, next.position.x0(), &band, &boxes),
                None => content.x1.max(entry.position.x1()),
            };
            let slot = BBox::new(left, top, right, bottom).clamp(page.width, page.height);
            debug!(
                page = page.number(),
                segment = entry.segment,
                ?slot,
                "placed anchor slot"
            );
            plan.slots.insert(entry.segment, slot);
            left = right;
        }
        prev_boundary = bottom;
    }
    plan
}

/// Compute one bounding box per listed page for every segment.
///
/// Segments with an invalid page list or an unresolvable start marker are
/// skipped and reported in [`GeometryOutcome::skipped`]; they also do not
/// cap their neighbours. Degenerate boxes fall back to the page content box
/// and are reported in [`GeometryOutcome::fallbacks`].
pub fn compute_bboxes(
    segments: &[Segment],
    pages: &[PageLayout],
    options: &BBoxOptions,
) -> GeometryOutcome {
    let mut outcome = GeometryOutcome::default();
    let mut anchors: Vec<Option<AnchorPosition>> = vec![None; segments.len()];
    let mut anchor_pages: Vec<usize> = vec![0; segments.len()];
    let mut per_page: BTreeMap<usize, Vec<AnchorEntry>> = BTreeMap::new();

    for (i, segment) in segments.iter().enumerate() {
        let located = check_pages(segment, pages.len())
            .and_then(|()| locate_anchor(segment, pages, &options.anchor));
        match located {
            Ok(anchor) => {
                anchors[i] = Some(anchor.position);
                anchor_pages[i] = anchor.page;
                per_page.entry(anchor.page).or_default().push(AnchorEntry {
                    segment: i,
                    position: anchor.position,
                });
            }
            Err(err) => {
                warn!(segment = %segment.id, error = %err, "skipping segment");
                outcome.skipped.push(err);
            }
        }
    }

    let plans: BTreeMap<usize, PagePlan> = per_page
        .into_iter()
        .map(|(page_num, entries)| (page_num, plan_page(&pages[page_num - 1], entries, options)))
        .collect();

    for (i, segment) in segments.iter().enumerate() {
        if anchors[i].is_none() {
            continue;
        }
        let mut bboxes = Vec::with_capacity(segment.page_nums.len());
        for &page_num in &segment.page_nums {
            let page = &pages[page_num - 1];
            let content = page.content_box(options.page_margin);
            let plan = plans.get(&page_num);

            let bbox = if page_num == anchor_pages[i] {
                plan.and_then(|p| p.slots.get(&i).copied()).unwrap_or(content)
            } else {
                let bottom = plan
                    .and_then(|p| p.continuation_bottom)
                    .unwrap_or(content.bottom);
                BBox::new(content.x0, content.top, content.x1, bottom)
            }
            .clamp(page.width, page.height);

            if bbox.is_degenerate(options.min_extent) {
                let err = GeometryError::DegenerateBBox {
                    segment_id: segment.id.clone(),
                    page: page_num,
                    bbox,
                };
                warn!(error = %err, "falling back to page content box");
                outcome.fallbacks.push(err);
                bboxes.push(content.clamp(page.width, page.height));
            } else {
                bboxes.push(bbox);
            }
        }
        match PlacedSegment::new(segment.clone(), bboxes) {
            Ok(placed) => outcome.placed.push(placed),
            Err(err) => outcome.skipped.push(err),
        }
    }

    outcome
}
