//! Outward growth of tightly detected content boxes.
//!
//! A diagram box reported by an image placement usually misses the axis
//! labels and captions printed around it. [`expand_bbox`] moves each edge
//! outward on its own, stopping short of the nearest blocking block on that
//! side, and gives up entirely if the grown box would swallow question text
//! or an answer choice.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::categorize::looks_like_diagram_text;
use crate::geometry::{BBox, MIN_EXTENT};
use crate::layout::TextBlock;

/// Configuration for [`expand_bbox`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandOptions {
    /// Gap left between a moved edge and the blocker that stopped it. Default: 6.0.
    pub safety_margin: f64,
    /// Largest distance an edge may move. Default: 60.0.
    pub max_expansion: f64,
    /// Allowed overlap with a protected block, as a fraction of that block's
    /// area. Default: 0.02.
    pub protected_overlap_ratio: f64,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            safety_margin: 6.0,
            max_expansion: 60.0,
            protected_overlap_ratio: 0.02,
        }
    }
}

/// Result of an expansion attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expansion {
    pub bbox: BBox,
    /// The grown box touched protected text and the original was kept.
    pub reverted: bool,
}

/// Blocks an edge may not cross: protected categories, plus uncategorized
/// text that reads like prose.
fn is_blocker(block: &TextBlock) -> bool {
    match block.category {
        Some(category) => category.is_protected(),
        None => !looks_like_diagram_text(&block.text),
    }
}

/// Grow `bbox` inside `area` (usually the page or a choice cell).
///
/// Blocks overlapping the original box are treated as part of it. For each
/// direction, a blocker is a block entirely on that side whose orthogonal
/// extent intersects the box; the edge stops `safety_margin` short of the
/// nearest one, or moves `max_expansion` when there is none. Edges never
/// move inward.
pub fn expand_bbox(
    bbox: &BBox,
    blocks: &[TextBlock],
    area: &BBox,
    options: &ExpandOptions,
) -> Expansion {
    let cap = options.max_expansion.max(0.0);
    let margin = options.safety_margin;
    let blockers: Vec<&BBox> = blocks
        .iter()
        .filter(|b| is_blocker(b) && !b.bbox.overlaps(bbox))
        .map(|b| &b.bbox)
        .collect();

    let across = |b: &BBox| b.horizontal_overlap(bbox) > 0.0;
    let along = |b: &BBox| b.vertical_overlap(bbox) > 0.0;

    let top = blockers
        .iter()
        .filter(|b| b.bottom <= bbox.top && across(b))
        .map(|b| b.bottom + margin)
        .fold(bbox.top - cap, f64::max);
    let bottom = blockers
        .iter()
        .filter(|b| b.top >= bbox.bottom && across(b))
        .map(|b| b.top - margin)
        .fold(bbox.bottom + cap, f64::min);
    let x0 = blockers
        .iter()
        .filter(|b| b.x1 <= bbox.x0 && along(b))
        .map(|b| b.x1 + margin)
        .fold(bbox.x0 - cap, f64::max);
    let x1 = blockers
        .iter()
        .filter(|b| b.x0 >= bbox.x1 && along(b))
        .map(|b| b.x0 - margin)
        .fold(bbox.x1 + cap, f64::min);

    let grown = BBox::new(
        x0.min(bbox.x0),
        top.min(bbox.top),
        x1.max(bbox.x1),
        bottom.max(bbox.bottom),
    )
    .clamp_to(area);

    if grown.is_degenerate(MIN_EXTENT) {
        return Expansion {
            bbox: *bbox,
            reverted: true,
        };
    }

    // Moving edges independently can still sweep a protected block in
    // through a corner.
    let leaks = blocks.iter().filter(|b| b.is_protected()).any(|b| {
        let gained = grown.intersection_area(&b.bbox) - bbox.intersection_area(&b.bbox);
        gained > b.bbox.area() * options.protected_overlap_ratio
    });
    if leaks {
        debug!(?bbox, ?grown, "expansion reverted, protected text reached");
        return Expansion {
            bbox: *bbox,
            reverted: true,
        };
    }

    Expansion {
        bbox: grown,
        reverted: false,
    }
}
