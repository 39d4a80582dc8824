//! Error types for geometry resolution.
//!
//! Every variant here is recoverable at the segment level: the caller skips
//! or falls back for the affected segment and keeps processing the batch.

use thiserror::Error;

use crate::geometry::BBox;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The start marker matched no text on any of the segment's pages.
    #[error("start marker {marker:?} of segment {segment_id} not found on pages {pages:?}")]
    AnchorNotFound {
        segment_id: String,
        marker: String,
        pages: Vec<usize>,
    },

    /// A box collapsed below the minimum extent after clamping or expansion.
    #[error("degenerate box for segment {segment_id} on page {page}: {bbox:?}")]
    DegenerateBBox {
        segment_id: String,
        page: usize,
        bbox: BBox,
    },

    /// The page list is empty or repeats a page.
    #[error("segment {segment_id} has an invalid page list {pages:?}")]
    InvalidPageList { segment_id: String, pages: Vec<usize> },

    /// A page number outside `1..=page_count`.
    #[error("segment {segment_id} references page {page} but the document has {page_count} pages")]
    PageOutOfRange {
        segment_id: String,
        page: usize,
        page_count: usize,
    },

    /// Geometry does not line up with the page list.
    #[error("segment {segment_id} lists {pages} pages but has {bboxes} boxes")]
    GeometryMismatch {
        segment_id: String,
        pages: usize,
        bboxes: usize,
    },
}

impl GeometryError {
    /// Id of the segment the error is about.
    pub fn segment_id(&self) -> &str {
        match self {
            GeometryError::AnchorNotFound { segment_id, .. }
            | GeometryError::DegenerateBBox { segment_id, .. }
            | GeometryError::InvalidPageList { segment_id, .. }
            | GeometryError::PageOutOfRange { segment_id, .. }
            | GeometryError::GeometryMismatch { segment_id, .. } => segment_id,
        }
    }

    /// Short machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GeometryError::AnchorNotFound { .. } => "ANCHOR_NOT_FOUND",
            GeometryError::DegenerateBBox { .. } => "DEGENERATE_BBOX",
            GeometryError::InvalidPageList { .. } => "INVALID_PAGE_LIST",
            GeometryError::PageOutOfRange { .. } => "PAGE_OUT_OF_RANGE",
            GeometryError::GeometryMismatch { .. } => "GEOMETRY_MISMATCH",
        }
    }
}
