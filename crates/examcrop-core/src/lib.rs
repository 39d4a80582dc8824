//! examcrop-core: Backend-independent types and geometry algorithms.
//!
//! This crate turns segment descriptions (ids, start markers, page lists)
//! into page-space rectangles. It knows nothing about PDF files: pages come
//! in as [`PageLayout`]s of positioned text and image boxes.
//!
//! - [`anchor`]: locating a segment's start marker on its pages
//! - [`bbox`]: one box per (segment, page) pair
//! - [`expand`]: growing diagram boxes toward their labels
//! - [`choice`]: splitting a page into per-choice regions
//! - [`validation`]: structural checks over the segment set
//! - [`acceptance`]: rules an assembled question file must pass

pub mod acceptance;
pub mod anchor;
pub mod bbox;
pub mod categorize;
pub mod choice;
pub mod config;
pub mod error;
pub mod expand;
pub mod geometry;
pub mod layout;
pub mod segment;
pub mod validation;

pub use acceptance::{
    AcceptanceOptions, AcceptanceRule, AssembledContent, NumberMatch, Rejection, check_acceptance,
    find_question_number,
};
pub use anchor::{Anchor, AnchorOptions, AnchorPosition, locate_anchor};
pub use bbox::{BBoxOptions, GeometryOutcome, compute_bboxes};
pub use categorize::{categorize_blocks, choice_label_letter};
pub use choice::{ChoiceOptions, ChoiceRegion, detect_choice_regions};
pub use config::EngineConfig;
pub use error::GeometryError;
pub use expand::{ExpandOptions, Expansion, expand_bbox};
pub use geometry::{BBox, Ctm, MIN_EXTENT, Point};
pub use layout::{
    BlockCategory, LayoutOptions, PageLayout, TextBlock, TextSpan, group_spans_into_blocks,
};
pub use segment::{PlacedSegment, Segment, SegmentKind, SegmentRole, SegmentationInput};
pub use validation::{
    CountCheck, SegmentationReport, Severity, TestProfile, ValidationIssue, ValidatorOptions,
    MAX_REPORTED_GAPS, find_numbering_gaps, validate_segmentation,
};
