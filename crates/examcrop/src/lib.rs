//! examcrop: Cut an exam PDF into one file per question.
//!
//! This is the public API facade. It reads the source PDF through
//! examcrop-parse, computes geometry with examcrop-core, and writes the
//! cropped and assembled question files.
//!
//! # Architecture
//!
//! - **examcrop-core**: Backend-independent types, geometry and validation
//! - **examcrop-parse**: PDF reading and content stream interpretation
//! - **examcrop** (this crate): Region extraction, assembly, acceptance and
//!   the per-part and multi-part pipelines
//!
//! # Example
//!
//! ```ignore
//! use std::sync::atomic::AtomicBool;
//! use examcrop::{EngineConfig, PartInput, run_part};
//!
//! let input = PartInput::new("part_1", "exam.pdf", "segmentation.json");
//! let outcome = run_part(&input, "out".as_ref(), &EngineConfig::default(), &AtomicBool::new(false))?;
//! println!("{}", outcome.status);
//! ```

pub mod assemble;
pub mod batch;
pub mod error;
pub mod extract;
pub mod pdf;
pub mod pipeline;
pub mod report;
pub mod summary;

#[cfg(test)]
mod testpdf;

pub use assemble::{assemble_question, inspect_document, inspect_file, merge_documents};
pub use batch::{PartsManifest, check_part_names, run_batch, summarize};
pub use error::ExamcropError;
pub use extract::{extract_region, save_document, write_region};
pub use pdf::{ExamPdf, build_layouts};
pub use pipeline::{
    Extraction, PartInput, PartOutcome, compute_geometry, extract_questions, load_segmentation,
    open_part_pdf, run_part,
};
pub use report::{
    ChoiceFile, FailedQuestion, GeometryFile, GeometryIssue, ProcessingStatistics, QuestionEntry,
    QuestionStatus,
};
pub use summary::{PartStatus, PartSummary, RunSummary};

pub use examcrop_core::{
    BBox, EngineConfig, LayoutOptions, PageLayout, Segment, SegmentationReport, TestProfile,
};

pub use examcrop_core;
pub use examcrop_parse;
