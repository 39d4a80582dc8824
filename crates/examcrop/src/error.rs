//! Error type for the extraction and assembly pipeline.
//!
//! Everything below a single question is recovered where it happens (the
//! question is skipped or moved to the failed area). The errors here are the
//! ones that end a whole part: the source cannot be read, the output cannot
//! be written, or a sibling part failed and this one was cancelled.

use examcrop_core::GeometryError;
use examcrop_parse::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExamcropError {
    /// The source PDF could not be read or interpreted.
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Merging a question's regions produced no pages; no file was written.
    #[error("no pages to merge for question {question_id}")]
    EmptyMergeResult { question_id: String },

    /// One region could not be turned into a standalone document.
    #[error("failed to extract region on page {page}: {message}")]
    RegionExtraction { page: usize, message: String },

    /// A part name that cannot serve as its output directory name.
    #[error("invalid part name '{part}': {reason}")]
    InvalidPartName { part: String, reason: &'static str },

    /// Processing stopped because another part failed.
    #[error("processing cancelled")]
    Cancelled,

    /// A part's pipeline failed, which fails the whole batch.
    #[error("part {part} failed: {source}")]
    PartPipelineFailure {
        part: String,
        #[source]
        source: Box<ExamcropError>,
    },
}

impl ExamcropError {
    pub(crate) fn region(page: usize, message: impl Into<String>) -> Self {
        ExamcropError::RegionExtraction {
            page,
            message: message.into(),
        }
    }
}
