//! Run summaries: one status line per part, never a bare error trace.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Outcome of one part's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartStatus {
    /// Every question was accepted.
    Success,
    /// Some questions were accepted, others were rejected, failed or skipped.
    #[serde(rename = "Partial Success")]
    PartialSuccess,
    /// No question was accepted.
    Failed,
    /// Strict validation found errors; nothing was extracted.
    #[serde(rename = "Failed Validation")]
    FailedValidation,
}

impl PartStatus {
    /// Status from question outcome counts.
    pub fn from_counts(questions: usize, accepted: usize) -> Self {
        if questions > 0 && accepted == questions {
            PartStatus::Success
        } else if accepted > 0 {
            PartStatus::PartialSuccess
        } else {
            PartStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PartStatus::Success => "Success",
            PartStatus::PartialSuccess => "Partial Success",
            PartStatus::Failed => "Failed",
            PartStatus::FailedValidation => "Failed Validation",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == PartStatus::Success
    }
}

impl fmt::Display for PartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSummary {
    pub part: String,
    pub status: PartStatus,
    pub output_dir: PathBuf,
    pub questions: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub skipped: usize,
    /// First-class reasons: validation errors, rejections, skips.
    pub reasons: Vec<String>,
}

/// Summary of a whole run, parts in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub parts: Vec<PartSummary>,
}

impl RunSummary {
    pub fn total_accepted(&self) -> usize {
        self.parts.iter().map(|p| p.accepted).sum()
    }

    pub fn total_rejected(&self) -> usize {
        self.parts.iter().map(|p| p.rejected).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.parts.iter().all(|p| p.status.is_success())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            writeln!(
                f,
                "{}: {} ({} of {} accepted, {} rejected, {} failed, {} skipped)",
                part.part,
                part.status,
                part.accepted,
                part.questions,
                part.rejected,
                part.failed,
                part.skipped
            )?;
            for reason in &part.reasons {
                writeln!(f, "  - {reason}")?;
            }
        }
        Ok(())
    }
}
