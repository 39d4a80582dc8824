//! Multi-part batches: independent parts of one exam processed on a small
//! worker pool.
//!
//! Within a part, question failures are soft. Across parts the policy is
//! fail-fast: the first hard failure raises a shared flag, the other parts
//! stop at their next checkpoint, and the batch reports that failure.

use std::collections::HashSet;
use std::path::{Component, Path};
use std::sync::atomic::{AtomicBool, Ordering};

use examcrop_core::EngineConfig;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{error, info};

use crate::error::ExamcropError;
use crate::pipeline::{PartInput, PartOutcome, run_part};
use crate::summary::RunSummary;

/// Parts file for `run --parts`: `{"parts": [{"name", "pdf", "segmentation", "layout"?}]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartsManifest {
    pub parts: Vec<PartInput>,
}

impl PartsManifest {
    /// Load a manifest. Relative paths are resolved against its directory.
    pub fn load(path: &Path) -> Result<Self, ExamcropError> {
        let json = std::fs::read_to_string(path)?;
        let mut manifest: PartsManifest = serde_json::from_str(&json)?;
        if let Some(base) = path.parent() {
            for part in &mut manifest.parts {
                part.pdf = base.join(&part.pdf);
                part.segmentation = base.join(&part.segmentation);
                part.layout = part.layout.as_ref().map(|l| base.join(l));
            }
        }
        check_part_names(&manifest.parts)?;
        Ok(manifest)
    }
}

/// Part names become directories under the output root, so each must be a
/// single plain path component and unique within the batch.
pub fn check_part_names(parts: &[PartInput]) -> Result<(), ExamcropError> {
    let mut seen = HashSet::new();
    for part in parts {
        let invalid = |reason| ExamcropError::InvalidPartName {
            part: part.name.clone(),
            reason,
        };
        let mut components = Path::new(&part.name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(invalid("must be a plain directory name")),
        }
        if part.name.contains(['/', '\\']) {
            return Err(invalid("must be a plain directory name"));
        }
        if !seen.insert(part.name.as_str()) {
            return Err(invalid("used by more than one part"));
        }
    }
    Ok(())
}

/// Run one part and raise `cancel` when it fails for a reason of its own.
fn run_guarded(
    part: &PartInput,
    output_root: &Path,
    config: &EngineConfig,
    cancel: &AtomicBool,
) -> Result<PartOutcome, ExamcropError> {
    let result = run_part(part, &output_root.join(&part.name), config, cancel);
    if let Err(ref e) = result {
        if !matches!(e, ExamcropError::Cancelled) {
            error!(part = %part.name, "{e}; cancelling remaining parts");
            cancel.store(true, Ordering::Relaxed);
        }
    }
    result
}

/// Run every part, each into `output_root/<part name>`.
///
/// Uses `min(workers, parts)` threads. Outcomes come back in input order
/// regardless of completion order.
pub fn run_batch(
    parts: &[PartInput],
    output_root: &Path,
    config: &EngineConfig,
    workers: usize,
) -> Result<Vec<PartOutcome>, ExamcropError> {
    if parts.is_empty() {
        return Ok(Vec::new());
    }
    check_part_names(parts)?;
    let threads = workers.min(parts.len()).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("examcrop-part-{i}"))
        .build()
        .map_err(|e| std::io::Error::other(format!("cannot start worker pool: {e}")))?;
    info!(parts = parts.len(), threads, "starting batch");

    let cancel = AtomicBool::new(false);
    let results: Vec<Result<PartOutcome, ExamcropError>> = pool.install(|| {
        parts
            .par_iter()
            .map(|part| run_guarded(part, output_root, config, &cancel))
            .collect()
    });

    let mut outcomes = Vec::with_capacity(results.len());
    let mut cancelled = None;
    for (part, result) in parts.iter().zip(results) {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(ExamcropError::Cancelled) => {
                cancelled.get_or_insert_with(|| part.name.clone());
            }
            Err(e) => {
                return Err(ExamcropError::PartPipelineFailure {
                    part: part.name.clone(),
                    source: Box::new(e),
                });
            }
        }
    }
    if let Some(part) = cancelled {
        return Err(ExamcropError::PartPipelineFailure {
            part,
            source: Box::new(ExamcropError::Cancelled),
        });
    }
    Ok(outcomes)
}

/// Summarize a finished batch, parts in input order.
pub fn summarize(outcomes: &[PartOutcome]) -> RunSummary {
    RunSummary {
        parts: outcomes.iter().map(PartOutcome::summary).collect(),
    }
}
