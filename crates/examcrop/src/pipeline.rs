//! The per-part pipeline: validate, compute geometry, extract, assemble,
//! accept.
//!
//! Geometry for every segment is resolved before any file is written.
//! Failures below a single question are recorded and processing moves on;
//! failures that concern the whole part (unreadable source, unwritable
//! output, cancellation) end it with an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use examcrop_core::{
    BBox, EngineConfig, GeometryOutcome, PageLayout, PlacedSegment, Segment, SegmentationInput,
    SegmentationReport, check_acceptance, compute_bboxes, detect_choice_regions,
    validate_segmentation,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assemble::{assemble_question, inspect_file};
use crate::error::ExamcropError;
use crate::extract::write_region;
use crate::pdf::ExamPdf;
use crate::report::{
    ChoiceFile, FAILED_DIR, FAILED_LOG, FailedQuestion, GEOMETRY_FILE, GeometryFile,
    ProcessingStatistics, QUESTIONS_DIR, QUESTIONS_LIST, QuestionEntry, QuestionStatus,
    STATISTICS_FILE, choice_file_name, question_file_name, write_json,
};
use crate::summary::{PartStatus, PartSummary};

/// One logical part of an exam: a source PDF and its segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartInput {
    pub name: String,
    pub pdf: PathBuf,
    pub segmentation: PathBuf,
    /// Optional categorized page layouts overriding the computed blocks.
    #[serde(default)]
    pub layout: Option<PathBuf>,
}

impl PartInput {
    pub fn new(name: impl Into<String>, pdf: impl Into<PathBuf>, segmentation: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            pdf: pdf.into(),
            segmentation: segmentation.into(),
            layout: None,
        }
    }

    pub fn with_layout(mut self, layout: impl Into<PathBuf>) -> Self {
        self.layout = Some(layout.into());
        self
    }
}

/// What extraction produced for one part.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub questions: Vec<QuestionEntry>,
    pub failed: Vec<FailedQuestion>,
    pub statistics: ProcessingStatistics,
    /// Reasons for skipped questions, from the geometry pass.
    pub skip_reasons: Vec<String>,
}

/// Result of one part's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartOutcome {
    pub name: String,
    pub output_dir: PathBuf,
    pub status: PartStatus,
    pub report: SegmentationReport,
    pub extraction: Extraction,
}

impl Extraction {
    /// Record a question that produced no file.
    fn fail(&mut self, segment: &Segment, pdf_name: String, reason: String) {
        warn!(question = %segment.id, "question not produced: {reason}");
        self.failed.push(FailedQuestion {
            question_id: segment.id.clone(),
            pdf_name,
            reason,
        });
        self.questions
            .push(QuestionEntry::new(segment, QuestionStatus::Failed, None));
        self.statistics.record(QuestionStatus::Failed);
    }
}

impl PartOutcome {
    pub fn summary(&self) -> PartSummary {
        let stats = &self.extraction.statistics;
        let mut reasons: Vec<String> = self
            .report
            .errors()
            .map(|issue| format!("validation: {issue}"))
            .collect();
        reasons.extend(
            self.extraction
                .failed
                .iter()
                .map(|f| format!("{}: {}", f.question_id, f.reason)),
        );
        reasons.extend(self.extraction.skip_reasons.iter().cloned());
        PartSummary {
            part: self.name.clone(),
            status: self.status,
            output_dir: self.output_dir.clone(),
            questions: stats.questions,
            accepted: stats.accepted,
            rejected: stats.rejected,
            failed: stats.failed,
            skipped: stats.skipped,
            reasons,
        }
    }
}

pub fn load_segmentation(path: &Path) -> Result<Vec<Segment>, ExamcropError> {
    let json = std::fs::read_to_string(path)?;
    Ok(SegmentationInput::from_json(&json)?.into_segments())
}

/// Open a part's PDF and apply its layout overrides.
pub fn open_part_pdf(pdf: &Path, layout: Option<&Path>, config: &EngineConfig) -> Result<ExamPdf, ExamcropError> {
    let mut exam = ExamPdf::open(pdf, &config.layout)?;
    if let Some(layout) = layout {
        exam.apply_layout_overrides(ExamPdf::load_layout_overrides(layout)?);
    }
    Ok(exam)
}

/// Run the geometry pass and log what it could not place.
pub fn compute_geometry(pdf: &ExamPdf, segments: &[Segment], config: &EngineConfig) -> GeometryOutcome {
    let outcome = compute_bboxes(segments, pdf.layouts(), &config.bbox);
    for err in &outcome.skipped {
        warn!(segment = err.segment_id(), code = err.code(), "{err}");
    }
    for err in &outcome.fallbacks {
        warn!(segment = err.segment_id(), code = err.code(), "{err}; using page content box");
    }
    info!(
        placed = outcome.placed.len(),
        skipped = outcome.skipped.len(),
        fallbacks = outcome.fallbacks.len(),
        "computed geometry"
    );
    outcome
}

fn check_cancelled(cancel: &AtomicBool) -> Result<(), ExamcropError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(ExamcropError::Cancelled);
    }
    Ok(())
}

/// Write one region file per (page, bbox) pair. Failed regions are logged
/// and left out. Files are named by segment position, never by id.
fn write_segment_regions(
    pdf: &ExamPdf,
    placed: &PlacedSegment,
    index: usize,
    work_dir: &Path,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for (k, (page, bbox)) in placed.regions().enumerate() {
        let path = work_dir.join(format!("region_{index:04}_{k}.pdf"));
        match write_region(pdf.source(), page, &bbox, &path) {
            Ok(()) => paths.push(path),
            Err(e) => warn!(segment = placed.id(), page, "region skipped: {e}"),
        }
    }
    paths
}

/// Restrict a page to what lies inside `bbox`.
fn crop_layout(page: &PageLayout, bbox: &BBox) -> PageLayout {
    let mut cropped = PageLayout::new(page.index, page.width, page.height);
    cropped.blocks = page
        .blocks
        .iter()
        .filter(|b| bbox.contains_point(b.bbox.center()))
        .cloned()
        .collect();
    cropped.images = page
        .images
        .iter()
        .filter(|b| bbox.contains_point(b.center()))
        .copied()
        .collect();
    cropped
}

/// Write per-choice files for an accepted question whose options are laid
/// out as separate diagrams.
fn write_choice_files(
    pdf: &ExamPdf,
    placed: &PlacedSegment,
    questions_dir: &Path,
    config: &EngineConfig,
) -> Vec<ChoiceFile> {
    let mut files: Vec<ChoiceFile> = Vec::new();
    for (page_number, bbox) in placed.regions() {
        let Some(page) = pdf.layout(page_number) else {
            continue;
        };
        let regions = detect_choice_regions(&crop_layout(page, &bbox), &config.choice);
        if regions.len() < 2 {
            continue;
        }
        for region in regions {
            if files.iter().any(|f| f.letter == region.letter) {
                continue;
            }
            let Some(choice_bbox) = region.bbox.intersection(&bbox) else {
                continue;
            };
            let name = choice_file_name(placed.segment(), &region.letter);
            match write_region(pdf.source(), page_number, &choice_bbox, &questions_dir.join(&name)) {
                Ok(()) => files.push(ChoiceFile {
                    letter: region.letter,
                    page: page_number,
                    bbox: choice_bbox,
                    pdf: format!("{QUESTIONS_DIR}/{name}"),
                }),
                Err(e) => warn!(question = placed.id(), letter = %region.letter, "choice region skipped: {e}"),
            }
        }
    }
    files
}

/// Extract, assemble and accept every placed question.
///
/// Writes `questions/`, `failed_questions/`, `failed_questions_log.json`,
/// `processing_statistics.json` and `questions_list.json` under
/// `output_dir`. Region files live in a temporary directory removed on
/// return.
pub fn extract_questions(
    pdf: &ExamPdf,
    geometry: &GeometryFile,
    output_dir: &Path,
    config: &EngineConfig,
    cancel: &AtomicBool,
) -> Result<Extraction, ExamcropError> {
    let questions_dir = output_dir.join(QUESTIONS_DIR);
    let failed_dir = output_dir.join(FAILED_DIR);
    std::fs::create_dir_all(&questions_dir)?;
    std::fs::create_dir_all(&failed_dir)?;
    let work = tempfile::Builder::new().prefix("examcrop-").tempdir()?;

    // Region files per segment position. References are looked up by id;
    // with repeated ids the first segment wins.
    let mut own_regions: Vec<Vec<PathBuf>> = Vec::with_capacity(geometry.segments.len());
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for (index, placed) in geometry.segments.iter().enumerate() {
        check_cancelled(cancel)?;
        own_regions.push(write_segment_regions(pdf, placed, index, work.path()));
        by_id.entry(placed.id()).or_insert(index);
    }

    let mut extraction = Extraction {
        statistics: ProcessingStatistics::from_segments(&geometry.all_segments()),
        ..Extraction::default()
    };
    let mut claimed: HashMap<String, &str> = HashMap::new();

    for (placed, own) in geometry
        .segments
        .iter()
        .zip(&own_regions)
        .filter(|(p, _)| p.segment().is_question())
    {
        check_cancelled(cancel)?;
        let segment = placed.segment();
        let file_name = question_file_name(segment);

        if let Some(owner) = claimed.get(&file_name) {
            let reason = format!("output name {file_name} is already used by {owner}");
            extraction.fail(segment, file_name, reason);
            continue;
        }
        claimed.insert(file_name.clone(), &segment.id);

        let mut inputs: Vec<&Path> = Vec::new();
        for reference in &segment.references {
            match by_id.get(reference.as_str()) {
                Some(&index) => inputs.extend(own_regions[index].iter().map(PathBuf::as_path)),
                None => warn!(question = %segment.id, reference = %reference, "reference has no regions"),
            }
        }
        let reference_pages = inputs.len();
        inputs.extend(own.iter().map(PathBuf::as_path));

        let staged = work.path().join(&file_name);
        let assembled = assemble_question(&segment.id, &inputs, &staged)
            .and_then(|_| inspect_file(&staged, reference_pages, &config.layout));
        let content = match assembled {
            Ok(content) => content,
            Err(e) => {
                extraction.fail(segment, file_name, e.to_string());
                continue;
            }
        };

        let expected = segment.question_number();
        let entry = match check_acceptance(&content, expected, &config.acceptance) {
            Ok(()) => {
                std::fs::copy(&staged, questions_dir.join(&file_name))?;
                debug!(question = %segment.id, pages = content.page_count, "accepted");
                let mut entry = QuestionEntry::new(
                    segment,
                    QuestionStatus::Accepted,
                    Some(format!("{QUESTIONS_DIR}/{file_name}")),
                );
                if config.emit_choice_regions {
                    entry.choices = write_choice_files(pdf, placed, &questions_dir, config);
                }
                entry
            }
            Err(rejection) => {
                std::fs::copy(&staged, failed_dir.join(&file_name))?;
                warn!(question = %segment.id, rule = %rejection.rule, "rejected: {}", rejection.message);
                extraction.failed.push(FailedQuestion {
                    question_id: segment.id.clone(),
                    pdf_name: file_name.clone(),
                    reason: rejection.to_string(),
                });
                QuestionEntry::new(
                    segment,
                    QuestionStatus::Rejected,
                    Some(format!("{FAILED_DIR}/{file_name}")),
                )
            }
        };
        extraction.statistics.record(entry.status);
        extraction.questions.push(entry);
    }

    let skipped_ids: Vec<&str> = geometry.skipped.iter().map(|i| i.segment_id.as_str()).collect();
    for segment in geometry.unplaced.iter().filter(|s| s.is_question()) {
        extraction
            .questions
            .push(QuestionEntry::new(segment, QuestionStatus::Skipped, None));
        extraction.statistics.record(QuestionStatus::Skipped);
        if !skipped_ids.contains(&segment.id.as_str()) {
            extraction.skip_reasons.push(format!("{}: no geometry", segment.id));
        }
    }
    extraction.skip_reasons.extend(
        geometry
            .skipped
            .iter()
            .filter(|i| geometry.unplaced.iter().any(|s| s.id == i.segment_id && s.is_question()))
            .map(|i| format!("{}: {}", i.segment_id, i.message)),
    );

    write_json(&output_dir.join(FAILED_LOG), &extraction.failed)?;
    write_json(&output_dir.join(STATISTICS_FILE), &extraction.statistics)?;
    write_json(&output_dir.join(QUESTIONS_LIST), &extraction.questions)?;
    Ok(extraction)
}

/// Run the full pipeline for one part into `output_dir`.
pub fn run_part(
    input: &PartInput,
    output_dir: &Path,
    config: &EngineConfig,
    cancel: &AtomicBool,
) -> Result<PartOutcome, ExamcropError> {
    info!(part = %input.name, pdf = %input.pdf.display(), "processing part");
    std::fs::create_dir_all(output_dir)?;
    let segments = load_segmentation(&input.segmentation)?;
    let pdf = open_part_pdf(&input.pdf, input.layout.as_deref(), config)?;
    check_cancelled(cancel)?;

    let report = validate_segmentation(&segments, Some(pdf.page_count()), &config.profile, &config.validator);
    for issue in report.issues() {
        if issue.is_error() {
            warn!(part = %input.name, "{issue}");
        } else {
            debug!(part = %input.name, "{issue}");
        }
    }
    if config.strict_validation && report.has_errors() {
        warn!(part = %input.name, "segmentation failed strict validation");
        return Ok(PartOutcome {
            name: input.name.clone(),
            output_dir: output_dir.to_path_buf(),
            status: PartStatus::FailedValidation,
            extraction: Extraction {
                statistics: ProcessingStatistics::from_segments(&segments),
                ..Extraction::default()
            },
            report,
        });
    }

    let outcome = compute_geometry(&pdf, &segments, config);
    let geometry = GeometryFile::new(&outcome, &segments);
    write_json(&output_dir.join(GEOMETRY_FILE), &geometry)?;

    let extraction = extract_questions(&pdf, &geometry, output_dir, config, cancel)?;
    let status = PartStatus::from_counts(extraction.statistics.questions, extraction.statistics.accepted);
    info!(
        part = %input.name,
        %status,
        accepted = extraction.statistics.accepted,
        questions = extraction.statistics.questions,
        "part finished"
    );
    Ok(PartOutcome {
        name: input.name.clone(),
        output_dir: output_dir.to_path_buf(),
        status,
        report,
        extraction,
    })
}
