use std::path::Path;
use std::sync::atomic::AtomicBool;

use examcrop::report::{FAILED_LOG, QUESTIONS_DIR};
use examcrop::{GeometryFile, PartStatus, PartSummary, RunSummary, extract_questions};

use tracing::info;

use crate::cli::{EngineArgs, OutputFormat};
use crate::shared::{load_config, open_pdf, print_json};

pub fn run(
    file: &Path,
    geometry: &Path,
    output_dir: &Path,
    layout: Option<&Path>,
    engine: &EngineArgs,
    format: OutputFormat,
) -> Result<(), i32> {
    let config = load_config(engine)?;
    let pdf = open_pdf(file, layout, &config)?;
    let geometry = GeometryFile::load(geometry).map_err(|e| {
        eprintln!("Error: failed to read geometry: {e}");
        1
    })?;

    info!(segments = geometry.segments.len(), output = %output_dir.display(), "extracting questions");
    let extraction = extract_questions(&pdf, &geometry, output_dir, &config, &AtomicBool::new(false))
        .map_err(|e| {
            eprintln!("Error: {e}");
            1
        })?;

    let stats = &extraction.statistics;
    let mut reasons: Vec<String> = extraction
        .failed
        .iter()
        .map(|f| format!("{}: {}", f.question_id, f.reason))
        .collect();
    reasons.extend(extraction.skip_reasons.iter().cloned());
    let summary = RunSummary {
        parts: vec![PartSummary {
            part: file
                .file_stem()
                .map_or_else(|| "part".to_string(), |s| s.to_string_lossy().into_owned()),
            status: PartStatus::from_counts(stats.questions, stats.accepted),
            output_dir: output_dir.to_path_buf(),
            questions: stats.questions,
            accepted: stats.accepted,
            rejected: stats.rejected,
            failed: stats.failed,
            skipped: stats.skipped,
            reasons,
        }],
    };

    match format {
        OutputFormat::Text => {
            print!("{summary}");
            println!(
                "Accepted files in {}, failures logged in {}",
                output_dir.join(QUESTIONS_DIR).display(),
                output_dir.join(FAILED_LOG).display()
            );
        }
        OutputFormat::Json => print_json(&summary)?,
    }

    if config.strict_validation && stats.rejected + stats.failed > 0 {
        return Err(2);
    }
    Ok(())
}
