use std::path::Path;

use examcrop::examcrop_core::{CountCheck, Severity, validate_segmentation};
use examcrop::load_segmentation;

use crate::cli::{EngineArgs, OutputFormat};
use crate::shared::{load_config, open_pdf, print_json};

pub fn run(
    segmentation: &Path,
    pdf: Option<&Path>,
    engine: &EngineArgs,
    format: OutputFormat,
) -> Result<(), i32> {
    let config = load_config(engine)?;
    let segments = load_segmentation(segmentation).map_err(|e| {
        eprintln!("Error: failed to read segmentation: {e}");
        1
    })?;
    let page_count = match pdf {
        Some(file) => Some(open_pdf(file, None, &config)?.page_count()),
        None => None,
    };

    let report = validate_segmentation(&segments, page_count, &config.profile, &config.validator);
    let error_count = report.errors().count();
    let warning_count = report.warnings().count();

    match format {
        OutputFormat::Text => {
            println!("Profile: {}", report.profile());
            println!("Segments: {}", segments.len());
            match report.count() {
                CountCheck::NotApplicable { found } => println!("Questions: {found}"),
                CountCheck::Exact { expected } => println!("Questions: {expected} of {expected}"),
                CountCheck::Missing { expected, found, .. }
                | CountCheck::AnomalouslyLow { expected, found }
                | CountCheck::Excess { expected, found, .. } => {
                    println!("Questions: {found} of {expected}")
                }
            }
            if !report.numbering_gaps().is_empty() {
                let note = if report.gaps_expected() { " (expected for this test type)" } else { "" };
                println!("Numbering gaps: {:?}{note}", report.numbering_gaps());
            }
            if report.issues().is_empty() {
                println!("No issues found.");
            } else {
                println!();
                for issue in report.issues() {
                    let severity = match issue.severity {
                        Severity::Error => "ERROR",
                        Severity::Warning => "WARNING",
                        Severity::Info => "INFO",
                    };
                    print!("[{severity}] {}: {}", issue.code, issue.message);
                    if let Some(ref loc) = issue.location {
                        print!(" (at {loc})");
                    }
                    println!();
                }
                println!();
                println!("Summary: {error_count} error(s), {warning_count} warning(s)");
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "report": report,
                "summary": {
                    "errors": error_count,
                    "warnings": warning_count,
                },
            });
            print_json(&output)?;
        }
    }

    if config.strict_validation && report.has_errors() {
        return Err(1);
    }
    Ok(())
}
