use std::path::Path;

use examcrop::{PartInput, PartStatus, PartsManifest, run_batch, summarize};
use tracing::{debug, info};

use crate::cli::{EngineArgs, OutputFormat};
use crate::shared::{load_config, print_json};

pub struct RunArgs<'a> {
    pub file: Option<&'a Path>,
    pub segmentation: Option<&'a Path>,
    pub parts: Option<&'a Path>,
    pub layout: Option<&'a Path>,
    pub output_dir: &'a Path,
    pub workers: usize,
}

fn part_inputs(args: &RunArgs<'_>) -> Result<Vec<PartInput>, i32> {
    if let Some(path) = args.parts {
        let manifest = PartsManifest::load(path).map_err(|e| {
            eprintln!("Error: failed to read parts manifest: {e}");
            1
        })?;
        debug!(manifest = %path.display(), parts = manifest.parts.len(), "loaded parts manifest");
        return Ok(manifest.parts);
    }
    let (Some(file), Some(segmentation)) = (args.file, args.segmentation) else {
        eprintln!("Error: either FILE and SEGMENTATION or --parts is required");
        return Err(1);
    };
    if !file.exists() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(1);
    }
    let name = file
        .file_stem()
        .map_or_else(|| "part".to_string(), |s| s.to_string_lossy().into_owned());
    let mut input = PartInput::new(name, file, segmentation);
    if let Some(layout) = args.layout {
        input = input.with_layout(layout);
    }
    Ok(vec![input])
}

pub fn run(args: &RunArgs<'_>, engine: &EngineArgs, format: OutputFormat) -> Result<(), i32> {
    let config = load_config(engine)?;
    let parts = part_inputs(args)?;
    info!(
        parts = parts.len(),
        workers = args.workers,
        output = %args.output_dir.display(),
        "starting run"
    );

    let outcomes = run_batch(&parts, args.output_dir, &config, args.workers).map_err(|e| {
        eprintln!("Error: {e}");
        1
    })?;
    let summary = summarize(&outcomes);
    debug!(all_succeeded = summary.all_succeeded(), "run finished");

    match format {
        OutputFormat::Text => print!("{summary}"),
        OutputFormat::Json => print_json(&summary)?,
    }

    if config.strict_validation {
        let failed_validation = outcomes
            .iter()
            .any(|o| o.status == PartStatus::FailedValidation);
        let rejected = outcomes
            .iter()
            .map(|o| o.extraction.statistics.rejected + o.extraction.statistics.failed)
            .sum::<usize>();
        if failed_validation || rejected > 0 {
            return Err(2);
        }
    }
    Ok(())
}
