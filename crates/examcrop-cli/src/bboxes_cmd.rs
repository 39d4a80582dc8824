use std::path::Path;

use examcrop::report::GEOMETRY_FILE;
use examcrop::{GeometryFile, compute_geometry, load_segmentation};

use tracing::info;

use crate::cli::EngineArgs;
use crate::shared::{load_config, open_pdf};

pub fn run(
    file: &Path,
    segmentation: &Path,
    output_dir: &Path,
    layout: Option<&Path>,
    engine: &EngineArgs,
) -> Result<(), i32> {
    let config = load_config(engine)?;
    let pdf = open_pdf(file, layout, &config)?;
    let segments = load_segmentation(segmentation).map_err(|e| {
        eprintln!("Error: failed to read segmentation: {e}");
        1
    })?;

    let outcome = compute_geometry(&pdf, &segments, &config);
    let geometry = GeometryFile::new(&outcome, &segments);
    info!(
        placed = geometry.segments.len(),
        fallbacks = geometry.fallbacks.len(),
        "computed geometry"
    );

    std::fs::create_dir_all(output_dir).map_err(|e| {
        eprintln!("Error: cannot create {}: {e}", output_dir.display());
        1
    })?;
    let path = output_dir.join(GEOMETRY_FILE);
    examcrop::report::write_json(&path, &geometry).map_err(|e| {
        eprintln!("Error: {e}");
        1
    })?;

    println!(
        "{} of {} segments placed, {} skipped, {} fallback(s) -> {}",
        geometry.segments.len(),
        segments.len(),
        geometry.skipped.len(),
        geometry.fallbacks.len(),
        path.display()
    );
    for issue in &geometry.skipped {
        println!("  skipped {}: {}", issue.segment_id, issue.message);
    }
    Ok(())
}
