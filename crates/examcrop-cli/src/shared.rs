use std::path::Path;

use examcrop::{EngineConfig, ExamPdf, TestProfile, open_part_pdf};
use tracing_subscriber::EnvFilter;

use crate::cli::EngineArgs;

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v` flags.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Build the engine configuration from `--config` and the flag overrides.
pub fn load_config(args: &EngineArgs) -> Result<EngineConfig, i32> {
    let mut config = match args.config {
        Some(ref path) => {
            let json = std::fs::read_to_string(path).map_err(|e| {
                eprintln!("Error: cannot read config {}: {e}", path.display());
                1
            })?;
            EngineConfig::from_json(&json).map_err(|e| {
                eprintln!("Error: invalid config {}: {e}", path.display());
                1
            })?
        }
        None => EngineConfig::default(),
    };

    if let Some(ref name) = args.test_type {
        config.profile = TestProfile::builtin(name).ok_or_else(|| {
            eprintln!("Error: unknown test type '{name}' (expected invierno, regular or seleccion)");
            1
        })?;
    }
    if let Some(max_pages) = args.max_pages {
        config.validator.max_pages = max_pages;
    }
    if let Some(margin) = args.margin {
        config.set_page_margin(margin);
    }
    if args.strict {
        config.strict_validation = true;
    }
    if args.check_numbers {
        config.acceptance.check_question_number = true;
    }
    if args.single_page {
        config.acceptance.strict_single_page = true;
    }
    if args.choices {
        config.emit_choice_regions = true;
    }
    Ok(config)
}

/// Open a PDF file with user-friendly error messages.
///
/// Returns `Err(1)` with a message printed to stderr if the file is not found
/// or cannot be read as a PDF.
pub fn open_pdf(file: &Path, layout: Option<&Path>, config: &EngineConfig) -> Result<ExamPdf, i32> {
    if !file.exists() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(1);
    }
    open_part_pdf(file, layout, config).map_err(|e| {
        eprintln!("Error: failed to open PDF: {e}");
        1
    })
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), i32> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        eprintln!("Error: failed to serialize output: {e}");
        1
    })?;
    println!("{json}");
    Ok(())
}
