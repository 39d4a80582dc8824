use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// Cut exam PDFs into one cropped PDF per question.
#[derive(Debug, Parser)]
#[command(name = "examcrop", about, version)]
pub struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check a segmentation file for structural problems
    Validate {
        /// Path to the segmentation JSON
        #[arg(value_name = "SEGMENTATION")]
        segmentation: PathBuf,

        /// Source PDF, enables the page-range check
        #[arg(long)]
        pdf: Option<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Compute one bounding box per page for every segment
    ComputeBboxes {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Path to the segmentation JSON
        #[arg(value_name = "SEGMENTATION")]
        segmentation: PathBuf,

        /// Directory for segments_with_bboxes.json
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Categorized page layouts overriding the computed blocks
        #[arg(long)]
        layout: Option<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Extract, assemble and accept questions from a computed geometry file
    Extract {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// segments_with_bboxes.json from compute-bboxes
        #[arg(value_name = "GEOMETRY")]
        geometry: PathBuf,

        /// Output directory for questions/ and failed_questions/
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// Categorized page layouts overriding the computed blocks
        #[arg(long)]
        layout: Option<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,

        /// Output format of the summary
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the categorized text blocks of each page
    Blocks {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Only this page (1-based). Default: all pages
        #[arg(long)]
        page: Option<usize>,

        /// Categorized page layouts overriding the computed blocks
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Also list diagram choice regions found on each page
        #[arg(long)]
        choices: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Run the whole pipeline for one part or a parts manifest
    Run {
        /// Path to the PDF file (single part)
        #[arg(value_name = "FILE", required_unless_present = "parts")]
        file: Option<PathBuf>,

        /// Path to the segmentation JSON (single part)
        #[arg(value_name = "SEGMENTATION", required_unless_present = "parts")]
        segmentation: Option<PathBuf>,

        /// Parts manifest: {"parts": [{"name", "pdf", "segmentation", "layout"?}]}
        #[arg(long, conflicts_with_all = ["file", "segmentation"])]
        parts: Option<PathBuf>,

        /// Output root; each part writes into <output-dir>/<part name>
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// Categorized page layouts overriding the computed blocks (single part)
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Number of parts processed concurrently
        #[arg(long, default_value_t = 2)]
        workers: usize,

        #[command(flatten)]
        engine: EngineArgs,

        /// Output format of the summary
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// Engine configuration: a JSON file plus flag overrides.
#[derive(Debug, Clone, Default, Args)]
pub struct EngineArgs {
    /// Engine configuration JSON; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Test profile: invierno, regular or seleccion
    #[arg(long)]
    pub test_type: Option<String>,

    /// Flag segments spanning more pages than this
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Stop a part on validation errors and exit non-zero on any rejected question
    #[arg(long)]
    pub strict: bool,

    /// Reject question files that do not show their own question number
    #[arg(long)]
    pub check_numbers: bool,

    /// Reject question files with more than one page
    #[arg(long)]
    pub single_page: bool,

    /// Page margin in points
    #[arg(long)]
    pub margin: Option<f64>,

    /// Write one PDF per diagram choice next to each accepted question
    #[arg(long)]
    pub choices: bool,
}

/// Output format for reports and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON
    Json,
}
