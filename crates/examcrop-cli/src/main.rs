mod bboxes_cmd;
mod blocks_cmd;
mod cli;
mod extract_cmd;
mod run_cmd;
mod shared;
mod validate_cmd;

use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();
    shared::init_logging(cli.verbose);

    let result = match cli.command {
        cli::Commands::Validate {
            ref segmentation,
            ref pdf,
            ref engine,
            format,
        } => validate_cmd::run(segmentation, pdf.as_deref(), engine, format),
        cli::Commands::ComputeBboxes {
            ref file,
            ref segmentation,
            ref output_dir,
            ref layout,
            ref engine,
        } => bboxes_cmd::run(file, segmentation, output_dir, layout.as_deref(), engine),
        cli::Commands::Extract {
            ref file,
            ref geometry,
            ref output_dir,
            ref layout,
            ref engine,
            format,
        } => extract_cmd::run(file, geometry, output_dir, layout.as_deref(), engine, format),
        cli::Commands::Blocks {
            ref file,
            page,
            ref layout,
            choices,
            format,
        } => blocks_cmd::run(file, page, layout.as_deref(), choices, format),
        cli::Commands::Run {
            ref file,
            ref segmentation,
            ref parts,
            ref output_dir,
            ref layout,
            workers,
            ref engine,
            format,
        } => run_cmd::run(
            &run_cmd::RunArgs {
                file: file.as_deref(),
                segmentation: segmentation.as_deref(),
                parts: parts.as_deref(),
                layout: layout.as_deref(),
                output_dir,
                workers,
            },
            engine,
            format,
        ),
    };

    if let Err(code) = result {
        std::process::exit(code);
    }
}
