use std::path::Path;

use examcrop::examcrop_core::{ChoiceRegion, TextBlock, detect_choice_regions};
use serde::Serialize;

use crate::cli::{EngineArgs, OutputFormat};
use crate::shared::{load_config, open_pdf, print_json};

#[derive(Serialize)]
struct PageBlocks<'a> {
    page: usize,
    width: f64,
    height: f64,
    blocks: &'a [TextBlock],
    images: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    choices: Option<Vec<ChoiceRegion>>,
}

pub fn run(
    file: &Path,
    page: Option<usize>,
    layout: Option<&Path>,
    choices: bool,
    format: OutputFormat,
) -> Result<(), i32> {
    let config = load_config(&EngineArgs::default())?;
    let pdf = open_pdf(file, layout, &config)?;

    let pages: Vec<usize> = match page {
        Some(n) if n >= 1 && n <= pdf.page_count() => vec![n],
        Some(n) => {
            eprintln!("Error: page {n} out of range (document has {} pages)", pdf.page_count());
            return Err(1);
        }
        None => (1..=pdf.page_count()).collect(),
    };

    let mut output = Vec::with_capacity(pages.len());
    for n in pages {
        let Some(layout) = pdf.layout(n) else {
            continue;
        };
        output.push(PageBlocks {
            page: n,
            width: layout.width,
            height: layout.height,
            blocks: &layout.blocks,
            images: layout.images.len(),
            choices: choices.then(|| detect_choice_regions(layout, &config.choice)),
        });
    }

    match format {
        OutputFormat::Text => {
            for page in &output {
                println!("--- Page {} ({} x {}) ---", page.page, page.width, page.height);
                for block in page.blocks {
                    let category = block.category.map_or("-", |c| c.as_str());
                    println!(
                        "{:>7.1} {:>7.1} {:>7.1} {:>7.1}  {:<22} {}",
                        block.bbox.x0,
                        block.bbox.top,
                        block.bbox.x1,
                        block.bbox.bottom,
                        category,
                        block.text.replace('\n', " / ")
                    );
                }
                if page.images > 0 {
                    println!("{} image(s)", page.images);
                }
                if let Some(ref regions) = page.choices {
                    for region in regions {
                        println!(
                            "choice {}: {:.1} {:.1} {:.1} {:.1}",
                            region.letter,
                            region.bbox.x0,
                            region.bbox.top,
                            region.bbox.x1,
                            region.bbox.bottom
                        );
                    }
                }
            }
        }
        OutputFormat::Json => print_json(&output)?,
    }
    Ok(())
}
