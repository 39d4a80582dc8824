//! Document assembly: ordered region files merged into one question file,
//! and inspection of the result for the acceptance rules.

use std::path::Path;

use examcrop_core::{AssembledContent, LayoutOptions};
use examcrop_parse::SourceDocument;
use lopdf::{Document, Object};
use tracing::debug;

use crate::error::ExamcropError;
use crate::extract::{ObjectCopier, finish_page_tree, save_document};
use crate::pdf::{build_layouts, interpret_pages};

/// Merge region documents into one, pages in input order.
///
/// Inherited page attributes (MediaBox, Resources) are written onto each
/// copied page. Fails with [`ExamcropError::EmptyMergeResult`] when there is
/// nothing to merge.
pub fn merge_documents<P: AsRef<Path>>(
    question_id: &str,
    region_paths: &[P],
) -> Result<Document, ExamcropError> {
    let empty = || ExamcropError::EmptyMergeResult {
        question_id: question_id.to_string(),
    };
    if region_paths.is_empty() {
        return Err(empty());
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut page_ids = Vec::new();

    for path in region_paths {
        let source = SourceDocument::open(path.as_ref())?;
        let mut copier = ObjectCopier::new(source.inner());
        for index in 0..source.page_count() {
            let page_dict = source
                .inner()
                .get_object(source.page_id(index)?)
                .and_then(|o| o.as_dict())
                .map_err(|e| ExamcropError::region(index + 1, format!("bad page object: {e}")))?;
            let mut page = copier.copy_dict(&mut doc, page_dict);

            if page.get(b"MediaBox").is_err() {
                let mb = source.media_box(index)?;
                page.set(
                    "MediaBox",
                    vec![
                        Object::Real(mb.llx as f32),
                        Object::Real(mb.lly as f32),
                        Object::Real(mb.urx as f32),
                        Object::Real(mb.ury as f32),
                    ],
                );
            }
            if page.get(b"Resources").is_err() {
                let resources = copier.copy_dict(&mut doc, source.page_resources(index)?);
                page.set("Resources", resources);
            }
            page.set("Parent", pages_id);
            page_ids.push(doc.add_object(page));
        }
    }

    if page_ids.is_empty() {
        return Err(empty());
    }
    finish_page_tree(&mut doc, pages_id, &page_ids);
    debug!(question = question_id, pages = page_ids.len(), "merged regions");
    Ok(doc)
}

/// Merge region files and write the result. Returns the page count.
///
/// No file is written when the merge fails.
pub fn assemble_question<P: AsRef<Path>>(
    question_id: &str,
    region_paths: &[P],
    output: &Path,
) -> Result<usize, ExamcropError> {
    let mut doc = merge_documents(question_id, region_paths)?;
    let pages = doc.get_pages().len();
    save_document(&mut doc, output)?;
    Ok(pages)
}

/// Read back what an assembled file shows: page count, visible text in
/// reading order and the number of image placements. The first
/// `reference_pages` pages are shared references; their text is kept out of
/// [`AssembledContent::question_text`].
pub fn inspect_document(
    source: &SourceDocument,
    reference_pages: usize,
    options: &LayoutOptions,
) -> Result<AssembledContent, ExamcropError> {
    let layouts = build_layouts(interpret_pages(source)?, options);
    let mut content = AssembledContent {
        page_count: layouts.len(),
        ..AssembledContent::default()
    };
    for (i, page) in layouts.iter().enumerate() {
        content.image_count += page.images.len();
        for block in &page.blocks {
            content.text.push_str(&block.text);
            content.text.push('\n');
            if i >= reference_pages {
                content.question_text.push_str(&block.text);
                content.question_text.push('\n');
            }
        }
    }
    Ok(content)
}

pub fn inspect_file(
    path: &Path,
    reference_pages: usize,
    options: &LayoutOptions,
) -> Result<AssembledContent, ExamcropError> {
    inspect_document(&SourceDocument::open(path)?, reference_pages, options)
}
