//! Source exam document: the PDF plus the page layouts the engine reads.

use std::path::{Path, PathBuf};

use examcrop_core::{
    LayoutOptions, PageLayout, categorize_blocks, group_spans_into_blocks,
};
use examcrop_parse::SourceDocument;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::ExamcropError;

/// A source PDF opened for segmentation.
///
/// Page layouts are built once on open: spans are interpreted from the
/// content streams, grouped into blocks, and blocks without a category get
/// one from the fallback heuristics.
///
/// # Example
///
/// ```ignore
/// let pdf = ExamPdf::open("exam.pdf", &LayoutOptions::default())?;
/// let first = &pdf.layouts()[0];
/// println!("{} blocks on page 1", first.blocks.len());
/// ```
#[derive(Debug)]
pub struct ExamPdf {
    source: SourceDocument,
    path: Option<PathBuf>,
    layouts: Vec<PageLayout>,
}

/// Interpret every page of `source` on the rayon pool, in page order.
pub fn interpret_pages(source: &SourceDocument) -> Result<Vec<PageLayout>, ExamcropError> {
    let pages = (0..source.page_count())
        .into_par_iter()
        .map(|i| source.page_layout(i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pages)
}

/// Build blocks and fallback categories for interpreted pages.
pub fn build_layouts(mut pages: Vec<PageLayout>, options: &LayoutOptions) -> Vec<PageLayout> {
    for page in &mut pages {
        page.blocks = group_spans_into_blocks(&page.spans, options);
        let categorized = categorize_blocks(&mut page.blocks);
        debug!(
            page = page.number(),
            blocks = page.blocks.len(),
            categorized,
            "built page layout"
        );
    }
    pages
}

impl ExamPdf {
    pub fn open(path: impl AsRef<Path>, options: &LayoutOptions) -> Result<Self, ExamcropError> {
        let path = path.as_ref();
        let source = SourceDocument::open(path)?;
        let mut pdf = Self::from_source(source, options)?;
        pdf.path = Some(path.to_path_buf());
        info!(path = %path.display(), pages = pdf.page_count(), "opened source PDF");
        Ok(pdf)
    }

    pub fn from_bytes(bytes: &[u8], options: &LayoutOptions) -> Result<Self, ExamcropError> {
        Self::from_source(SourceDocument::from_bytes(bytes)?, options)
    }

    fn from_source(source: SourceDocument, options: &LayoutOptions) -> Result<Self, ExamcropError> {
        let layouts = build_layouts(interpret_pages(&source)?, options);
        Ok(Self {
            source,
            path: None,
            layouts,
        })
    }

    /// Replace computed blocks with externally categorized ones.
    ///
    /// Each override page replaces the blocks of the page with the same
    /// index (and its image boxes, when it lists any). Blocks the override
    /// leaves uncategorized still get fallback categories. Pages beyond the
    /// document are ignored.
    pub fn apply_layout_overrides(&mut self, overrides: Vec<PageLayout>) {
        for mut page in overrides {
            let Some(target) = self.layouts.get_mut(page.index) else {
                warn!(page = page.number(), "layout override for a page the document lacks");
                continue;
            };
            categorize_blocks(&mut page.blocks);
            target.blocks = page.blocks;
            if !page.images.is_empty() {
                target.images = page.images;
            }
            debug!(page = target.number(), blocks = target.blocks.len(), "applied layout override");
        }
    }

    /// Read a layout override file: a JSON array of page layouts.
    pub fn load_layout_overrides(path: impl AsRef<Path>) -> Result<Vec<PageLayout>, ExamcropError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn page_count(&self) -> usize {
        self.layouts.len()
    }

    pub fn layouts(&self) -> &[PageLayout] {
        &self.layouts
    }

    /// Layout of a 1-based page number.
    pub fn layout(&self, page_number: usize) -> Option<&PageLayout> {
        page_number.checked_sub(1).and_then(|i| self.layouts.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examcrop_core::{BBox, BlockCategory, TextBlock};
    use lopdf::{Object, Stream, dictionary};

    fn one_page_pdf(content: &[u8]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn open_builds_blocks_and_categories() {
        let bytes = one_page_pdf(
            b"BT /F1 12 Tf 72 700 Td (1. Which of the following statements about cells is true?) Tj ET \
              BT /F1 12 Tf 72 650 Td (A) Tj ET",
        );
        let pdf = ExamPdf::from_bytes(&bytes, &LayoutOptions::default()).unwrap();
        assert_eq!(pdf.page_count(), 1);
        let page = pdf.layout(1).unwrap();
        assert_eq!(page.blocks.len(), 2);
        assert_eq!(page.blocks[0].category, Some(BlockCategory::QuestionText));
        assert_eq!(page.blocks[1].category, Some(BlockCategory::AnswerChoice));
        assert!(pdf.layout(0).is_none());
        assert!(pdf.layout(2).is_none());
    }

    #[test]
    fn pages_are_interpreted_in_page_order() {
        let texts: Vec<String> = ["Alpha", "Beta", "Gamma", "Delta", "Epsilon"]
            .iter()
            .map(|w| crate::testpdf::text_at(72.0, 700.0, w))
            .collect();
        let pages: Vec<&[u8]> = texts.iter().map(|t| t.as_bytes()).collect();
        let bytes = crate::testpdf::pdf_with_pages(&pages);
        let source = SourceDocument::from_bytes(&bytes).unwrap();

        let layouts = interpret_pages(&source).unwrap();
        let words: Vec<&str> = layouts.iter().map(|p| p.spans[0].text.as_str()).collect();
        assert_eq!(words, vec!["Alpha", "Beta", "Gamma", "Delta", "Epsilon"]);
        assert_eq!(layouts[4].number(), 5);
    }

    #[test]
    fn overrides_replace_blocks_of_matching_pages() {
        let bytes = one_page_pdf(b"BT /F1 12 Tf 72 700 Td (Some text here) Tj ET");
        let mut pdf = ExamPdf::from_bytes(&bytes, &LayoutOptions::default()).unwrap();

        let mut page = PageLayout::new(0, 612.0, 792.0);
        page.blocks = vec![
            TextBlock::new("Figure 1", BBox::new(72.0, 80.0, 140.0, 92.0))
                .with_category(BlockCategory::OtherLabel),
        ];
        let stray = PageLayout::new(5, 612.0, 792.0);
        pdf.apply_layout_overrides(vec![page, stray]);

        let blocks = &pdf.layout(1).unwrap().blocks;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].category, Some(BlockCategory::OtherLabel));
        // Spans still come from the PDF.
        assert_eq!(pdf.layout(1).unwrap().spans.len(), 1);
    }
}
