//! In-memory PDF builders for unit tests.

use lopdf::{Document, Stream, dictionary};

use crate::extract::finish_page_tree;

/// One page per entry, each entry being the page's content stream. Pages
/// share a Helvetica font `/F1` and a 2x2 gray image `/Im0`, and are 612x792.
pub(crate) fn document_with_pages(pages: &[&[u8]]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0, 255, 255, 0],
    ));

    let mut page_ids = Vec::new();
    for content in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => dictionary! { "Im0" => image_id },
            },
        }));
    }
    finish_page_tree(&mut doc, pages_id, &page_ids);
    doc
}

pub(crate) fn pdf_with_pages(pages: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::new();
    document_with_pages(pages)
        .save_to(&mut buf)
        .expect("failed to save test PDF");
    buf
}

/// A text line at `(x, y)` in PDF user space.
pub(crate) fn text_at(x: f64, y: f64, text: &str) -> String {
    format!("BT /F1 12 Tf {x} {y} Td ({text}) Tj ET\n")
}

/// Place the shared image over a user-space rectangle.
pub(crate) fn image_at(x: f64, y: f64, w: f64, h: f64) -> String {
    format!("q {w} 0 0 {h} {x} {y} cm /Im0 Do Q\n")
}
