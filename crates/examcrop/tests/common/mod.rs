//! PDF builders shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use examcrop::PartInput;
use lopdf::{Object, Stream, dictionary};

/// Escape a string for a PDF literal string.
pub fn pdf_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// A Helvetica 12pt line with its baseline at `(x, y)` in PDF user space.
pub fn text_at(x: f64, y: f64, text: &str) -> String {
    format!("BT /F1 12 Tf {x} {y} Td ({}) Tj ET\n", pdf_escape(text))
}

/// The shared image `/Im0` scaled over a user-space rectangle.
pub fn image_at(x: f64, y: f64, w: f64, h: f64) -> String {
    format!("q {w} 0 0 {h} {x} {y} cm /Im0 Do Q\n")
}

/// Build a 612x792 PDF with one page per content stream.
pub fn build_pdf(pages: &[String]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");

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

    let media_box = vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ];

    let mut page_ids = Vec::new();
    for content in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
        };
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => media_box.clone(),
            "Contents" => Object::Reference(content_id),
            "Resources" => resources,
        }));
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(pages.len() as i64),
    });
    for &pid in &page_ids {
        if let Ok(obj) = doc.get_object_mut(pid) {
            if let Ok(dict) = obj.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Write `<name>.pdf` and `<name>.json` into `dir` and describe them as a part.
pub fn write_part(dir: &Path, name: &str, pages: &[String], segmentation: &str) -> PartInput {
    let pdf: PathBuf = dir.join(format!("{name}.pdf"));
    std::fs::write(&pdf, build_pdf(pages)).unwrap();
    let seg = dir.join(format!("{name}.json"));
    std::fs::write(&seg, segmentation).unwrap();
    PartInput::new(name, pdf, seg)
}

/// Visible text of every page of a PDF file, one string per page.
pub fn page_texts(path: &Path) -> Vec<String> {
    let source = examcrop::examcrop_parse::SourceDocument::open(path).unwrap();
    (0..source.page_count())
        .map(|i| {
            source
                .page_layout(i)
                .unwrap()
                .spans
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}
