//! Fixtures shared by the CLI tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use lopdf::{Object, Stream, dictionary};

pub fn cmd() -> Command {
    Command::cargo_bin("examcrop").unwrap()
}

fn text_at(x: f64, y: f64, text: &str) -> String {
    format!("BT /F1 12 Tf {x} {y} Td ({text}) Tj ET\n")
}

/// Two-page exam: questions 1 and 2 stacked on page 1, a short question 3
/// on page 2.
pub fn exam_pdf() -> Vec<u8> {
    let pages = [
        format!(
            "{}{}",
            text_at(72.0, 700.0, "1. Cual de los siguientes numeros es primo y mayor que diez"),
            text_at(72.0, 400.0, "2. Calcula el area de un rectangulo de lados tres y cinco"),
        ),
        text_at(72.0, 700.0, "3. Si"),
    ];

    let mut doc = lopdf::Document::with_version("1.5");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for content in &pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
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

pub const SEGMENTATION: &str = r#"{
    "questions": [
        {"id": "Q1", "text": "primo", "start_marker": "1. Cual de los", "page_nums": [1]},
        {"id": "Q2", "text": "area", "start_marker": "2. Calcula el area", "page_nums": [1]},
        {"id": "Q3", "text": "si", "start_marker": "3. Si", "page_nums": [2]}
    ]
}"#;

/// Write the exam PDF and its segmentation into `dir`.
pub fn write_exam(dir: &Path) -> (PathBuf, PathBuf) {
    let pdf = dir.join("exam.pdf");
    std::fs::write(&pdf, exam_pdf()).unwrap();
    let seg = dir.join("segmentation.json");
    std::fs::write(&seg, SEGMENTATION).unwrap();
    (pdf, seg)
}
