//! Region extraction: one page-space rectangle to a standalone one-page PDF.
//!
//! The source page's content is wrapped in a Form XObject whose `/BBox` is
//! the region, so everything outside it is clipped. The new page is exactly
//! the region's size and draws the form shifted to its origin at 1:1 scale.
//! Nothing is rasterized: fonts, images and vector paths are copied over as
//! PDF objects.

use std::collections::HashMap;
use std::path::Path;

use examcrop_core::BBox;
use examcrop_parse::SourceDocument;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::debug;

use crate::error::ExamcropError;

/// Name of the wrapping form on the extracted page.
const REGION_FORM: &str = "Fm0";

/// Deep-copies objects from one document into another, following references.
///
/// Each source object is copied at most once, so shared resources (a font
/// used by several pages) stay shared in the target. `/Parent` entries are
/// dropped so copying a resource never drags in the source page tree.
pub(crate) struct ObjectCopier<'s> {
    source: &'s Document,
    mapped: HashMap<ObjectId, ObjectId>,
}

impl<'s> ObjectCopier<'s> {
    pub(crate) fn new(source: &'s Document) -> Self {
        Self {
            source,
            mapped: HashMap::new(),
        }
    }

    pub(crate) fn copy(&mut self, target: &mut Document, obj: &Object) -> Object {
        match obj {
            Object::Reference(id) => Object::Reference(self.copy_ref(target, *id)),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.copy(target, item)).collect())
            }
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(target, dict)),
            Object::Stream(stream) => {
                let dict = self.copy_dict(target, &stream.dict);
                Object::Stream(Stream::new(dict, stream.content.clone()))
            }
            other => other.clone(),
        }
    }

    pub(crate) fn copy_dict(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            out.set(key.clone(), self.copy(target, value));
        }
        out
    }

    fn copy_ref(&mut self, target: &mut Document, id: ObjectId) -> ObjectId {
        if let Some(&new_id) = self.mapped.get(&id) {
            return new_id;
        }
        let new_id = target.new_object_id();
        self.mapped.insert(id, new_id);
        let copied = match self.source.get_object(id) {
            Ok(obj) => self.copy(target, obj),
            Err(_) => Object::Null,
        };
        target.objects.insert(new_id, copied);
        new_id
    }
}

/// Attach `page_ids` as the page tree of `doc` and set the catalog.
pub(crate) fn finish_page_tree(doc: &mut Document, pages_id: ObjectId, page_ids: &[ObjectId]) {
    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// Build a one-page document showing `bbox` of page `page_number` (1-based).
///
/// `bbox` is in top-left page space and is clamped to the page first.
pub fn extract_region(
    source: &SourceDocument,
    page_number: usize,
    bbox: &BBox,
) -> Result<Document, ExamcropError> {
    let index = page_number
        .checked_sub(1)
        .filter(|&i| i < source.page_count())
        .ok_or_else(|| {
            ExamcropError::region(
                page_number,
                format!("page out of range (document has {})", source.page_count()),
            )
        })?;
    let media_box = source.media_box(index)?;
    let region = bbox.clamp(media_box.width(), media_box.height());
    if region.width() <= 0.0 || region.height() <= 0.0 {
        return Err(ExamcropError::region(page_number, format!("empty region {region:?}")));
    }

    // Region corners in the source page's user space.
    let ux0 = media_box.llx + region.x0;
    let ux1 = media_box.llx + region.x1;
    let uy0 = media_box.ury - region.bottom;
    let uy1 = media_box.ury - region.top;

    let content = source.page_content(index)?;
    let resources = source.page_resources(index)?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut copier = ObjectCopier::new(source.inner());
    let form_resources = copier.copy_dict(&mut doc, resources);

    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![real(ux0), real(uy0), real(ux1), real(uy1)],
            "Resources" => form_resources,
        },
        content,
    ));

    let page_content = format!("q 1 0 0 1 {} {} cm /{REGION_FORM} Do Q", -ux0, -uy0);
    let content_id = doc.add_object(Stream::new(dictionary! {}, page_content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), real(region.width()), real(region.height())],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { REGION_FORM => form_id },
        },
    });
    finish_page_tree(&mut doc, pages_id, &[page_id]);

    debug!(
        page = page_number,
        x0 = region.x0,
        top = region.top,
        x1 = region.x1,
        bottom = region.bottom,
        "extracted region"
    );
    Ok(doc)
}

/// Save a document to `path`.
pub fn save_document(doc: &mut Document, path: &Path) -> Result<(), ExamcropError> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|e| {
        std::io::Error::other(format!("failed to serialize {}: {e}", path.display()))
    })?;
    std::fs::write(path, buf)?;
    Ok(())
}

/// Extract a region and write it to `path`.
pub fn write_region(
    source: &SourceDocument,
    page_number: usize,
    bbox: &BBox,
    path: &Path,
) -> Result<(), ExamcropError> {
    let mut doc = extract_region(source, page_number, bbox)?;
    save_document(&mut doc, path)
}
