//! lopdf-backed access to a source PDF: pages, page boxes, resources and
//! content streams.

use std::path::Path;
use std::sync::LazyLock;

use examcrop_core::{BBox, PageLayout};
use tracing::debug;

use crate::error::BackendError;
use crate::interpreter::{Interpreter, PageCollector};

/// A parsed PDF document.
pub struct SourceDocument {
    inner: lopdf::Document,
    /// Page object ids indexed by 0-based page number.
    page_ids: Vec<lopdf::ObjectId>,
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

/// Page rectangle in PDF user space, `[llx, lly, urx, ury]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl MediaBox {
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }
}

/// Numeric value of an Integer or Real object.
pub(crate) fn object_to_f64(obj: &lopdf::Object) -> Result<f64, BackendError> {
    use lopdf::Object;
    match *obj {
        Object::Integer(n) => Ok(n as f64),
        Object::Real(r) => Ok(f64::from(r)),
        ref other => Err(BackendError::Parse(format!("not a number: {other:?}"))),
    }
}

/// Follow one indirect reference. Dangling references resolve to themselves.
pub(crate) fn resolve_ref<'a>(doc: &'a lopdf::Document, obj: &'a lopdf::Object) -> &'a lopdf::Object {
    obj.as_reference()
        .ok()
        .and_then(|id| doc.get_object(id).ok())
        .unwrap_or(obj)
}

/// Stream bytes with any `/Filter` applied in reverse.
pub(crate) fn decode_stream(stream: &lopdf::Stream) -> Result<Vec<u8>, BackendError> {
    if stream.dict.has(b"Filter") {
        return stream
            .decompressed_content()
            .map_err(|e| BackendError::Parse(format!("cannot decode stream: {e}")));
    }
    Ok(stream.content.clone())
}

const MAX_TREE_DEPTH: usize = 64;

fn node_dict(doc: &lopdf::Document, id: lopdf::ObjectId) -> Result<&lopdf::Dictionary, BackendError> {
    doc.get_dictionary(id)
        .map_err(|e| BackendError::Parse(format!("page tree node {id:?}: {e}")))
}

/// Value of `key` on the page or the nearest ancestor that sets it.
fn resolve_inherited<'a>(
    doc: &'a lopdf::Document,
    page_id: lopdf::ObjectId,
    key: &[u8],
) -> Result<Option<&'a lopdf::Object>, BackendError> {
    let mut node = node_dict(doc, page_id)?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Ok(Some(value));
        }
        let Ok(parent) = node.get(b"Parent") else {
            return Ok(None);
        };
        let parent_id = parent
            .as_reference()
            .map_err(|_| BackendError::Parse("/Parent must be an indirect reference".to_string()))?;
        node = node_dict(doc, parent_id)?;
    }
    Err(BackendError::Parse(format!(
        "page tree deeper than {MAX_TREE_DEPTH} levels"
    )))
}

static EMPTY_DICT: LazyLock<lopdf::Dictionary> = LazyLock::new(lopdf::Dictionary::new);

impl SourceDocument {
    /// Open a PDF file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackendError> {
        let inner = lopdf::Document::load_mem(bytes)
            .map_err(|e| BackendError::Parse(format!("not a readable PDF: {e}")))?;
        Self::from_document(inner)
    }

    pub fn from_document(inner: lopdf::Document) -> Result<Self, BackendError> {
        if inner.is_encrypted() {
            return Err(BackendError::Encrypted);
        }
        // get_pages is keyed by 1-based page number, already in order.
        let page_ids = inner.get_pages().values().copied().collect();
        Ok(Self { inner, page_ids })
    }

    pub fn inner(&self) -> &lopdf::Document {
        &self.inner
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn page_id(&self, index: usize) -> Result<lopdf::ObjectId, BackendError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(BackendError::PageOutOfRange {
                index,
                count: self.page_ids.len(),
            })
    }

    pub fn media_box(&self, index: usize) -> Result<MediaBox, BackendError> {
        let Some(obj) = resolve_inherited(&self.inner, self.page_id(index)?, b"MediaBox")? else {
            return Err(BackendError::Parse(format!("page {} has no /MediaBox", index + 1)));
        };
        let corners = match resolve_ref(&self.inner, obj) {
            lopdf::Object::Array(items) if items.len() == 4 => items
                .iter()
                .map(|o| object_to_f64(resolve_ref(&self.inner, o)))
                .collect::<Result<Vec<f64>, _>>()?,
            other => {
                return Err(BackendError::Parse(format!(
                    "page {} /MediaBox is not a rectangle: {other:?}",
                    index + 1
                )));
            }
        };
        let (llx, urx) = (corners[0].min(corners[2]), corners[0].max(corners[2]));
        let (lly, ury) = (corners[1].min(corners[3]), corners[1].max(corners[3]));
        Ok(MediaBox { llx, lly, urx, ury })
    }

    /// Resources dictionary of a page, following inheritance. Pages without
    /// resources get an empty dictionary.
    pub fn page_resources(&self, index: usize) -> Result<&lopdf::Dictionary, BackendError> {
        match resolve_inherited(&self.inner, self.page_id(index)?, b"Resources")? {
            Some(obj) => resolve_ref(&self.inner, obj)
                .as_dict()
                .map_err(|_| BackendError::Parse("/Resources is not a dictionary".to_string())),
            None => Ok(&EMPTY_DICT),
        }
    }

    /// Decoded page content. A `/Contents` array is joined with newlines.
    pub fn page_content(&self, index: usize) -> Result<Vec<u8>, BackendError> {
        let page = node_dict(&self.inner, self.page_id(index)?)?;
        let Ok(contents) = page.get(b"Contents") else {
            return Ok(Vec::new());
        };
        let parts: Vec<&lopdf::Object> = match resolve_ref(&self.inner, contents) {
            lopdf::Object::Array(items) => items.iter().collect(),
            single => vec![single],
        };

        let mut content = Vec::new();
        for part in parts {
            let lopdf::Object::Stream(stream) = resolve_ref(&self.inner, part) else {
                return Err(BackendError::Parse(format!(
                    "page {} /Contents holds a non-stream object",
                    index + 1
                )));
            };
            if !content.is_empty() {
                content.push(b'\n');
            }
            content.extend(decode_stream(stream)?);
        }
        Ok(content)
    }

    /// Interpret a page into positioned text spans and image boxes, in
    /// top-left page space. Blocks are left empty.
    pub fn page_layout(&self, index: usize) -> Result<PageLayout, BackendError> {
        let media_box = self.media_box(index)?;
        let content = self.page_content(index)?;
        let resources = self.page_resources(index)?;

        let mut collector = PageCollector::default();
        let mut interpreter = Interpreter::new(&self.inner);
        interpreter.run_page(&content, resources, &media_box, &mut collector)?;

        let mut layout = PageLayout::new(index, media_box.width(), media_box.height());
        layout.spans = collector.spans;
        layout.images = collector.images;
        debug!(
            page = layout.number(),
            spans = layout.spans.len(),
            images = layout.images.len(),
            "interpreted page"
        );
        Ok(layout)
    }

    /// Page rectangle in top-left page space.
    pub fn page_bbox(&self, index: usize) -> Result<BBox, BackendError> {
        let mb = self.media_box(index)?;
        Ok(BBox::page(mb.width(), mb.height()))
    }
}
