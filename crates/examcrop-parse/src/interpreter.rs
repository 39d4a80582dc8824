//! Content stream interpreter.
//!
//! Walks decoded content stream operations, keeping the graphics and text
//! state needed to place text and images, and reports them to a
//! [`ContentHandler`] in top-left page space. Form XObjects are followed
//! through `Do`; a form's `/BBox` clips everything it draws.

use std::collections::HashMap;
use std::rc::Rc;

use examcrop_core::{BBox, Ctm, TextSpan};
use lopdf::Object;
use lopdf::content::Content;
use tracing::{debug, warn};

use crate::document::{MediaBox, decode_stream, object_to_f64, resolve_ref};
use crate::error::BackendError;
use crate::font::FontInfo;

/// Default limit on nested Form XObjects.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Glyph box in unscaled text space: descent below and ascent above the baseline.
const GLYPH_DESCENT: f64 = -0.2;
const GLYPH_ASCENT: f64 = 0.8;

/// A `TJ` adjustment at least this large (thousandths of an em) reads as a space.
const TJ_SPACE_THRESHOLD: f64 = 200.0;

/// Text shown by one text operator.
#[derive(Debug, Clone)]
pub struct TextEvent {
    pub text: String,
    /// Union of the visible glyph boxes.
    pub bbox: BBox,
    pub font_name: String,
    pub font_size: f64,
}

/// An image XObject placement.
#[derive(Debug, Clone)]
pub struct ImageEvent {
    /// XObject resource name (e.g., "Im0").
    pub name: String,
    /// Visible part of the unit square mapped through the CTM.
    pub bbox: BBox,
}

/// Receives what the interpreter draws. All methods default to no-ops.
pub trait ContentHandler {
    fn on_text(&mut self, _event: TextEvent) {}

    fn on_image(&mut self, _event: ImageEvent) {}
}

/// Handler that keeps spans and image boxes for a [`PageLayout`](examcrop_core::PageLayout).
#[derive(Debug, Default)]
pub struct PageCollector {
    pub spans: Vec<TextSpan>,
    pub images: Vec<BBox>,
}

impl ContentHandler for PageCollector {
    fn on_text(&mut self, event: TextEvent) {
        self.spans.push(TextSpan::new(event.text, event.bbox));
    }

    fn on_image(&mut self, event: ImageEvent) {
        self.images.push(event.bbox);
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font: Rc<FontInfo>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    h_scaling: f64,
    leading: f64,
    rise: f64,
    matrix: Ctm,
    line_matrix: Ctm,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Rc::new(FontInfo::default()),
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
            matrix: Ctm::identity(),
            line_matrix: Ctm::identity(),
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Ctm::translation(tx, ty).concat(&self.line_matrix);
        self.matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn advance(&mut self, tx: f64) {
        self.matrix = Ctm::translation(tx, 0.0).concat(&self.matrix);
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Ctm,
    /// Visible area in page space.
    clip: Option<BBox>,
    text: TextState,
}

/// Text collected while one show operator runs.
#[derive(Default)]
struct ShownText {
    text: String,
    bbox: Option<BBox>,
}

impl ShownText {
    fn push(&mut self, s: &str, glyph: BBox) {
        self.text.push_str(s);
        self.bbox = Some(self.bbox.map_or(glyph, |b| b.union(&glyph)));
    }

    fn push_gap(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with(' ') {
            self.text.push(' ');
        }
    }
}

fn number(operands: &[Object], index: usize) -> f64 {
    operands
        .get(index)
        .and_then(|o| object_to_f64(o).ok())
        .unwrap_or(0.0)
}

fn matrix_from(operands: &[Object]) -> Option<Ctm> {
    if operands.len() < 6 {
        return None;
    }
    let v: Vec<f64> = operands[..6]
        .iter()
        .map(object_to_f64)
        .collect::<Result<_, _>>()
        .ok()?;
    Some(Ctm::new(v[0], v[1], v[2], v[3], v[4], v[5]))
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

fn clip_with(clip: Option<BBox>, rect: BBox) -> Option<BBox> {
    match clip {
        // An empty intersection hides everything; keep a zero-area clip.
        Some(c) => Some(c.intersection(&rect).unwrap_or(BBox::new(c.x0, c.top, c.x0, c.top))),
        None => Some(rect),
    }
}

/// Content stream interpreter over one document.
pub struct Interpreter<'d> {
    doc: &'d lopdf::Document,
    fonts: HashMap<lopdf::ObjectId, Rc<FontInfo>>,
    max_depth: usize,
}

impl<'d> Interpreter<'d> {
    pub fn new(doc: &'d lopdf::Document) -> Self {
        Self {
            doc,
            fonts: HashMap::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Interpret a page's content. Output coordinates are relative to the
    /// media box's top-left corner, and anything outside the page is hidden.
    pub fn run_page(
        &mut self,
        content: &[u8],
        resources: &lopdf::Dictionary,
        media_box: &MediaBox,
        handler: &mut dyn ContentHandler,
    ) -> Result<(), BackendError> {
        let mut state = GraphicsState {
            ctm: Ctm::new(1.0, 0.0, 0.0, -1.0, -media_box.llx, media_box.ury),
            clip: Some(BBox::page(media_box.width(), media_box.height())),
            text: TextState::default(),
        };
        self.run(content, resources, &mut state, handler, 0)
    }

    fn run(
        &mut self,
        content: &[u8],
        resources: &lopdf::Dictionary,
        state: &mut GraphicsState,
        handler: &mut dyn ContentHandler,
        depth: usize,
    ) -> Result<(), BackendError> {
        if depth > self.max_depth {
            return Err(BackendError::FormRecursion {
                depth,
                max: self.max_depth,
            });
        }
        let operations = Content::decode(content)
            .map_err(|e| BackendError::Interpreter(format!("failed to decode content stream: {e}")))?
            .operations;

        let mut stack: Vec<GraphicsState> = Vec::new();
        for op in &operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        *state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_from(operands) {
                        state.ctm = m.concat(&state.ctm);
                    }
                }
                "BT" => {
                    state.text.matrix = Ctm::identity();
                    state.text.line_matrix = Ctm::identity();
                }
                "Tf" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        state.text.font = self.font(resources, name);
                    }
                    state.text.font_size = number(operands, 1);
                }
                "Td" => state.text.move_line(number(operands, 0), number(operands, 1)),
                "TD" => {
                    state.text.leading = -number(operands, 1);
                    state.text.move_line(number(operands, 0), number(operands, 1));
                }
                "Tm" => {
                    if let Some(m) = matrix_from(operands) {
                        state.text.matrix = m;
                        state.text.line_matrix = m;
                    }
                }
                "T*" => state.text.next_line(),
                "TL" => state.text.leading = number(operands, 0),
                "Tc" => state.text.char_spacing = number(operands, 0),
                "Tw" => state.text.word_spacing = number(operands, 0),
                "Tz" => state.text.h_scaling = number(operands, 0) / 100.0,
                "Ts" => state.text.rise = number(operands, 0),
                "Tj" => {
                    if let Some(bytes) = operands.first().and_then(string_bytes) {
                        let mut shown = ShownText::default();
                        show_string(state, bytes, &mut shown);
                        emit_text(state, shown, handler);
                    }
                }
                "'" => {
                    state.text.next_line();
                    if let Some(bytes) = operands.first().and_then(string_bytes) {
                        let mut shown = ShownText::default();
                        show_string(state, bytes, &mut shown);
                        emit_text(state, shown, handler);
                    }
                }
                "\"" => {
                    state.text.word_spacing = number(operands, 0);
                    state.text.char_spacing = number(operands, 1);
                    state.text.next_line();
                    if let Some(bytes) = operands.get(2).and_then(string_bytes) {
                        let mut shown = ShownText::default();
                        show_string(state, bytes, &mut shown);
                        emit_text(state, shown, handler);
                    }
                }
                "TJ" => {
                    if let Some(items) = operands.first().and_then(|o| o.as_array().ok()) {
                        let mut shown = ShownText::default();
                        for item in items {
                            if let Some(bytes) = string_bytes(item) {
                                show_string(state, bytes, &mut shown);
                            } else if let Ok(adjust) = object_to_f64(item) {
                                let tx = -adjust / 1000.0 * state.text.font_size * state.text.h_scaling;
                                state.text.advance(tx);
                                if adjust <= -TJ_SPACE_THRESHOLD {
                                    shown.push_gap();
                                }
                            }
                        }
                        emit_text(state, shown, handler);
                    }
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.handle_do(resources, name, state, handler, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn font(&mut self, resources: &lopdf::Dictionary, name: &[u8]) -> Rc<FontInfo> {
        let entry = resources
            .get(b"Font")
            .ok()
            .map(|o| resolve_ref(self.doc, o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|fonts| fonts.get(name).ok());
        let Some(entry) = entry else {
            debug!(font = %String::from_utf8_lossy(name), "font not found in resources");
            return Rc::new(FontInfo::default());
        };
        if let Object::Reference(id) = entry {
            if let Some(cached) = self.fonts.get(id) {
                return Rc::clone(cached);
            }
        }
        let font = match resolve_ref(self.doc, entry).as_dict() {
            Ok(dict) => Rc::new(FontInfo::load(self.doc, dict)),
            Err(_) => Rc::new(FontInfo::default()),
        };
        if let Object::Reference(id) = entry {
            self.fonts.insert(*id, Rc::clone(&font));
        }
        font
    }

    fn handle_do(
        &mut self,
        resources: &lopdf::Dictionary,
        name: &[u8],
        state: &mut GraphicsState,
        handler: &mut dyn ContentHandler,
        depth: usize,
    ) -> Result<(), BackendError> {
        let display_name = String::from_utf8_lossy(name).into_owned();
        let doc = self.doc;
        let stream = resources
            .get(b"XObject")
            .ok()
            .map(|o| resolve_ref(doc, o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|xobjects| xobjects.get(name).ok())
            .map(|o| resolve_ref(doc, o))
            .and_then(|o| o.as_stream().ok());
        let Some(stream) = stream else {
            warn!(xobject = %display_name, "XObject not found in resources");
            return Ok(());
        };

        let subtype = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or(b"");
        match subtype {
            b"Form" => self.handle_form(stream, &display_name, resources, state, handler, depth),
            b"Image" => {
                let placed = state.ctm.transform_rect(0.0, 0.0, 1.0, 1.0);
                let visible = match state.clip {
                    Some(clip) => placed.intersection(&clip),
                    None => Some(placed),
                };
                if let Some(bbox) = visible {
                    handler.on_image(ImageEvent {
                        name: display_name,
                        bbox,
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn handle_form(
        &mut self,
        stream: &lopdf::Stream,
        name: &str,
        parent_resources: &lopdf::Dictionary,
        state: &mut GraphicsState,
        handler: &mut dyn ContentHandler,
        depth: usize,
    ) -> Result<(), BackendError> {
        let saved = state.clone();

        if let Some(m) = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| matrix_from(arr))
        {
            state.ctm = m.concat(&state.ctm);
        }

        if let Some(bbox) = stream
            .dict
            .get(b"BBox")
            .ok()
            .map(|o| resolve_ref(self.doc, o))
            .and_then(|o| o.as_array().ok())
            .filter(|arr| arr.len() == 4)
        {
            let v: Vec<f64> = bbox.iter().map(|o| object_to_f64(o).unwrap_or(0.0)).collect();
            let rect = state.ctm.transform_rect(v[0], v[1], v[2], v[3]);
            state.clip = clip_with(state.clip, rect);
        }

        let doc = self.doc;
        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .map(|o| resolve_ref(doc, o))
            .and_then(|o| o.as_dict().ok())
            .unwrap_or(parent_resources);

        let content = decode_stream(stream).map_err(|e| {
            BackendError::Interpreter(format!("failed to decode Form XObject /{name} stream: {e}"))
        })?;
        let result = self.run(&content, resources, state, handler, depth + 1);
        *state = saved;
        result
    }
}

/// Place the glyphs of one string, advancing the text matrix.
fn show_string(state: &mut GraphicsState, bytes: &[u8], shown: &mut ShownText) {
    let font = Rc::clone(&state.text.font);
    for code in font.codes(bytes) {
        let t = &state.text;
        let w0 = font.width(code) / 1000.0;
        let params = Ctm::new(t.font_size * t.h_scaling, 0.0, 0.0, t.font_size, 0.0, t.rise);
        let trm = params.concat(&t.matrix).concat(&state.ctm);
        let glyph = trm.transform_rect(0.0, GLYPH_DESCENT, w0, GLYPH_ASCENT);

        let visible = state.clip.is_none_or(|c| c.contains_point(glyph.center()));
        if visible {
            let glyph = state.clip.map_or(glyph, |c| glyph.clamp_to(&c));
            shown.push(&font.decode(code), glyph);
        }

        let spacing = if font.is_single_byte() && code == 32 {
            t.word_spacing
        } else {
            0.0
        };
        let tx = (w0 * t.font_size + t.char_spacing + spacing) * t.h_scaling;
        state.text.advance(tx);
    }
}

fn emit_text(state: &GraphicsState, shown: ShownText, handler: &mut dyn ContentHandler) {
    let Some(bbox) = shown.bbox else {
        return;
    };
    if shown.text.is_empty() {
        return;
    }
    handler.on_text(TextEvent {
        text: shown.text,
        bbox,
        font_name: state.text.font.base_name.clone(),
        font_size: state.text.font_size,
    });
}
