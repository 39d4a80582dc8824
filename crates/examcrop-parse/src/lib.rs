//! examcrop-parse: PDF reading and content stream interpretation.
//!
//! Opens source PDFs through lopdf, resolves page boxes, resources and
//! content streams, and interprets page content into the positioned text
//! spans and image boxes that examcrop-core works on.

pub mod cmap;
pub mod document;
pub mod error;
pub mod font;
pub mod interpreter;

pub use document::{MediaBox, SourceDocument};
pub use error::BackendError;
pub use examcrop_core;
pub use interpreter::{ContentHandler, ImageEvent, Interpreter, PageCollector, TextEvent};
