//! Font information needed to turn shown strings into positioned text.
//!
//! Only what text placement needs: glyph advance widths, how many bytes
//! one character code takes, and how codes map to Unicode.

use std::collections::HashMap;

use tracing::debug;

use crate::cmap::ToUnicodeMap;
use crate::document::{decode_stream, object_to_f64, resolve_ref};

/// Advance used when a font gives no width for a code, in glyph units.
const FALLBACK_WIDTH: f64 = 500.0;

/// Characters for WinAnsiEncoding codes 0x80..=0x9F; the rest follow Latin-1.
const WIN_ANSI_HIGH: [char; 32] = [
    '€', '\u{FFFD}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{FFFD}', 'Ž',
    '\u{FFFD}', '\u{FFFD}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ',
    '\u{FFFD}', 'ž', 'Ÿ',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimpleEncoding {
    WinAnsi,
    Latin1,
}

/// Glyph names that show up in `/Differences` arrays of exam fonts.
fn glyph_name_to_char(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("uni") {
        return u32::from_str_radix(hex.get(..4)?, 16).ok().and_then(char::from_u32);
    }
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c);
    }
    let c = match name {
        "space" => ' ',
        "period" => '.',
        "comma" => ',',
        "colon" => ':',
        "semicolon" => ';',
        "hyphen" | "minus" => '-',
        "parenleft" => '(',
        "parenright" => ')',
        "question" => '?',
        "questiondown" => '¿',
        "exclam" => '!',
        "exclamdown" => '¡',
        "slash" => '/',
        "equal" => '=',
        "plus" => '+',
        "percent" => '%',
        "numbersign" => '#',
        "degree" => '°',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "aacute" => 'á',
        "eacute" => 'é',
        "iacute" => 'í',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "ntilde" => 'ñ',
        "Aacute" => 'Á',
        "Eacute" => 'É',
        "Iacute" => 'Í',
        "Oacute" => 'Ó',
        "Uacute" => 'Ú',
        "Ntilde" => 'Ñ',
        "udieresis" => 'ü',
        "fi" => 'ﬁ',
        "fl" => 'ﬂ',
        _ => return None,
    };
    Some(c)
}

/// Font state for the interpreter.
#[derive(Debug, Clone)]
pub struct FontInfo {
    pub base_name: String,
    /// Composite (Type0) fonts use two-byte codes unless a CMap says otherwise.
    code_bytes: usize,
    first_char: u32,
    widths: Vec<f64>,
    /// Per-CID widths of composite fonts.
    cid_widths: HashMap<u32, f64>,
    default_width: f64,
    to_unicode: Option<ToUnicodeMap>,
    encoding: SimpleEncoding,
    differences: HashMap<u32, char>,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            base_name: String::new(),
            code_bytes: 1,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: FALLBACK_WIDTH,
            to_unicode: None,
            encoding: SimpleEncoding::Latin1,
            differences: HashMap::new(),
        }
    }
}

fn name_of(obj: &lopdf::Object) -> Option<String> {
    obj.as_name().ok().map(|n| String::from_utf8_lossy(n).into_owned())
}

fn number_array(doc: &lopdf::Document, obj: &lopdf::Object) -> Vec<f64> {
    resolve_ref(doc, obj)
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|o| object_to_f64(resolve_ref(doc, o)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` and `c_first c_last w` forms.
fn parse_cid_widths(doc: &lopdf::Document, arr: &[lopdf::Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < arr.len() {
        let Ok(first) = object_to_f64(resolve_ref(doc, &arr[i])) else {
            break;
        };
        let first = first as u32;
        match arr.get(i + 1).map(|o| resolve_ref(doc, o)) {
            Some(lopdf::Object::Array(list)) => {
                for (k, w) in list.iter().enumerate() {
                    if let Ok(w) = object_to_f64(w) {
                        widths.insert(first + k as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Ok(last), Some(Ok(w))) = (
                    object_to_f64(last),
                    arr.get(i + 2).map(|o| object_to_f64(resolve_ref(doc, o))),
                ) else {
                    break;
                };
                for code in first..=last as u32 {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

impl FontInfo {
    /// Read a font dictionary. Missing or malformed entries fall back to
    /// defaults instead of failing.
    pub fn load(doc: &lopdf::Document, dict: &lopdf::Dictionary) -> Self {
        let mut font = FontInfo {
            base_name: dict
                .get(b"BaseFont")
                .ok()
                .and_then(name_of)
                .unwrap_or_default(),
            ..FontInfo::default()
        };

        let subtype = dict.get(b"Subtype").ok().and_then(name_of).unwrap_or_default();
        if subtype == "Type0" {
            font.code_bytes = 2;
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .map(|o| resolve_ref(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .map(|o| resolve_ref(doc, o))
                .and_then(|o| o.as_dict().ok());
            if let Some(cid_font) = descendant {
                font.default_width = cid_font
                    .get(b"DW")
                    .ok()
                    .and_then(|o| object_to_f64(o).ok())
                    .unwrap_or(1000.0);
                if let Some(w) = cid_font
                    .get(b"W")
                    .ok()
                    .map(|o| resolve_ref(doc, o))
                    .and_then(|o| o.as_array().ok())
                {
                    font.cid_widths = parse_cid_widths(doc, w);
                }
            }
        } else {
            font.first_char = dict
                .get(b"FirstChar")
                .ok()
                .and_then(|o| o.as_i64().ok())
                .unwrap_or(0)
                .max(0) as u32;
            if let Ok(widths) = dict.get(b"Widths") {
                font.widths = number_array(doc, widths);
            }
            font.load_encoding(doc, dict);
        }

        if let Some(stream) = dict
            .get(b"ToUnicode")
            .ok()
            .map(|o| resolve_ref(doc, o))
            .and_then(|o| o.as_stream().ok())
        {
            match decode_stream(stream) {
                Ok(bytes) => {
                    let map = ToUnicodeMap::parse(&bytes);
                    if !map.is_empty() {
                        font.to_unicode = Some(map);
                    }
                }
                Err(e) => debug!(font = %font.base_name, error = %e, "unreadable ToUnicode stream"),
            }
        }
        font
    }

    fn load_encoding(&mut self, doc: &lopdf::Document, dict: &lopdf::Dictionary) {
        let Ok(encoding) = dict.get(b"Encoding").map(|o| resolve_ref(doc, o)) else {
            return;
        };
        let (base, differences) = match encoding {
            lopdf::Object::Name(_) => (name_of(encoding), None),
            lopdf::Object::Dictionary(d) => (
                d.get(b"BaseEncoding").ok().and_then(name_of),
                d.get(b"Differences")
                    .ok()
                    .map(|o| resolve_ref(doc, o))
                    .and_then(|o| o.as_array().ok()),
            ),
            _ => (None, None),
        };
        if base.as_deref() == Some("WinAnsiEncoding") {
            self.encoding = SimpleEncoding::WinAnsi;
        }
        if let Some(entries) = differences {
            let mut code = 0u32;
            for entry in entries {
                match entry {
                    lopdf::Object::Integer(n) => code = (*n).max(0) as u32,
                    lopdf::Object::Name(name) => {
                        if let Some(c) = glyph_name_to_char(&String::from_utf8_lossy(name)) {
                            self.differences.insert(code, c);
                        }
                        code += 1;
                    }
                    _ => {}
                }
            }
        }
    }

    /// Split a shown string into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        let width = self
            .to_unicode
            .as_ref()
            .filter(|_| self.code_bytes > 1)
            .map_or(self.code_bytes, |m| m.code_bytes().max(1));
        bytes
            .chunks(width)
            .map(|chunk| chunk.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
            .collect()
    }

    pub fn is_single_byte(&self) -> bool {
        self.code_bytes == 1
    }

    /// Advance width of a code in glyph units (1/1000 of the font size).
    pub fn width(&self, code: u32) -> f64 {
        if self.code_bytes > 1 {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    /// Unicode text for a code.
    pub fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.lookup(code)) {
            return text.to_string();
        }
        if let Some(c) = self.differences.get(&code) {
            return c.to_string();
        }
        if self.code_bytes > 1 {
            return char::from_u32(code).map_or_else(|| "\u{FFFD}".to_string(), String::from);
        }
        let c = match (self.encoding, code) {
            (SimpleEncoding::WinAnsi, 0x80..=0x9F) => WIN_ANSI_HIGH[(code - 0x80) as usize],
            _ => char::from_u32(code).unwrap_or('\u{FFFD}'),
        };
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object, dictionary};

    #[test]
    fn simple_font_widths_and_encoding() {
        let doc = lopdf::Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Arial",
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(667), Object::Integer(0), Object::Real(722.0)],
            "Encoding" => "WinAnsiEncoding",
        };
        let font = FontInfo::load(&doc, &dict);
        assert_eq!(font.base_name, "Arial");
        assert_eq!(font.width(65), 667.0);
        assert_eq!(font.width(66), FALLBACK_WIDTH);
        assert_eq!(font.width(67), 722.0);
        assert_eq!(font.width(32), FALLBACK_WIDTH);
        assert_eq!(font.decode(0x93), "“");
        assert_eq!(font.decode(0xF1), "ñ");
        assert_eq!(font.codes(b"AB"), vec![65, 66]);
    }

    #[test]
    fn differences_override_encoding() {
        let doc = lopdf::Document::with_version("1.5");
        let dict = dictionary! {
            "Subtype" => "Type1",
            "Encoding" => dictionary! {
                "BaseEncoding" => "WinAnsiEncoding",
                "Differences" => vec![
                    Object::Integer(1),
                    Object::Name(b"questiondown".to_vec()),
                    Object::Name(b"uni00E9".to_vec()),
                ],
            },
        };
        let font = FontInfo::load(&doc, &dict);
        assert_eq!(font.decode(1), "¿");
        assert_eq!(font.decode(2), "é");
        assert_eq!(font.decode(0x41), "A");
    }

    #[test]
    fn type0_font_uses_two_byte_codes() {
        let mut doc = lopdf::Document::with_version("1.5");
        let cid_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 1000,
            "W" => vec![
                Object::Integer(36),
                Object::Array(vec![Object::Integer(600), Object::Integer(650)]),
                Object::Integer(100),
                Object::Integer(102),
                Object::Integer(400),
            ],
        });
        let dict = dictionary! {
            "Subtype" => "Type0",
            "BaseFont" => "ABCDEF+Calibri",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(cid_font)],
        };
        let font = FontInfo::load(&doc, &dict);
        assert!(!font.is_single_byte());
        assert_eq!(font.codes(&[0x00, 0x24, 0x00, 0x25]), vec![36, 37]);
        assert_eq!(font.width(36), 600.0);
        assert_eq!(font.width(37), 650.0);
        assert_eq!(font.width(101), 400.0);
        assert_eq!(font.width(5), 1000.0);
        assert_eq!(font.decode(0x41), "A");
    }

    #[test]
    fn glyph_names() {
        assert_eq!(glyph_name_to_char("A"), Some('A'));
        assert_eq!(glyph_name_to_char("uni00F1"), Some('ñ'));
        assert_eq!(glyph_name_to_char("ntilde"), Some('ñ'));
        assert_eq!(glyph_name_to_char("g123"), None);
    }
}
