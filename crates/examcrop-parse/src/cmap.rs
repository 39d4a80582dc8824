//! ToUnicode CMap parser.
//!
//! Handles `beginbfchar`/`endbfchar` and `beginbfrange`/`endbfrange`
//! sections, including the array form of `bfrange`, with UTF-16BE
//! destination strings. The code width is taken from the first
//! `begincodespacerange` entry.

use std::collections::HashMap;

/// Character code to Unicode mapping of one font.
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeMap {
    mappings: HashMap<u32, String>,
    code_bytes: usize,
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(&'a str),
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => {
                let end = text[i + 1..].find('>').map_or(bytes.len(), |e| i + 1 + e);
                tokens.push(Token::Hex(decode_hex(&text[i + 1..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
                    i += 1;
                }
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !b"<[]%".contains(&bytes[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(&text[start..i]));
            }
        }
    }
    tokens
}

fn decode_hex(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .bytes()
        .filter_map(|b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16be_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| (u16::from(pair[0]) << 8) | u16::from(pair.get(1).copied().unwrap_or(0)))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Destination string with its last UTF-16 unit advanced by `offset`.
fn offset_destination(dst: &[u8], offset: u32) -> String {
    let mut bytes = dst.to_vec();
    if bytes.len() >= 2 {
        let n = bytes.len();
        let last = (u32::from(bytes[n - 2]) << 8 | u32::from(bytes[n - 1])) + offset;
        bytes[n - 2] = ((last >> 8) & 0xFF) as u8;
        bytes[n - 1] = (last & 0xFF) as u8;
    }
    utf16be_to_string(&bytes)
}

/// Tokens between each `begin<name>` and the following `end<name>`.
fn sections<'t, 'a>(tokens: &'t [Token<'a>], name: &str) -> Vec<&'t [Token<'a>]> {
    let begin = format!("begin{name}");
    let end = format!("end{name}");
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == Token::Word(&begin) {
            let start = i + 1;
            let stop = tokens[start..]
                .iter()
                .position(|t| *t == Token::Word(&end))
                .map_or(tokens.len(), |p| start + p);
            out.push(&tokens[start..stop]);
            i = stop;
        }
        i += 1;
    }
    out
}

impl ToUnicodeMap {
    /// Parse a ToUnicode stream. Unparseable entries are skipped.
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let tokens = tokenize(&text);
        let mut map = ToUnicodeMap::default();

        if let Some(Token::Hex(low)) = sections(&tokens, "codespacerange")
            .first()
            .and_then(|s| s.first())
        {
            map.code_bytes = low.len();
        }

        for section in sections(&tokens, "bfchar") {
            for pair in section.chunks(2) {
                if let [Token::Hex(src), Token::Hex(dst)] = pair {
                    map.note_width(src.len());
                    map.mappings.insert(code_value(src), utf16be_to_string(dst));
                }
            }
        }

        for section in sections(&tokens, "bfrange") {
            let mut i = 0;
            while i + 2 < section.len() {
                let (Token::Hex(lo), Token::Hex(hi)) = (&section[i], &section[i + 1]) else {
                    i += 1;
                    continue;
                };
                map.note_width(lo.len());
                let (lo_code, hi_code) = (code_value(lo), code_value(hi));
                match &section[i + 2] {
                    Token::Hex(dst) => {
                        for code in lo_code..=hi_code.min(lo_code.saturating_add(0xFFFF)) {
                            map.mappings.insert(code, offset_destination(dst, code - lo_code));
                        }
                        i += 3;
                    }
                    Token::ArrayStart => {
                        let mut j = i + 3;
                        let mut code = Some(lo_code);
                        while j < section.len() && section[j] != Token::ArrayEnd {
                            if let (Token::Hex(dst), Some(c)) = (&section[j], code) {
                                if c <= hi_code {
                                    map.mappings.insert(c, utf16be_to_string(dst));
                                }
                                code = c.checked_add(1);
                            }
                            j += 1;
                        }
                        i = j + 1;
                    }
                    _ => i += 3,
                }
            }
        }

        if map.code_bytes == 0 {
            map.code_bytes = 1;
        }
        map
    }

    fn note_width(&mut self, width: usize) {
        if self.code_bytes == 0 {
            self.code_bytes = width;
        }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    /// Bytes per character code, from the codespace range.
    pub fn code_bytes(&self) -> usize {
        self.code_bytes
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
