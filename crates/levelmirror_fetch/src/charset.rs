//! Charset fallback for legacy HTML pages.
//!
//! The legacy archive serves pages written over two decades in whatever
//! encoding the author's tools produced. Decoding tries each charset in
//! [`CHARSET_ORDER`] and keeps the first that succeeds without error.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use std::borrow::Cow;
use std::fmt;

/// Supported HTML charsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// UTF-8.
    Utf8,
    /// Windows-1252 (Western European).
    Windows1252,
    /// UTF-16, byte order from the BOM, little-endian otherwise.
    Utf16,
    /// UTF-32, byte order from the BOM, little-endian otherwise.
    Utf32,
}

/// Order in which charsets are tried.
pub const CHARSET_ORDER: [Charset; 4] = [
    Charset::Utf8,
    Charset::Windows1252,
    Charset::Utf16,
    Charset::Utf32,
];

impl Charset {
    /// Decodes `bytes`, returning `None` on the first invalid sequence.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Charset::Utf8 => decode_strict(UTF_8, bytes),
            Charset::Windows1252 => decode_windows_1252(bytes),
            Charset::Utf16 => decode_utf16(bytes),
            Charset::Utf32 => decode_utf32(bytes),
        }
    }

    /// Returns the IANA name.
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Windows1252 => "windows-1252",
            Charset::Utf16 => "utf-16",
            Charset::Utf32 => "utf-32",
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decodes an HTML payload with the first charset that accepts it.
pub fn decode_html(bytes: &[u8]) -> Option<(String, Charset)> {
    CHARSET_ORDER
        .iter()
        .find_map(|charset| charset.decode(bytes).map(|text| (text, *charset)))
}

/// Bytes Windows-1252 leaves undefined. WHATWG maps them to C1 controls;
/// here they fail decoding.
const WINDOWS_1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    if bytes.iter().any(|b| WINDOWS_1252_UNDEFINED.contains(b)) {
        return None;
    }
    decode_strict(WINDOWS_1252, bytes)
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    match Encoding::for_bom(bytes) {
        Some((encoding, bom)) if encoding == UTF_16BE || encoding == UTF_16LE => {
            decode_strict(encoding, &bytes[bom..])
        }
        _ => decode_strict(UTF_16LE, bytes),
    }
}

/// encoding_rs has no UTF-32 decoder.
fn decode_utf32(bytes: &[u8]) -> Option<String> {
    let (body, big_endian) = match bytes {
        [0x00, 0x00, 0xFE, 0xFF, rest @ ..] => (rest, true),
        [0xFF, 0xFE, 0x00, 0x00, rest @ ..] => (rest, false),
        _ => (bytes, false),
    };
    if body.len() % 4 != 0 {
        return None;
    }
    body.chunks_exact(4)
        .map(|quad| {
            let quad = [quad[0], quad[1], quad[2], quad[3]];
            let value = if big_endian {
                u32::from_be_bytes(quad)
            } else {
                u32::from_le_bytes(quad)
            };
            char::from_u32(value)
        })
        .collect()
}
