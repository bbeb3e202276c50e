use encoding_rs::{Encoding as RsEncoding, SHIFT_JIS, UTF_8};
use std::borrow::Cow;

pub trait TextDecoder {
    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str>;

    /// Decode C-style string: stop at the first NUL (0x00).
    fn decode_cstr<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.decode(&bytes[..end])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    Utf8,
    /// Softpal text pools are always cp932 in retail builds.
    #[default]
    ShiftJis,
}

impl Encoding {
    #[inline]
    pub fn as_encoding_rs(self) -> &'static RsEncoding {
        match self {
            Encoding::Utf8 => UTF_8,
            Encoding::ShiftJis => SHIFT_JIS,
        }
    }
}

/// A decoder/encoder bound to one encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    enc: Encoding,
}

impl Decoder {
    #[inline]
    pub fn new(enc: Encoding) -> Self {
        Self { enc }
    }

    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.enc
    }

    /// Encode a Rust string to bytes using the selected encoding.
    ///
    /// Unrepresentable characters are replaced by `encoding_rs` with numeric
    /// character references; the second value tells whether that happened.
    pub fn encode<'a>(&self, s: &'a str) -> (Cow<'a, [u8]>, bool) {
        let enc = self.enc.as_encoding_rs();
        let (cow, _, had_errors) = enc.encode(s);
        (cow, had_errors)
    }

    /// Same as encode(), but always returns an owned Vec<u8> and logs lossy input.
    pub fn encode_owned(&self, s: &str) -> Vec<u8> {
        let (bytes, had_errors) = self.encode(s);
        if had_errors {
            log::warn!("{:?} cannot represent every character of: {}", self.enc, s);
        }
        bytes.into_owned()
    }
}

impl TextDecoder for Decoder {
    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self.enc {
            Encoding::Utf8 => match std::str::from_utf8(bytes) {
                Ok(s) => Cow::Borrowed(s),
                Err(_) => Cow::Owned(String::from_utf8_lossy(bytes).into_owned()),
            },
            Encoding::ShiftJis => {
                let (cow, _, had_errors) = SHIFT_JIS.decode(bytes);
                if had_errors {
                    log::warn!("ShiftJIS decode error");
                }
                cow
            }
        }
    }
}

/// Stand-in for an ASCII space inside Softpal text. The engine collapses real
/// spaces, so the runtime proxy draws this glyph as a space instead.
pub const MAP_SPACE_CHARACTER: char = '|';

/// Characters the engine's font path cannot carry, paired with the half-width
/// katakana that tunnel them through cp932. The runtime proxy maps them back.
///
/// Entry 0 (`%`) is handled separately because `%0`..`%3` are emoji codes.
pub const GLYPH_MAP: [(char, char); 8] = [
    ('%', 'ｱ'),
    ('“', 'ｫ'),
    ('”', 'ｻ'),
    ('‘', 'ｨ'),
    ('’', 'ｴ'),
    ('é', 'ｶ'),
    ('♪', 'ｲ'),
    ('♥', 'ﾙ'),
];

pub const PERCENT_SUBSTITUTE: char = GLYPH_MAP[0].1;
pub const HEART: char = GLYPH_MAP[7].0;

/// Replace the seven remappable glyphs with their legacy stand-ins.
pub fn remap_to_legacy(text: &str) -> String {
    text.chars()
        .map(|ch| {
            GLYPH_MAP[1..]
                .iter()
                .find(|(unicode, _)| *unicode == ch)
                .map_or(ch, |(_, legacy)| *legacy)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_decode_cstr() {
        let d = Decoder::new(Encoding::Utf8);
        let bytes = b"hello\0world";
        assert_eq!(d.decode_cstr(bytes), "hello");
    }

    #[test]
    fn shiftjis_decodes_japanese() {
        let d = Decoder::new(Encoding::ShiftJis);
        // "あい" in cp932
        assert_eq!(d.decode_cstr(&[0x82, 0xA0, 0x82, 0xA2, 0x00, 0x41]), "あい");
    }

    #[test]
    fn halfwidth_katakana_are_single_bytes() {
        let d = Decoder::new(Encoding::ShiftJis);
        let (bytes, had_errors) = d.encode("ｱﾙ|");
        assert!(!had_errors);
        assert_eq!(&*bytes, &[0xB1, 0xD9, b'|']);
    }

    #[test]
    fn unencodable_is_reported() {
        let d = Decoder::new(Encoding::ShiftJis);
        let (_, had_errors) = d.encode("\u{1F600}");
        assert!(had_errors);
    }

    #[test]
    fn remap_skips_percent() {
        assert_eq!(remap_to_legacy("“a%”♪é♥‘’"), "ｫa%ｻｲｶﾙｨｴ");
    }
}
