//! Rewrites translated text into the engine's own dialect before it is pooled.

mod fonts;
mod quotes;
mod wrap;

use lazy_static::lazy_static;
use regex::Regex;
use softpal_nls::{remap_to_legacy, HEART, MAP_SPACE_CHARACTER, PERCENT_SUBSTITUTE};

use crate::{
    config::PatchConfig,
    consts::{LINE_BREAK, MAX_TEXT_CHARS},
};

pub use fonts::{FontProfiles, Profile};
pub use quotes::fancify_quotes;
pub use wrap::{CellMetrics, GlyphMetrics, WordWrapper};

lazy_static! {
    static ref CONTROL_CODE: Regex = Regex::new(r"<([^>]+)>").unwrap();
    static ref SIZE_CODE: Regex = Regex::new(r"^<s(\d+)>").unwrap();
}

const NO_WRAP_MARKERS: [&str; 2] = ["<noWrap>", "<nowrap>"];
const MONOSPACE_MARKER: &str = "<monospace>";
const EM_DASH: &str = "―";

/// Literal fixes applied to every string, in order.
const SUBSTITUTIONS: [(&str, &str); 4] = [
    // full-width ampersand pasted in place of '&'
    ("＆", "&"),
    ("—", EM_DASH),
    ("…", "..."),
    ("\r\n", LINE_BREAK),
];

pub struct Softpalizer<'a> {
    fonts: &'a FontProfiles,
    font_height_increase: i32,
}

impl<'a> Softpalizer<'a> {
    pub fn new(fonts: &'a FontProfiles, config: &PatchConfig) -> Self {
        Self {
            fonts,
            font_height_increase: config.font_height_increase,
        }
    }

    #[inline]
    pub fn transform(&self, text: &str) -> String {
        self.transform_checked(text).0
    }

    /// Like [`Softpalizer::transform`], also telling whether the result was cut short.
    pub fn transform_checked(&self, text: &str) -> (String, bool) {
        let (text, no_wrap) = match NO_WRAP_MARKERS.iter().find_map(|m| text.strip_prefix(m)) {
            Some(rest) => (rest, true),
            None => (text, false),
        };
        let monospace = text.starts_with(MONOSPACE_MARKER);

        let (size_prefix, font_size, text) = match SIZE_CODE.captures(text) {
            Some(caps) => {
                let whole = caps.get(0).map_or("", |m| m.as_str());
                let size = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok()).unwrap_or(0);
                (whole, size, &text[whole.len()..])
            }
            None => ("", 0, text),
        };

        let mut text = if monospace {
            text.to_string()
        } else {
            fancify_quotes(text).replace("--", EM_DASH)
        };
        for (from, to) in SUBSTITUTIONS {
            text = text.replace(from, to);
        }
        text = text
            .replace("%0", &HEART.to_string())
            .replace('\n', LINE_BREAK);

        if !no_wrap {
            let profile = if monospace && self.fonts.has_monospace() {
                Profile::Monospace
            } else if font_size > 0 {
                Profile::Sized((font_size + self.font_height_increase).max(1) as u32)
            } else {
                Profile::Default
            };
            text = self.fonts.wrapper(profile).wrap(&text, &CONTROL_CODE, LINE_BREAK);
        }

        let text = remap_to_legacy(&format!("{size_prefix}{text}")).replace(' ', &MAP_SPACE_CHARACTER.to_string());
        cap_length(&escape_percent(&text))
    }
}

/// Replace `%` with its stand-in unless it starts one of the `%0`..`%3` emoji codes.
pub fn escape_percent(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        let is_code = matches!(chars.peek(), Some('0'..='3'));
        if ch == '%' && !is_code {
            out.push(PERCENT_SUBSTITUTE);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Cut `text` to the engine's buffer limit. Returns whether anything was dropped.
pub fn cap_length(text: &str) -> (String, bool) {
    match text.char_indices().nth(MAX_TEXT_CHARS) {
        Some((at, _)) => {
            log::warn!("more than {} characters, truncating: {}", MAX_TEXT_CHARS, text);
            (text[..at].to_string(), true)
        }
        None => (text.to_string(), false),
    }
}
