//! Fixed values baked into the retail engine and its data files.

use std::ops::RangeInclusive;

/// Start of the instruction stream in `SCRIPT.SRC`; pointer table deltas are relative to it.
pub const CODE_OFFSET: u32 = 0xC;

pub const POINT_MAGIC: &[u8; 16] = b"$POINT_LIST_****";

/// Written over byte 0 of `TEXT.DAT` so the engine treats the pool as plaintext.
pub const TEXT_NOT_ENCRYPTED: u8 = b'_';

/// Size of the index/marker field in front of every pooled string.
pub const TEXT_ENTRY_HEADER: u32 = 4;

pub const GAME_DEFAULT_FONT_HEIGHT: u32 = 21;
pub const GAME_DEFAULT_SPACING_BETWEEN_LINES: u16 = 8;
pub const GAME_DEFAULT_MAX_LINE_WIDTH: u16 = 528;

/// Location of the text box line-width limit inside `SCRIPT.SRC`.
pub const MAX_LINE_WIDTH_OFFSET: usize = 0x26084;
/// Location of the vertical spacing between text lines inside `SCRIPT.SRC`.
pub const LINE_SPACING_OFFSET: usize = 0x2605C;

/// Longest string the engine copies without overrunning its message buffer.
pub const MAX_TEXT_CHARS: usize = 250;

/// Operand iterations where a log entry is a letter read aloud by an absent
/// character rather than a split message. Matched by count, not by bytecode shape.
pub const LETTER_RANGES: [RangeInclusive<usize>; 2] = [47744..=47800, 56420..=56500];

pub const LETTER_WRITER_PLACEHOLDER: &str = "Letter writer";
pub const LETTER_TEXT_PLACEHOLDER: &str = "Letter text";
pub const LOOSE_LOG_PLACEHOLDER: &str = "TODO";

pub const LINE_BREAK: &str = "<br>";
