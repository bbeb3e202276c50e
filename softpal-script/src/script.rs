use std::{collections::VecDeque, fs, path::Path, slice};

use serde::{Deserialize, Serialize};
use softpal_nls::{Decoder, MAP_SPACE_CHARACTER};

use crate::{
    config::PatchConfig,
    consts::{
        GAME_DEFAULT_MAX_LINE_WIDTH, GAME_DEFAULT_SPACING_BETWEEN_LINES, LETTER_RANGES, LETTER_TEXT_PLACEHOLDER,
        LETTER_WRITER_PLACEHOLDER, LINE_SPACING_OFFSET, LOOSE_LOG_PLACEHOLDER, MAX_LINE_WIDTH_OFFSET,
    },
    disasm,
    error::{Result, ScriptError},
    format::{read_label_offsets, CodeImage, TextPool, POINT_FILE_NAME, TEXT_FILE_NAME},
    transform::Softpalizer,
};

/// Role of a pooled string, as implied by the syscall that consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptStringType {
    CharacterName,
    DialogueMessage,
    /// Speaker recorded in the backlog only.
    LogCharacterName,
    /// Backlog copy of a line that is shown split across two messages.
    LogMessage,
    SelectionChoice,
}

impl ScriptStringType {
    /// Backlog-only operands are never extracted.
    #[inline]
    pub fn is_log(self) -> bool {
        matches!(self, ScriptStringType::LogCharacterName | ScriptStringType::LogMessage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptString {
    pub text: String,
    #[serde(rename = "type")]
    pub ty: ScriptStringType,
}

impl ScriptString {
    pub fn new(text: impl Into<String>, ty: ScriptStringType) -> Self {
        Self { text: text.into(), ty }
    }
}

/// A 4 byte field in the code holding a `TEXT.DAT` address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOperand {
    pub offset: u32,
    pub ty: ScriptStringType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchStats {
    /// Operand slots rewritten.
    pub operands: usize,
    /// Translated strings taken from the input.
    pub consumed: usize,
    pub split_groups: usize,
    /// Slots filled with a fixed placeholder instead of a translation.
    pub placeholders: usize,
    pub truncated: usize,
    /// Strings containing characters cp932 cannot represent.
    pub lossy: usize,
}

/// One Softpal script unit: `SCRIPT.SRC` plus the `TEXT.DAT` and `POINT.DAT`
/// found next to it.
pub struct SoftpalScript {
    code: CodeImage,
    text: TextPool,
    operands: Vec<TextOperand>,
    nls: Decoder,
}

impl SoftpalScript {
    pub fn load(path: impl AsRef<Path>, config: &PatchConfig) -> Result<Self> {
        let path = path.as_ref();
        let mut code = CodeImage::read(path)?;
        patch_layout_constants(&mut code, config);

        let folder = path.parent().unwrap_or_else(|| Path::new("."));
        let text = TextPool::read(folder.join(TEXT_FILE_NAME))?;
        let labels = read_label_offsets(folder.join(POINT_FILE_NAME))?;

        let operands = disasm::disassemble(code.as_bytes(), &labels)?;
        log::info!(
            "{}: {} labels, {} text operands",
            path.display(),
            labels.len(),
            operands.len()
        );

        Ok(Self {
            code,
            text,
            operands,
            nls: Decoder::default(),
        })
    }

    /// Build a unit from in-memory parts; `code` is taken as already constant-patched.
    pub fn from_parts(code: Vec<u8>, text: Vec<u8>, labels: &[u32]) -> Result<Self> {
        let code = CodeImage::from_bytes(code);
        let operands = disasm::disassemble(code.as_bytes(), labels)?;
        Ok(Self {
            code,
            text: TextPool::from_bytes(text),
            operands,
            nls: Decoder::default(),
        })
    }

    #[inline]
    pub fn operands(&self) -> &[TextOperand] {
        &self.operands
    }

    #[inline]
    pub fn code(&self) -> &CodeImage {
        &self.code
    }

    #[inline]
    pub fn text(&self) -> &TextPool {
        &self.text
    }

    /// The translatable strings in operand order. Backlog operands are skipped:
    /// the split messages that follow them carry the same text.
    pub fn strings(&self) -> Strings<'_> {
        Strings {
            script: self,
            operands: self.operands.iter(),
        }
    }

    /// Read the string a single operand currently points at.
    pub fn resolve(&self, operand: &TextOperand) -> Result<String> {
        let address = self.code.read_u32(operand.offset as usize)?;
        self.text.read_str(address, &self.nls)
    }

    /// Patch `strings` into copies of the loaded buffers and write them to
    /// `path` and the `TEXT.DAT` next to it. Nothing is written on error.
    pub fn write_patched<I>(&self, strings: I, path: impl AsRef<Path>, softpalizer: &Softpalizer) -> Result<PatchStats>
    where
        I: IntoIterator<Item = ScriptString>,
    {
        let path = path.as_ref();
        let patched = self.patch(strings, softpalizer)?;

        let folder = path.parent().unwrap_or_else(|| Path::new("."));
        fs::write(path, patched.code.as_bytes())?;
        fs::write(folder.join(TEXT_FILE_NAME), patched.text.as_bytes())?;

        let stats = patched.stats;
        log::info!(
            "{}: patched {} operands from {} strings ({} split groups, {} placeholders, {} truncated)",
            path.display(),
            stats.operands,
            stats.consumed,
            stats.split_groups,
            stats.placeholders,
            stats.truncated
        );
        Ok(stats)
    }

    /// The patch pass itself, without touching the filesystem.
    pub fn patch<I>(&self, strings: I, softpalizer: &Softpalizer) -> Result<Patched>
    where
        I: IntoIterator<Item = ScriptString>,
    {
        let mut out = PatchWriter {
            code: self.code.clone(),
            text: self.text.clone(),
            nls: self.nls,
            stats: PatchStats::default(),
        };
        let mut input = Input {
            strings: strings.into_iter(),
            consumed: 0,
        };
        let mut pending: VecDeque<String> = VecDeque::new();

        for (i, operand) in self.operands.iter().enumerate() {
            let iteration = i + 1;

            // already transformed when queued
            if let Some(queued) = pending.pop_front() {
                out.emit(&queued, operand)?;
                continue;
            }

            match operand.ty {
                ScriptStringType::LogCharacterName if is_letter(iteration) => {
                    log::debug!("#{iteration}: letter narration at 0x{:X}, writing placeholder", operand.offset);
                    out.emit(LETTER_WRITER_PLACEHOLDER, operand)?;
                    pending.push_back(LETTER_TEXT_PLACEHOLDER.to_string());
                    out.stats.placeholders += 2;
                }
                ScriptStringType::LogCharacterName => {
                    let group = SplitGroup::take(&mut input, iteration, operand)?;
                    let queued = group.fan_out(softpalizer, &mut out.stats);
                    out.emit(&queued[1], operand)?;
                    pending.extend(queued);
                    out.stats.split_groups += 1;
                }
                ScriptStringType::LogMessage => {
                    log::warn!(
                        "#{iteration}: backlog message at 0x{:X} without a speaker, writing placeholder",
                        operand.offset
                    );
                    out.emit(LOOSE_LOG_PLACEHOLDER, operand)?;
                    out.stats.placeholders += 1;
                }
                expected => {
                    let s = input.next(iteration)?;
                    check_type(iteration, operand, expected, &s)?;
                    let text = out.transform(softpalizer, &s.text);
                    out.emit(&text, operand)?;
                }
            }
        }

        if input.strings.next().is_some() {
            return Err(ScriptError::Overrun);
        }
        out.stats.consumed = input.consumed;
        Ok(Patched {
            code: out.code,
            text: out.text,
            stats: out.stats,
        })
    }
}

/// In-memory result of [`SoftpalScript::patch`].
pub struct Patched {
    pub code: CodeImage,
    pub text: TextPool,
    pub stats: PatchStats,
}

pub struct Strings<'a> {
    script: &'a SoftpalScript,
    operands: slice::Iter<'a, TextOperand>,
}

impl Iterator for Strings<'_> {
    type Item = Result<ScriptString>;

    fn next(&mut self) -> Option<Self::Item> {
        let operand = self.operands.find(|o| !o.ty.is_log())?;
        Some(
            self.script
                .resolve(operand)
                .map(|text| ScriptString { text, ty: operand.ty }),
        )
    }
}

fn patch_layout_constants(code: &mut CodeImage, config: &PatchConfig) {
    if !code.replace_u16(MAX_LINE_WIDTH_OFFSET, GAME_DEFAULT_MAX_LINE_WIDTH, config.max_line_width) {
        log::debug!("max line width constant not found at 0x{MAX_LINE_WIDTH_OFFSET:X}, leaving it alone");
    }
    if !code.replace_u16(
        LINE_SPACING_OFFSET,
        GAME_DEFAULT_SPACING_BETWEEN_LINES,
        config.font_y_spacing_between_lines,
    ) {
        log::debug!("line spacing constant not found at 0x{LINE_SPACING_OFFSET:X}, leaving it alone");
    }
}

fn is_letter(iteration: usize) -> bool {
    LETTER_RANGES.iter().any(|r| r.contains(&iteration))
}

fn check_type(iteration: usize, operand: &TextOperand, expected: ScriptStringType, s: &ScriptString) -> Result<()> {
    if s.ty != expected {
        return Err(ScriptError::TypeMismatch {
            iteration,
            offset: operand.offset,
            expected,
            actual: s.ty,
            text: s.text.clone(),
        });
    }
    Ok(())
}

struct Input<I> {
    strings: I,
    consumed: usize,
}

impl<I: Iterator<Item = ScriptString>> Input<I> {
    fn next(&mut self, iteration: usize) -> Result<ScriptString> {
        let s = self.strings.next().ok_or(ScriptError::Underrun { iteration })?;
        self.consumed += 1;
        Ok(s)
    }
}

struct PatchWriter {
    code: CodeImage,
    text: TextPool,
    nls: Decoder,
    stats: PatchStats,
}

impl PatchWriter {
    fn transform(&mut self, softpalizer: &Softpalizer, text: &str) -> String {
        let (text, truncated) = softpalizer.transform_checked(text);
        if truncated {
            self.stats.truncated += 1;
        }
        text
    }

    /// Append `s` to the pool and point `operand` at it.
    fn emit(&mut self, s: &str, operand: &TextOperand) -> Result<()> {
        let (bytes, had_errors) = self.nls.encode(s);
        if had_errors {
            log::warn!("cp932 cannot represent every character of: {s}");
            self.stats.lossy += 1;
        }
        let address = self.text.append(&bytes)?;
        self.code.write_u32(operand.offset as usize, address)?;
        self.stats.operands += 1;
        log::trace!("0x{:X} ({:?}) -> 0x{:X} {}", operand.offset, operand.ty, address, s);
        Ok(())
    }
}

/// A backlog line shown on screen as two consecutive messages:
///
/// ```text
/// LogCharacterName  "Greg"
/// LogMessage        "Oh... no!!"
/// CharacterName     "Greg"
/// DialogueMessage   "Oh... "
/// CharacterName     "Greg"
/// DialogueMessage   "no!!"
/// ```
///
/// Only the last four are extracted. The backlog copy is rebuilt from them
/// and wrapped as a whole; the two halves are cut back out of the wrapped
/// result so line breaks land in the same place on screen.
struct SplitGroup {
    name1: String,
    message1: String,
    name2: String,
    message2: String,
}

impl SplitGroup {
    const SHAPE: [ScriptStringType; 4] = [
        ScriptStringType::CharacterName,
        ScriptStringType::DialogueMessage,
        ScriptStringType::CharacterName,
        ScriptStringType::DialogueMessage,
    ];

    fn take<I>(input: &mut Input<I>, iteration: usize, operand: &TextOperand) -> Result<Self>
    where
        I: Iterator<Item = ScriptString>,
    {
        let mut parts = Vec::with_capacity(4);
        for expected in Self::SHAPE {
            let s = input.next(iteration)?;
            check_type(iteration, operand, expected, &s)?;
            parts.push(s.text);
        }
        let mut parts = parts.into_iter();
        let mut part = || parts.next().unwrap_or_default();
        let group = Self {
            name1: part(),
            message1: part(),
            name2: part(),
            message2: part(),
        };
        if group.name1 != group.name2 {
            log::warn!(
                "#{iteration}: split message at 0x{:X} has two speakers: {:?} / {:?}",
                operand.offset,
                group.name1,
                group.name2
            );
        }
        Ok(group)
    }

    /// Transformed strings for `[log, name1, message1, name2, message2]`.
    fn fan_out(self, softpalizer: &Softpalizer, stats: &mut PatchStats) -> [String; 5] {
        let mut transform = |text: &str| {
            let (text, truncated) = softpalizer.transform_checked(text);
            if truncated {
                stats.truncated += 1;
            }
            text
        };
        let log = transform(&format!("{}{}", self.message1, self.message2));
        let first = transform(&self.message1);
        let name1 = transform(&self.name1);
        let name2 = transform(&self.name2);

        let (message1, message2) = split_log(&log, &first);
        [log, name1, message1, name2, message2]
    }
}

/// Cut the wrapped backlog line at the length of its transformed first half.
///
/// A trailing space in the first half may have become a line break in the
/// whole, so the cut moves back one character to keep the break intact.
pub(crate) fn split_log(log: &str, first: &str) -> (String, String) {
    let mut cut = first.chars().count();
    if first.ends_with(MAP_SPACE_CHARACTER) {
        cut -= 1;
    }
    let at = log.char_indices().nth(cut).map_or(log.len(), |(i, _)| i);
    let (a, b) = log.split_at(at);
    (a.to_string(), b.to_string())
}
