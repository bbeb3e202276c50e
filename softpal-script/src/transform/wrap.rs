use regex::Regex;

/// Horizontal metrics of one font.
pub trait GlyphMetrics {
    /// Advance width of `ch` at `px` pixels.
    fn advance(&self, ch: char, px: f32) -> f32;

    /// Kerning adjustment between two adjacent glyphs.
    fn kern(&self, _left: char, _right: char, _px: f32) -> f32 {
        0.0
    }
}

impl GlyphMetrics for fontdue::Font {
    fn advance(&self, ch: char, px: f32) -> f32 {
        self.metrics(ch, px).advance_width
    }

    fn kern(&self, left: char, right: char, px: f32) -> f32 {
        self.horizontal_kern(left, right, px).unwrap_or(0.0)
    }
}

/// Metrics of the engine's stock cp932 bitmap font: single-byte characters
/// are half a cell wide, everything else a full cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellMetrics;

impl GlyphMetrics for CellMetrics {
    fn advance(&self, ch: char, px: f32) -> f32 {
        let half = ch.is_ascii() || ('\u{FF61}'..='\u{FF9F}').contains(&ch);
        if half {
            (px / 2.0).ceil()
        } else {
            px
        }
    }
}

/// Greedy proportional word wrapper.
///
/// Control-code spans are atomic and take no width. A span equal to the
/// break token ends the line. When a glyph would overflow, the last space on
/// the line becomes a break; a word wider than a whole line is broken
/// between characters.
pub struct WordWrapper<'a> {
    metrics: &'a dyn GlyphMetrics,
    px: f32,
    bold: bool,
    line_width: u32,
    warn_lines: usize,
}

enum Token<'t> {
    Control(&'t str),
    Break,
    Char(char),
}

impl<'a> WordWrapper<'a> {
    pub fn new(metrics: &'a dyn GlyphMetrics, px: f32, line_width: u32) -> Self {
        Self {
            metrics,
            px,
            bold: false,
            line_width,
            warn_lines: 0,
        }
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    /// Warn about text that needs more than `lines` lines; 0 disables.
    pub fn warn_lines(mut self, lines: usize) -> Self {
        self.warn_lines = lines;
        self
    }

    #[inline]
    pub fn line_width(&self) -> u32 {
        self.line_width
    }

    #[inline]
    pub fn px(&self) -> f32 {
        self.px
    }

    fn glyph_width(&self, prev: Option<char>, ch: char) -> f32 {
        let mut w = self.metrics.advance(ch, self.px);
        if let Some(p) = prev {
            w += self.metrics.kern(p, ch, self.px);
        }
        if self.bold {
            w += 1.0;
        }
        w
    }

    /// Width of `text` on a single line, ignoring control codes.
    pub fn measure(&self, text: &str, control: &Regex) -> f32 {
        let mut width = 0.0;
        let mut prev = None;
        for token in tokenize(text, control, "") {
            if let Token::Char(ch) = token {
                width += self.glyph_width(prev, ch);
                prev = (ch != ' ').then_some(ch);
            }
        }
        width
    }

    pub fn wrap(&self, text: &str, control: &Regex, break_token: &str) -> String {
        let max = self.line_width as f32;
        let mut out = String::with_capacity(text.len() + 16);
        let mut line_w = 0.0f32;
        let mut lines = 1usize;
        // byte index of the last space on this line, and the line width through it
        let mut last_space: Option<(usize, f32)> = None;
        let mut prev: Option<char> = None;

        for token in tokenize(text, control, break_token) {
            match token {
                Token::Control(span) => out.push_str(span),
                Token::Break => {
                    out.push_str(break_token);
                    line_w = 0.0;
                    lines += 1;
                    last_space = None;
                    prev = None;
                }
                Token::Char(' ') => {
                    line_w += self.glyph_width(None, ' ');
                    last_space = Some((out.len(), line_w));
                    out.push(' ');
                    prev = None;
                }
                Token::Char(ch) => {
                    let mut w = self.glyph_width(prev, ch);
                    if line_w + w > max && line_w > 0.0 {
                        if let Some((at, through)) = last_space.take() {
                            out.replace_range(at..at + 1, break_token);
                            line_w -= through;
                            lines += 1;
                        }
                        if line_w + w > max && line_w > 0.0 {
                            out.push_str(break_token);
                            line_w = 0.0;
                            lines += 1;
                            w = self.glyph_width(None, ch);
                        }
                    }
                    out.push(ch);
                    line_w += w;
                    prev = Some(ch);
                }
            }
        }

        if self.warn_lines > 0 && lines > self.warn_lines {
            log::warn!("{} lines (limit {}) in: {}", lines, self.warn_lines, out);
        }
        out
    }
}

fn tokenize<'t>(text: &'t str, control: &Regex, break_token: &str) -> Vec<Token<'t>> {
    let mut tokens = Vec::with_capacity(text.len());
    let mut last = 0;
    for m in control.find_iter(text) {
        tokens.extend(text[last..m.start()].chars().map(Token::Char));
        if !break_token.is_empty() && m.as_str() == break_token {
            tokens.push(Token::Break);
        } else {
            tokens.push(Token::Control(m.as_str()));
        }
        last = m.end();
    }
    tokens.extend(text[last..].chars().map(Token::Char));
    tokens
}
