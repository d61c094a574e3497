// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Conservative JavaScript minifier
//!
//! Splits source into code, literals (strings, templates, regular
//! expressions) and comments, then drops comments and collapses whitespace
//! in code. Newlines that automatic semicolon insertion may depend on are
//! kept. Identifiers are never renamed.

use std::ops::Range;
use thiserror::Error;

use crate::sourcemap::LinePosition;

/// Source the scanner could not split: an unterminated literal or comment,
/// or unbalanced brackets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (line {line}, column {column})")]
pub struct JsError {
    /// 1-based
    pub line: usize,
    /// 1-based, in characters
    pub column: usize,
    pub message: String,
}

impl JsError {
    fn at(src: &str, offset: usize, message: &str) -> Self {
        let before = &src[..offset.min(src.len())];
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
            message: message.to_string(),
        }
    }
}

/// Kind of a scanned region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Code,
    /// String, template or regular expression literal, kept verbatim
    Literal,
    LineComment,
    BlockComment,
}

/// A byte range of the source with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub range: Range<usize>,
}

/// Keywords after which `/` starts a regular expression
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    segments: Vec<Segment>,
    code_start: usize,
    /// Last significant code byte
    prev: Option<u8>,
    /// Last identifier or keyword seen in code
    word: String,
    /// Open brackets in code with their offsets
    brackets: Vec<(u8, usize)>,
    /// First problem found, as an offset and a message
    error: Option<(usize, String)>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            segments: Vec::new(),
            code_start: 0,
            prev: None,
            word: String::new(),
            brackets: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, offset: usize, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some((offset, message.into()));
        }
    }

    fn track_bracket(&mut self, b: u8) {
        let open = match b {
            b'(' | b'[' | b'{' => {
                self.brackets.push((b, self.pos));
                return;
            }
            b')' => b'(',
            b']' => b'[',
            b'}' => b'{',
            _ => return,
        };
        match self.brackets.pop() {
            Some((top, _)) if top == open => {}
            _ => self.fail(self.pos, format!("unexpected '{}'", b as char)),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn regex_allowed(&self) -> bool {
        match self.prev {
            None => true,
            Some(b) if is_word_byte(b) => REGEX_KEYWORDS.contains(&self.word.as_str()),
            Some(b) => b"(,=:[!&|?{};+-*%<>~^".contains(&b),
        }
    }

    fn push(&mut self, kind: SegmentKind, start: usize) {
        if self.code_start < start {
            self.segments.push(Segment {
                kind: SegmentKind::Code,
                range: self.code_start..start,
            });
        }
        self.segments.push(Segment {
            kind,
            range: start..self.pos,
        });
        self.code_start = self.pos;
    }

    fn run(mut self) -> (Vec<Segment>, Option<(usize, String)>) {
        while let Some(b) = self.peek(0) {
            let start = self.pos;
            match b {
                b'/' if self.peek(1) == Some(b'/') => {
                    while self.peek(0).is_some_and(|c| c != b'\n') {
                        self.pos += 1;
                    }
                    self.push(SegmentKind::LineComment, start);
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    self.pos += 2;
                    while self.pos < self.src.len()
                        && !(self.peek(0) == Some(b'*') && self.peek(1) == Some(b'/'))
                    {
                        self.pos += 1;
                    }
                    if self.pos >= self.src.len() {
                        self.fail(start, "unterminated comment");
                    }
                    self.pos = (self.pos + 2).min(self.src.len());
                    self.push(SegmentKind::BlockComment, start);
                }
                b'/' if self.regex_allowed() => {
                    self.skip_regex();
                    self.push(SegmentKind::Literal, start);
                    self.prev = Some(b'/');
                    self.word.clear();
                }
                b'\'' | b'"' => {
                    self.skip_string(b);
                    self.push(SegmentKind::Literal, start);
                    self.prev = Some(b);
                    self.word.clear();
                }
                b'`' => {
                    self.skip_template();
                    self.push(SegmentKind::Literal, start);
                    self.prev = Some(b);
                    self.word.clear();
                }
                _ => {
                    if is_word_byte(b) {
                        if self.pos == 0 || !is_word_byte(self.src[self.pos - 1]) {
                            self.word.clear();
                        }
                        if b < 0x80 {
                            self.word.push(b as char);
                        }
                        self.prev = Some(b);
                    } else if !b.is_ascii_whitespace() {
                        self.track_bracket(b);
                        self.prev = Some(b);
                        self.word.clear();
                    }
                    self.pos += 1;
                }
            }
        }

        if self.code_start < self.src.len() {
            self.segments.push(Segment {
                kind: SegmentKind::Code,
                range: self.code_start..self.src.len(),
            });
        }
        if let Some(&(open, offset)) = self.brackets.last() {
            self.fail(offset, format!("unclosed '{}'", open as char));
        }
        (self.segments, self.error)
    }

    /// Quoted string; an unescaped newline ends an unterminated string
    fn skip_string(&mut self, quote: u8) {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => break,
                _ if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.src.len());
        self.fail(start, "unterminated string");
    }

    fn skip_regex(&mut self) {
        let start = self.pos;
        self.pos += 1;
        let mut in_class = false;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => break,
                b'[' => {
                    in_class = true;
                    self.pos += 1;
                }
                b']' => {
                    in_class = false;
                    self.pos += 1;
                }
                b'/' if !in_class => {
                    self.pos += 1;
                    while self.peek(0).is_some_and(|c| c.is_ascii_alphabetic()) {
                        self.pos += 1;
                    }
                    return;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.src.len());
        self.fail(start, "unterminated regular expression");
    }

    /// Template literal including any `${ ... }` substitutions
    fn skip_template(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.pos += 2,
                b'`' => {
                    self.pos += 1;
                    return;
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    self.skip_substitution();
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.src.len());
        self.fail(start, "unterminated template literal");
    }

    fn skip_substitution(&mut self) {
        let mut depth = 1usize;
        while let Some(b) = self.peek(0) {
            match b {
                b'{' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return;
                    }
                }
                b'\'' | b'"' => self.skip_string(b),
                b'`' => self.skip_template(),
                _ => self.pos += 1,
            }
        }
    }
}

/// Split source into code, literal and comment segments covering it fully.
/// Malformed input is split on a best-effort basis.
pub fn scan(src: &str) -> Vec<Segment> {
    Scanner::new(src).run().0
}

/// Like [`scan`], but fails on the first unterminated literal or comment or
/// unbalanced bracket
pub fn scan_checked(src: &str) -> Result<Vec<Segment>, JsError> {
    match Scanner::new(src).run() {
        (segments, None) => Ok(segments),
        (_, Some((offset, message))) => Err(JsError::at(src, offset, &message)),
    }
}

/// Source with literal and comment contents blanked out. Newlines stay, so
/// line and column numbers are unchanged.
pub fn mask_non_code(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    for segment in scan(src) {
        let text = &src[segment.range];
        match segment.kind {
            SegmentKind::Code => out.push_str(text),
            _ => out.extend(text.chars().map(|c| if c == '\n' { '\n' } else { ' ' })),
        }
    }
    out
}

/// Minifier settings
#[derive(Debug, Clone, Copy, Default)]
pub struct JsOptions {
    /// Keep `/*! ... */` comments
    pub keep_special_comments: bool,
}

/// Minified code plus where each input line ended up
#[derive(Debug, Clone)]
pub struct Minified {
    pub code: String,
    /// Indexed by input line; see [`crate::sourcemap::SourceTrack::relocate`]
    pub lines: Vec<Option<LinePosition>>,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    None,
    Space,
    Newline,
}

struct Emitter {
    out: String,
    lines: Vec<Option<LinePosition>>,
    out_line: u32,
    out_col: u32,
    gap: Gap,
}

impl Emitter {
    fn last(&self) -> Option<char> {
        self.out.chars().next_back()
    }

    fn widen(&mut self, gap: Gap) {
        self.gap = self.gap.max(gap);
    }

    fn needs_space(prev: char, next: char) -> bool {
        (is_word_char(prev) && is_word_char(next))
            || (prev == '+' && next == '+')
            || (prev == '-' && next == '-')
            || (prev == '/' && (next == '/' || next == '*'))
            || (prev.is_ascii_digit() && next == '.')
    }

    fn resolve_gap(&mut self, next: char) {
        let gap = std::mem::replace(&mut self.gap, Gap::None);
        let Some(prev) = self.last() else {
            return;
        };

        // A postfix `++`/`--` binds to the operand before it, so the newline
        // after it has to stay or the operator moves to the next line.
        let postfix = self.out.ends_with("++") || self.out.ends_with("--");
        let keep_newline = gap == Gap::Newline
            && (postfix || !";,{([=:&|?*%<>!~^+-".contains(prev))
            && !")]},;".contains(next);

        if keep_newline {
            self.out.push('\n');
            self.out_line += 1;
            self.out_col = 0;
        } else if gap != Gap::None && Self::needs_space(prev, next) {
            self.out.push(' ');
            self.out_col += 1;
        }
    }

    fn emit(&mut self, c: char, in_line: u32, in_col: u32) {
        if let Some(slot) = self.lines.get_mut(in_line as usize) {
            if slot.is_none() && c != '\n' {
                *slot = Some(LinePosition {
                    line: self.out_line,
                    column: self.out_col,
                    input_column: in_col,
                });
            }
        }

        self.out.push(c);
        if c == '\n' {
            self.out_line += 1;
            self.out_col = 0;
        } else {
            self.out_col += 1;
        }
    }
}

/// Minify JavaScript source
pub fn minify(src: &str, options: &JsOptions) -> Result<Minified, JsError> {
    let segments = scan_checked(src)?;
    let line_count = src.split('\n').count();
    let mut em = Emitter {
        out: String::with_capacity(src.len()),
        lines: vec![None; line_count],
        out_line: 0,
        out_col: 0,
        gap: Gap::None,
    };

    let mut in_line = 0u32;
    let mut in_col = 0u32;

    for segment in segments {
        let text = &src[segment.range.clone()];
        let verbatim = match segment.kind {
            SegmentKind::Literal => true,
            SegmentKind::BlockComment => options.keep_special_comments && text.starts_with("/*!"),
            _ => false,
        };

        match segment.kind {
            SegmentKind::LineComment => {}
            SegmentKind::BlockComment if !verbatim => {
                em.widen(if text.contains('\n') { Gap::Newline } else { Gap::Space });
            }
            SegmentKind::Code => {
                for c in text.chars() {
                    match c {
                        '\n' => em.widen(Gap::Newline),
                        c if c.is_whitespace() => em.widen(Gap::Space),
                        c => {
                            em.resolve_gap(c);
                            em.emit(c, in_line, in_col);
                        }
                    }
                    advance(c, &mut in_line, &mut in_col);
                }
                continue;
            }
            _ => {
                if let Some(first) = text.chars().next() {
                    em.resolve_gap(first);
                }
                for c in text.chars() {
                    em.emit(c, in_line, in_col);
                    advance(c, &mut in_line, &mut in_col);
                }
                continue;
            }
        }

        for c in text.chars() {
            advance(c, &mut in_line, &mut in_col);
        }
    }

    Ok(Minified {
        code: em.out,
        lines: em.lines,
    })
}

fn advance(c: char, line: &mut u32, col: &mut u32) {
    if c == '\n' {
        *line += 1;
        *col = 0;
    } else {
        *col += 1;
    }
}
