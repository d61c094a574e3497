// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Source maps
//!
//! A file record that belongs to a task with a `sourcemaps` stage carries a
//! [`SourceTrack`]: the original sources plus position mappings, kept in
//! step by every stage that rewrites text. The `sourcemaps` stage turns the
//! track into a Source Map v3 document ([`SourceMap`]).
//!
//! All lines and columns in this module are zero-based.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Errors while decoding a mappings string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceMapError {
    #[error("invalid base64 digit '{0}' in mappings")]
    InvalidDigit(char),

    #[error("mappings ended in the middle of a value")]
    Truncated,

    #[error("segment with {0} fields (expected 1, 4 or 5)")]
    InvalidSegment(usize),

    #[error("mapping refers to negative position")]
    Negative,
}

/// One generated → original position pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source: u32,
    pub original_line: u32,
    pub original_column: u32,
}

/// An original input file referenced by a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSource {
    /// Path relative to the glob base it was read from
    pub path: PathBuf,
    /// Original text, kept for `sourcesContent`
    pub content: Option<String>,
}

/// Where the first retained character of an input line ended up after a
/// whitespace-level rewrite (see [`SourceTrack::relocate`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePosition {
    pub line: u32,
    pub column: u32,
    /// Input column of that first retained character
    pub input_column: u32,
}

/// Mappings carried alongside a file record through a pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTrack {
    pub sources: Vec<TrackedSource>,
    pub mappings: Vec<Mapping>,
}

impl SourceTrack {
    /// Line-granular identity mapping for a freshly read file
    pub fn identity(path: &Path, content: &str) -> Self {
        let mut lines: Vec<&str> = content.split('\n').collect();
        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        let mappings = (0..lines.len() as u32)
            .map(|line| Mapping {
                generated_line: line,
                generated_column: 0,
                source: 0,
                original_line: line,
                original_column: 0,
            })
            .collect();

        Self {
            sources: vec![TrackedSource {
                path: path.to_path_buf(),
                content: Some(content.to_string()),
            }],
            mappings,
        }
    }

    /// Account for text prepended to the file: `lines` newlines, then
    /// `columns` characters on what becomes the first original line.
    pub fn shift(&mut self, lines: u32, columns: u32) {
        for m in &mut self.mappings {
            if m.generated_line == 0 {
                m.generated_column += columns;
            }
            m.generated_line += lines;
        }
    }

    /// Account for prepending `text` to the file.
    pub fn shift_for_prefix(&mut self, text: &str) {
        let lines = text.matches('\n').count() as u32;
        let columns = text
            .rsplit('\n')
            .next()
            .map(|tail| tail.chars().count() as u32)
            .unwrap_or(0);
        self.shift(lines, columns);
    }

    /// Merge another track whose text was appended starting at
    /// `line_offset`. Sources are de-duplicated by path.
    pub fn append(&mut self, other: &SourceTrack, line_offset: u32) {
        let remap: Vec<u32> = other
            .sources
            .iter()
            .map(|src| match self.sources.iter().position(|s| s.path == src.path) {
                Some(idx) => idx as u32,
                None => {
                    self.sources.push(src.clone());
                    (self.sources.len() - 1) as u32
                }
            })
            .collect();

        for m in &other.mappings {
            self.mappings.push(Mapping {
                generated_line: m.generated_line + line_offset,
                source: remap[m.source as usize],
                ..*m
            });
        }
    }

    /// Move mappings after a rewrite that only dropped or collapsed
    /// characters. `table[n]` is where input line `n` went, or `None` when
    /// nothing from it survived.
    pub fn relocate(&mut self, table: &[Option<LinePosition>]) {
        self.mappings = self
            .mappings
            .iter()
            .filter_map(|m| {
                let pos = table.get(m.generated_line as usize).copied().flatten()?;
                Some(Mapping {
                    generated_line: pos.line,
                    generated_column: pos.column
                        + m.generated_column.saturating_sub(pos.input_column),
                    ..*m
                })
            })
            .collect();
        self.mappings.sort();
    }

    /// Fall back to file-level granularity after a rewrite whose positions
    /// cannot be followed: every output line points at the start of the
    /// first original source.
    pub fn collapse(&mut self, output: &str) {
        if self.sources.is_empty() {
            self.mappings.clear();
            return;
        }

        let lines = output.split('\n').count() as u32;
        self.mappings = (0..lines)
            .map(|line| Mapping {
                generated_line: line,
                generated_column: 0,
                source: 0,
                original_line: 0,
                original_column: 0,
            })
            .collect();
    }

    /// Follow a rewrite that reports where its output came from.
    /// `positions` hold output positions in `generated_*` and the matching
    /// input positions in `original_*`; their `source` is ignored.
    pub fn remap(&mut self, positions: &[Mapping]) {
        let mut mappings: Vec<Mapping> = positions
            .iter()
            .filter_map(|p| {
                let (_, m) = self.origin(p.original_line, p.original_column)?;
                Some(Mapping {
                    generated_line: p.generated_line,
                    generated_column: p.generated_column,
                    source: m.source,
                    original_line: m.original_line,
                    original_column: m.original_column + (p.original_column - m.generated_column),
                })
            })
            .collect();
        mappings.sort();
        mappings.dedup();
        self.mappings = mappings;
    }

    /// Original source and mapping for a generated position: the closest
    /// mapping at or before `column` on `line` (both 0-based).
    pub fn origin(&self, line: u32, column: u32) -> Option<(&TrackedSource, Mapping)> {
        let mapping = self
            .mappings
            .iter()
            .filter(|m| m.generated_line == line && m.generated_column <= column)
            .max_by_key(|m| m.generated_column)?;
        let source = self.sources.get(mapping.source as usize)?;
        Some((source, *mapping))
    }

    /// Render as a Source Map v3 document
    pub fn to_source_map(
        &self,
        file: &str,
        source_root: Option<&str>,
        include_content: bool,
    ) -> SourceMap {
        let sources = self
            .sources
            .iter()
            .map(|s| s.path.to_string_lossy().replace('\\', "/"))
            .collect();

        let sources_content = include_content
            .then(|| self.sources.iter().map(|s| s.content.clone()).collect());

        let mut mappings = self.mappings.clone();
        mappings.sort();

        SourceMap {
            version: 3,
            file: file.to_string(),
            source_root: source_root.map(String::from),
            sources,
            sources_content,
            names: vec![],
            mappings: encode_mappings(&mappings),
        }
    }
}

/// Source Map revision 3 document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    #[serde(rename = "sourceRoot", default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    pub sources: Vec<String>,
    #[serde(rename = "sourcesContent", default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

/// Original position resolved from a generated one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    pub line: u32,
    pub column: u32,
}

impl SourceMap {
    /// Decode the `mappings` field
    pub fn decode(&self) -> Result<Vec<Mapping>, SourceMapError> {
        decode_mappings(&self.mappings)
    }

    /// Resolve a generated position to the closest mapping at or before it
    /// on the same line.
    pub fn lookup(&self, line: u32, column: u32) -> Result<Option<OriginalPosition>, SourceMapError> {
        let mappings = self.decode()?;

        let found = mappings
            .iter()
            .filter(|m| m.generated_line == line && m.generated_column <= column)
            .max_by_key(|m| m.generated_column);

        Ok(found.and_then(|m| {
            self.sources.get(m.source as usize).map(|source| OriginalPosition {
                source: source.clone(),
                line: m.original_line,
                column: m.original_column,
            })
        }))
    }
}

/// Encode sorted mappings into the `mappings` string
pub fn encode_mappings(mappings: &[Mapping]) -> String {
    let mut out = String::new();
    let mut line = 0u32;
    let mut prev_column = 0i64;
    let mut prev_source = 0i64;
    let mut prev_orig_line = 0i64;
    let mut prev_orig_column = 0i64;
    let mut first_in_line = true;

    for m in mappings {
        while line < m.generated_line {
            out.push(';');
            line += 1;
            prev_column = 0;
            first_in_line = true;
        }

        if !first_in_line {
            out.push(',');
        }
        first_in_line = false;

        encode_vlq(m.generated_column as i64 - prev_column, &mut out);
        encode_vlq(m.source as i64 - prev_source, &mut out);
        encode_vlq(m.original_line as i64 - prev_orig_line, &mut out);
        encode_vlq(m.original_column as i64 - prev_orig_column, &mut out);

        prev_column = m.generated_column as i64;
        prev_source = m.source as i64;
        prev_orig_line = m.original_line as i64;
        prev_orig_column = m.original_column as i64;
    }

    out
}

/// Decode a `mappings` string. Segments without a source are skipped.
pub fn decode_mappings(input: &str) -> Result<Vec<Mapping>, SourceMapError> {
    let mut mappings = Vec::new();
    let mut source = 0i64;
    let mut orig_line = 0i64;
    let mut orig_column = 0i64;

    for (line, group) in input.split(';').enumerate() {
        let mut column = 0i64;

        for segment in group.split(',').filter(|s| !s.is_empty()) {
            let mut chars = segment.chars().peekable();
            let mut fields = Vec::with_capacity(5);
            while chars.peek().is_some() {
                fields.push(decode_vlq(&mut chars)?);
            }

            match fields.len() {
                1 => {
                    column += fields[0];
                }
                4 | 5 => {
                    column += fields[0];
                    source += fields[1];
                    orig_line += fields[2];
                    orig_column += fields[3];

                    if column < 0 || source < 0 || orig_line < 0 || orig_column < 0 {
                        return Err(SourceMapError::Negative);
                    }

                    mappings.push(Mapping {
                        generated_line: line as u32,
                        generated_column: column as u32,
                        source: source as u32,
                        original_line: orig_line as u32,
                        original_column: orig_column as u32,
                    });
                }
                n => return Err(SourceMapError::InvalidSegment(n)),
            }
        }
    }

    Ok(mappings)
}

fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };

    loop {
        let mut digit = vlq & 0b11111;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

fn decode_vlq(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<i64, SourceMapError> {
    let mut result = 0i64;
    let mut shift = 0u32;

    loop {
        let c = chars.next().ok_or(SourceMapError::Truncated)?;
        let digit = BASE64
            .iter()
            .position(|&b| b as char == c)
            .ok_or(SourceMapError::InvalidDigit(c))? as i64;

        result += (digit & 0b11111) << shift;
        shift += 5;

        if digit & 0b100000 == 0 {
            break;
        }
    }

    let negative = result & 1 == 1;
    let value = result >> 1;
    Ok(if negative { -value } else { value })
}
