// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Virtual files flowing through a pipeline
//!
//! A task reads the files matched by its `src` globs into [`FileRecord`]s.
//! Each record remembers the glob base it was found under, so stages and
//! `dest` work with paths relative to that base (`js/src/*.js` reads
//! `js/src/a.js` as `a.js`).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::errors::{AssetflowError, StageError};
use crate::sourcemap::SourceTrack;

/// A single lint finding (1-based line and column)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintIssue {
    pub line: usize,
    pub column: usize,
    pub rule: String,
    pub message: String,
}

impl LintIssue {
    pub fn new(line: usize, column: usize, rule: &str, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}

/// An in-memory file
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute directory `path` is relative to
    pub base: PathBuf,
    /// Path relative to `base`
    pub path: PathBuf,
    /// File contents
    pub contents: Vec<u8>,
    /// Modification time of the file this record was read from
    pub modified: Option<SystemTime>,
    /// Position tracking for source maps
    pub source_map: Option<SourceTrack>,
    /// Issues recorded by a lint stage
    pub lint: Vec<LintIssue>,
}

impl FileRecord {
    /// Create a record with no source metadata
    pub fn new(base: impl Into<PathBuf>, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
            contents: contents.into(),
            modified: None,
            source_map: None,
            lint: Vec::new(),
        }
    }

    /// Full path of the record (`base/path`)
    pub fn absolute_path(&self) -> PathBuf {
        self.base.join(&self.path)
    }

    /// Relative path with forward slashes, as shown in messages
    pub fn relative(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }

    /// File name without directories
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Lower-case extension, if any
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    /// Contents as UTF-8 text
    pub fn text(&self) -> Result<&str, StageError> {
        std::str::from_utf8(&self.contents).map_err(|_| StageError::NotText {
            file: self.path.clone(),
        })
    }

    /// Replace the contents with text
    pub fn set_text(&mut self, text: String) {
        self.contents = text.into_bytes();
    }
}

/// Ordered set of file records
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Vec<FileRecord>,
}

impl FileSet {
    pub fn new(files: Vec<FileRecord>) -> Self {
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileRecord> {
        self.files.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, FileRecord> {
        self.files.iter_mut()
    }

    pub fn push(&mut self, file: FileRecord) {
        self.files.push(file);
    }

    /// Find a record by relative path
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.path == path.as_ref())
    }
}

impl IntoIterator for FileSet {
    type Item = FileRecord;
    type IntoIter = std::vec::IntoIter<FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl FromIterator<FileRecord> for FileSet {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Glob match options shared by source collection, filters and watch
/// bindings: `*` never crosses a directory separator.
pub fn match_options() -> glob::MatchOptions {
    glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// Leading directory of a pattern that contains no glob syntax.
///
/// `js/src/*.js` → `js/src`, `css/**/*.scss` → `css`, `img/logo.png` → `img`.
pub fn glob_base(pattern: &str) -> PathBuf {
    let parts: Vec<&str> = pattern.split('/').collect();

    let mut literal = Vec::new();
    for part in &parts {
        if part.contains(|c: char| matches!(c, '*' | '?' | '[' | '{')) {
            break;
        }
        literal.push(*part);
    }

    // A fully literal pattern names a file, its base is the parent
    if literal.len() == parts.len() {
        literal.pop();
    }

    literal
        .into_iter()
        .filter(|p| !p.is_empty() && *p != ".")
        .collect()
}

/// Compiled `src` patterns: includes plus `!`-prefixed excludes
#[derive(Debug, Clone)]
pub struct SourcePatterns {
    include: Vec<(String, glob::Pattern)>,
    exclude: Vec<glob::Pattern>,
}

impl SourcePatterns {
    pub fn new(patterns: &[String]) -> Result<Self, AssetflowError> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for pattern in patterns {
            match pattern.strip_prefix('!') {
                Some(negated) => exclude.push(glob::Pattern::new(negated)?),
                None => include.push((pattern.clone(), glob::Pattern::new(pattern)?)),
            }
        }

        Ok(Self { include, exclude })
    }

    /// Whether a path relative to the working directory is selected
    pub fn matches(&self, relative: &Path) -> bool {
        let opts = match_options();
        let included = self
            .include
            .iter()
            .any(|(_, p)| p.matches_path_with(relative, opts));
        included && !self.is_excluded(relative)
    }

    /// Glob bases of the include patterns
    pub fn bases(&self) -> Vec<PathBuf> {
        let mut bases: Vec<PathBuf> = self.include.iter().map(|(p, _)| glob_base(p)).collect();
        bases.sort();
        bases.dedup();
        bases
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        let opts = match_options();
        self.exclude.iter().any(|p| p.matches_path_with(relative, opts))
    }

    /// Read every file selected by the patterns, in glob order
    pub async fn collect(&self, working_dir: &Path) -> Result<FileSet, AssetflowError> {
        let mut files = Vec::new();
        let mut seen = HashSet::new();
        let escaped_root = glob::Pattern::escape(&working_dir.to_string_lossy());

        for (pattern, _) in &self.include {
            let full_pattern = if Path::new(pattern).is_absolute() {
                pattern.clone()
            } else {
                format!("{}/{}", escaped_root.trim_end_matches('/'), pattern)
            };
            let base = working_dir.join(glob_base(pattern));

            let entries = glob::glob_with(&full_pattern, match_options())?;
            for entry in entries.filter_map(Result::ok) {
                if !entry.is_file() || !seen.insert(entry.clone()) {
                    continue;
                }

                let relative_to_root = entry.strip_prefix(working_dir).unwrap_or(&entry);
                if self.is_excluded(relative_to_root) {
                    continue;
                }

                let path = entry
                    .strip_prefix(&base)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(entry.file_name().unwrap_or_default()));

                let contents = tokio::fs::read(&entry).await.map_err(|e| {
                    AssetflowError::FileReadError {
                        path: entry.clone(),
                        error: e.to_string(),
                    }
                })?;
                let modified = tokio::fs::metadata(&entry)
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok());

                let mut record = FileRecord::new(base.clone(), path, contents);
                record.modified = modified;
                files.push(record);
            }
        }

        Ok(FileSet::new(files))
    }
}

/// Path relative to `root`, or unchanged when it is not below it
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Whether a relative path stays inside its root (no `..`, no absolute part)
pub fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("js/src/*.js"), PathBuf::from("js/src"));
        assert_eq!(glob_base("css/**/*.scss"), PathBuf::from("css"));
        assert_eq!(glob_base("img/logo.png"), PathBuf::from("img"));
        assert_eq!(glob_base("*.js"), PathBuf::new());
        assert_eq!(glob_base("./js/{a,b}.js"), PathBuf::from("js"));
    }

    #[test]
    fn test_patterns_respect_excludes() {
        let patterns = SourcePatterns::new(&[
            "js/src/*.js".to_string(),
            "!js/src/*.test.js".to_string(),
        ])
        .unwrap();

        assert!(patterns.matches(Path::new("js/src/app.js")));
        assert!(!patterns.matches(Path::new("js/src/app.test.js")));
        assert!(!patterns.matches(Path::new("js/src/nested/app.js")));
        assert!(!patterns.matches(Path::new("js/plugins/app.js")));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let result = SourcePatterns::new(&["js/[".to_string()]);
        assert!(matches!(result, Err(AssetflowError::GlobPattern { .. })));
    }

    #[tokio::test]
    async fn test_collect_relative_to_glob_base() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("css/sub")).unwrap();
        std::fs::write(root.join("css/main.scss"), "a{}").unwrap();
        std::fs::write(root.join("css/sub/extra.scss"), "b{}").unwrap();
        std::fs::write(root.join("css/plain.css"), "c{}").unwrap();

        let patterns = SourcePatterns::new(&["css/**/*.scss".to_string()]).unwrap();
        let files = patterns.collect(root).await.unwrap();

        let mut paths: Vec<String> = files.iter().map(|f| f.relative()).collect();
        paths.sort();
        assert_eq!(paths, vec!["main.scss", "sub/extra.scss"]);
        assert!(files.iter().all(|f| f.base == root.join("css")));
        assert!(files.iter().all(|f| f.modified.is_some()));
    }

    #[tokio::test]
    async fn test_collect_deduplicates_overlapping_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("js")).unwrap();
        std::fs::write(root.join("js/a.js"), "a").unwrap();

        let patterns =
            SourcePatterns::new(&["js/*.js".to_string(), "js/a.js".to_string()]).unwrap();
        let files = patterns.collect(root).await.unwrap();

        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained(Path::new("css/app.css")));
        assert!(!is_contained(Path::new("../etc/passwd")));
        assert!(!is_contained(Path::new("/etc/passwd")));
    }
}
