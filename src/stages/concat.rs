// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Concatenation stage

use async_trait::async_trait;
use std::path::PathBuf;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::{is_contained, FileRecord, FileSet};
use crate::sourcemap::SourceTrack;

/// Merges every file into one, in input order
#[derive(Debug)]
pub struct ConcatStage {
    file: PathBuf,
    separator: String,
}

impl ConcatStage {
    pub fn new(file: &str, separator: &str) -> Result<Self, String> {
        let path = PathBuf::from(file);
        if file.is_empty() || !is_contained(&path) {
            return Err(format!("'{}' is not a relative file name", file));
        }

        Ok(Self {
            file: path,
            separator: separator.to_string(),
        })
    }
}

#[async_trait]
impl Stage for ConcatStage {
    fn name(&self) -> &'static str {
        "concat"
    }

    async fn apply(&self, files: FileSet, _ctx: &TaskContext) -> Result<FileSet, StageError> {
        let mut iter = files.into_iter();
        let Some(first) = iter.next() else {
            return Ok(FileSet::default());
        };

        let mut text = first.text()?.to_string();
        let mut track = first.source_map.clone();
        let mut modified = first.modified;
        let base = first.base.clone();
        let separator_lines = self.separator.matches('\n').count() as u32;
        // Newlines in `text` so far
        let mut lines = text.matches('\n').count() as u32;

        for file in iter {
            let next = file.text()?;
            text.push_str(&self.separator);
            text.push_str(next);
            let offset = lines + separator_lines;
            lines = offset + next.matches('\n').count() as u32;

            match (&mut track, &file.source_map) {
                (Some(merged), Some(other)) => merged.append(other, offset),
                (None, Some(other)) => {
                    let mut merged = SourceTrack::default();
                    merged.append(other, offset);
                    track = Some(merged);
                }
                _ => {}
            }
            modified = modified.max(file.modified);
        }

        let mut merged = FileRecord::new(base, self.file.clone(), text.into_bytes());
        merged.modified = modified;
        merged.source_map = track;

        Ok(FileSet::new(vec![merged]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{context, record};
    use std::path::Path;

    fn tracked(base: &Path, path: &str, text: &str) -> FileRecord {
        let mut file = record(base, path, text);
        file.source_map = Some(SourceTrack::identity(Path::new(path), text));
        file
    }

    #[test]
    fn test_rejects_escaping_name() {
        assert!(ConcatStage::new("../app.js", "\n").is_err());
        assert!(ConcatStage::new("", "\n").is_err());
    }

    #[tokio::test]
    async fn test_joins_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path());
        let files = FileSet::new(vec![
            record(dir.path(), "a.js", "var a = 1;"),
            record(dir.path(), "b.js", "var b = 2;"),
        ]);

        let out = ConcatStage::new("app.js", "\n").unwrap().apply(files, &ctx).await.unwrap();

        assert_eq!(out.len(), 1);
        let app = out.get("app.js").unwrap();
        assert_eq!(app.text().unwrap(), "var a = 1;\nvar b = 2;");
        assert_eq!(app.base, dir.path());
    }

    #[tokio::test]
    async fn test_empty_input_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path());
        let out = ConcatStage::new("app.js", "\n")
            .unwrap()
            .apply(FileSet::default(), &ctx)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_tracks_are_offset() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path());
        let files = FileSet::new(vec![
            tracked(dir.path(), "a.js", "a1;\na2;\n"),
            tracked(dir.path(), "b.js", "b1;\n"),
        ]);

        let out = ConcatStage::new("app.js", "\n").unwrap().apply(files, &ctx).await.unwrap();
        let app = out.get("app.js").unwrap();
        assert_eq!(app.text().unwrap(), "a1;\na2;\n\nb1;\n");

        let map = app
            .source_map
            .as_ref()
            .unwrap()
            .to_source_map("app.js", None, false);
        assert_eq!(map.sources, vec!["a.js", "b.js"]);
        let hit = map.lookup(3, 0).unwrap().unwrap();
        assert_eq!(hit.source, "b.js");
        assert_eq!(hit.line, 0);
        assert!(map.lookup(2, 0).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offsets_with_multiline_separator() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path());
        let files = FileSet::new(vec![
            tracked(dir.path(), "a.js", "a\n"),
            tracked(dir.path(), "b.js", "b1\nb2"),
            tracked(dir.path(), "c.js", "c"),
        ]);

        let out = ConcatStage::new("app.js", "\n/* -- */\n")
            .unwrap()
            .apply(files, &ctx)
            .await
            .unwrap();
        let app = out.get("app.js").unwrap();
        let text = app.text().unwrap();
        assert_eq!(text.lines().nth(6), Some("c"));

        let map = app
            .source_map
            .as_ref()
            .unwrap()
            .to_source_map("app.js", None, false);
        let b2 = map.lookup(4, 0).unwrap().unwrap();
        assert_eq!((b2.source.as_str(), b2.line), ("b.js", 1));
        let c = map.lookup(6, 0).unwrap().unwrap();
        assert_eq!((c.source.as_str(), c.line), ("c.js", 0));
    }
}
