// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

use async_trait::async_trait;
use tracing::debug;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::{relative_to, FileRecord, FileSet};
use crate::minify::{css, js, CssOptions, JsError, JsOptions};

/// Minifies scripts and stylesheets; other files pass through unchanged
#[derive(Debug)]
pub struct MinifyStage {
    keep_special_comments: bool,
}

impl MinifyStage {
    pub fn new(keep_special_comments: bool) -> Self {
        Self {
            keep_special_comments,
        }
    }
}

#[async_trait]
impl Stage for MinifyStage {
    fn name(&self) -> &'static str {
        "minify"
    }

    async fn apply(&self, mut files: FileSet, ctx: &TaskContext) -> Result<FileSet, StageError> {
        for file in files.iter_mut() {
            match file.extension().as_deref() {
                Some("js" | "mjs" | "cjs") => {
                    let minified = js::minify(
                        file.text()?,
                        &JsOptions {
                            keep_special_comments: self.keep_special_comments,
                        },
                    )
                    .map_err(|e| syntax_error(file, ctx, e))?;
                    if let Some(track) = file.source_map.as_mut() {
                        track.relocate(&minified.lines);
                    }
                    file.set_text(minified.code);
                }
                Some("css") => {
                    let options = CssOptions {
                        browsers: None,
                        minify: true,
                        keep_special_comments: self.keep_special_comments,
                    };
                    let processed = css::process(file.text()?, &file.relative(), &options).map_err(
                        |e| StageError::Compile {
                            tool: "CSS minifier".into(),
                            file: ctx.display_path(file),
                            line: e.line,
                            column: e.column,
                            message: e.message,
                            details: vec![],
                        },
                    )?;
                    if let Some(track) = file.source_map.as_mut() {
                        track.remap(&processed.positions);
                    }
                    file.set_text(processed.code);
                }
                _ => debug!(file = %file.relative(), "not minifiable, passing through"),
            }
        }

        Ok(files)
    }
}

/// Report a script error against the original source when the file
/// carries a track back to it
fn syntax_error(file: &FileRecord, ctx: &TaskContext, e: JsError) -> StageError {
    let origin = file
        .source_map
        .as_ref()
        .and_then(|track| track.origin(e.line as u32 - 1, e.column as u32 - 1));

    let (path, line, column) = match origin {
        Some((source, m)) => {
            let offset = (e.column - 1).saturating_sub(m.generated_column as usize);
            (
                relative_to(&file.base.join(&source.path), &ctx.working_dir),
                m.original_line as usize + 1,
                m.original_column as usize + offset + 1,
            )
        }
        None => (ctx.display_path(file), e.line, e.column),
    };

    StageError::Compile {
        tool: "JS minifier".into(),
        file: path,
        line: Some(line),
        column: Some(column),
        message: e.message,
        details: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::SourceTrack;
    use crate::stages::test_support::{context, record};
    use std::path::Path;

    #[tokio::test]
    async fn test_minifies_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path());
        let files = FileSet::new(vec![
            record(dir.path(), "app.js", "// hello\nvar  a = 1 ;\n"),
            record(dir.path(), "app.css", "a {\n  color: red;\n}\n"),
            record(dir.path(), "notes.txt", "  keep   me  "),
        ]);

        let out = MinifyStage::new(false).apply(files, &ctx).await.unwrap();

        assert_eq!(out.get("app.js").unwrap().text().unwrap(), "var a=1;");
        assert_eq!(out.get("app.css").unwrap().text().unwrap(), "a{color:red}");
        assert_eq!(out.get("notes.txt").unwrap().text().unwrap(), "  keep   me  ");
    }

    #[tokio::test]
    async fn test_js_track_follows_code() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path());
        let text = "var a = 1;\n\n// note\nvar b = 2;\n";
        let mut file = record(dir.path(), "app.js", text);
        file.source_map = Some(SourceTrack::identity(Path::new("app.js"), text));

        let out = MinifyStage::new(false)
            .apply(FileSet::new(vec![file]), &ctx)
            .await
            .unwrap();
        let app = out.get("app.js").unwrap();
        assert_eq!(app.text().unwrap(), "var a=1;var b=2;");

        let map = app
            .source_map
            .as_ref()
            .unwrap()
            .to_source_map("app.js", None, false);
        let hit = map.lookup(0, 10).unwrap().unwrap();
        assert_eq!(hit.line, 3);
    }

    #[tokio::test]
    async fn test_malformed_script_fails_with_position() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path());
        let files = FileSet::new(vec![record(
            dir.path(),
            "app.js",
            "var a = 1;\nvar b = 2;\nvar c = \"open;\n",
        )]);

        let err = MinifyStage::new(false).apply(files, &ctx).await.unwrap_err();
        match err {
            StageError::Compile {
                tool, line, column, ..
            } => {
                assert_eq!(tool, "JS minifier");
                assert_eq!(line, Some(3));
                assert_eq!(column, Some(9));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_keeps_special_comments() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path());
        let files = FileSet::new(vec![record(dir.path(), "app.js", "/*! site */\nvar a = 1;\n")]);

        let out = MinifyStage::new(true).apply(files, &ctx).await.unwrap();
        assert!(out.get("app.js").unwrap().text().unwrap().starts_with("/*! site */"));
    }
}
