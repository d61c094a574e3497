// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Source map output stage
//!
//! Adds a `.map` record after every tracked file and points the file at it
//! with a `sourceMappingURL` comment. Untracked files pass through.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::{is_contained, FileRecord, FileSet};

#[derive(Debug)]
pub struct SourcemapsStage {
    /// `None` writes maps next to their files
    dir: Option<PathBuf>,
    include_content: bool,
    source_root: Option<String>,
}

impl SourcemapsStage {
    pub fn new(dir: &str, include_content: bool, source_root: Option<String>) -> Result<Self, String> {
        let dir = match dir.trim_end_matches('/') {
            "" | "." => None,
            other => {
                let path = PathBuf::from(other);
                if !is_contained(&path) {
                    return Err(format!("map directory '{}' must be relative", dir));
                }
                Some(path)
            }
        };

        Ok(Self {
            dir,
            include_content,
            source_root,
        })
    }

    /// Where the map for `path` is written, relative to the same base
    fn map_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".map");
        match &self.dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// URL of the map as seen from the generated file
    fn map_url(&self, path: &Path, map_path: &Path) -> String {
        let url = match &self.dir {
            Some(_) => {
                let depth = path
                    .parent()
                    .map(|p| p.components().filter(|c| matches!(c, Component::Normal(_))).count())
                    .unwrap_or(0);
                format!("{}{}", "../".repeat(depth), map_path.to_string_lossy())
            }
            None => map_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        url.replace('\\', "/")
    }
}

#[async_trait]
impl Stage for SourcemapsStage {
    fn name(&self) -> &'static str {
        "sourcemaps"
    }

    async fn apply(&self, files: FileSet, _ctx: &TaskContext) -> Result<FileSet, StageError> {
        let mut out = FileSet::default();

        for mut file in files {
            let Some(track) = file.source_map.take() else {
                out.push(file);
                continue;
            };

            let map_path = self.map_path(&file.path);
            let url = self.map_url(&file.path, &map_path);
            let map = track.to_source_map(&file.file_name(), self.source_root.as_deref(), self.include_content);
            let json = serde_json::to_string(&map).map_err(|e| StageError::Worker {
                message: e.to_string(),
            })?;

            let comment = match file.extension().as_deref() {
                Some("css") => format!("\n/*# sourceMappingURL={} */", url),
                _ => format!("\n//# sourceMappingURL={}", url),
            };
            let text = format!("{}{}", file.text()?, comment);
            file.set_text(text);

            let mut map_record = FileRecord::new(file.base.clone(), map_path, json.into_bytes());
            map_record.modified = file.modified;

            out.push(file);
            out.push(map_record);
        }

        Ok(out)
    }
}
