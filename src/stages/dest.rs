// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Output stage

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::{is_contained, FileSet};

/// Writes every record below a directory and re-bases it there, so later
/// stages (and a second `dest`) see the written location.
#[derive(Debug)]
pub struct DestStage {
    dir: PathBuf,
}

impl DestStage {
    pub fn new(dir: PathBuf) -> Result<Self, String> {
        if !dir.is_absolute() && !is_contained(&dir) {
            return Err(format!("'{}' leaves the project directory", dir.display()));
        }
        Ok(Self { dir })
    }
}

/// Whether `path` already holds exactly `contents`
async fn unchanged(path: &Path, contents: &[u8]) -> bool {
    match tokio::fs::read(path).await {
        Ok(existing) => blake3::hash(&existing) == blake3::hash(contents),
        Err(_) => false,
    }
}

#[async_trait]
impl Stage for DestStage {
    fn name(&self) -> &'static str {
        "dest"
    }

    async fn apply(&self, mut files: FileSet, ctx: &TaskContext) -> Result<FileSet, StageError> {
        let base = ctx.working_dir.join(&self.dir);

        for file in files.iter_mut() {
            if !is_contained(&file.path) {
                return Err(StageError::Write {
                    path: file.path.clone(),
                    error: "path leaves the output directory".into(),
                });
            }

            let target = base.join(&file.path);
            let shown = ctx.display_path(file);
            let write_error = |e: std::io::Error| StageError::Write {
                path: target.strip_prefix(&ctx.working_dir).unwrap_or(&target).to_path_buf(),
                error: e.to_string(),
            };

            if unchanged(&target, &file.contents).await {
                debug!(from = %shown.display(), to = %target.display(), "output up to date");
            } else {
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
                }
                tokio::fs::write(&target, &file.contents)
                    .await
                    .map_err(write_error)?;
                debug!(from = %shown.display(), to = %target.display(), "wrote output");
            }

            file.base = base.clone();
        }

        Ok(files)
    }
}
