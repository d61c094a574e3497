// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::FileSet;

/// Drops files whose output under `dest` is at least as new as the source.
/// Records without a known modification time always pass.
#[derive(Debug)]
pub struct ChangedStage {
    dest: PathBuf,
    extension: Option<String>,
}

impl ChangedStage {
    pub fn new(dest: PathBuf, extension: Option<String>) -> Self {
        Self {
            dest,
            extension: extension.map(|e| e.trim_start_matches('.').to_string()),
        }
    }
}

#[async_trait]
impl Stage for ChangedStage {
    fn name(&self) -> &'static str {
        "changed"
    }

    async fn apply(&self, files: FileSet, ctx: &TaskContext) -> Result<FileSet, StageError> {
        let mut out = FileSet::default();

        for file in files {
            let Some(source_time) = file.modified else {
                out.push(file);
                continue;
            };

            let mut target = ctx.working_dir.join(&self.dest).join(&file.path);
            if let Some(ext) = &self.extension {
                target.set_extension(ext);
            }

            let target_time = tokio::fs::metadata(&target)
                .await
                .ok()
                .and_then(|m| m.modified().ok());

            match target_time {
                Some(t) if t >= source_time => {
                    debug!(file = %file.relative(), "output is up to date, skipping");
                }
                _ => out.push(file),
            }
        }

        Ok(out)
    }
}
