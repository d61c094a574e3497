// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

use async_trait::async_trait;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::FileSet;
use crate::reload::{ReloadEvent, ReloadKind};

/// Signals the reloader once per file
#[derive(Debug, Default, Clone, Copy)]
pub struct ReloadStage;

#[async_trait]
impl Stage for ReloadStage {
    fn name(&self) -> &'static str {
        "reload"
    }

    async fn apply(&self, files: FileSet, ctx: &TaskContext) -> Result<FileSet, StageError> {
        for file in files.iter() {
            let path = ctx.display_path(file).to_string_lossy().replace('\\', "/");
            ctx.reloader.reload(ReloadEvent {
                kind: ReloadKind::for_path(&path),
                path,
            });
        }
        Ok(files)
    }
}
