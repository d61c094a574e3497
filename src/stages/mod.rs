// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Pipeline stages
//!
//! Every stage takes the file set produced by the previous one and returns a
//! new one. Stages are built once from their [`StageSpec`] when the runner is
//! created and are shared by every execution of their task.

mod autoprefix;
mod banner;
mod changed;
mod compile;
mod concat;
mod dest;
mod filter;
mod lint;
mod minify;
mod notify;
mod optimize_images;
mod reload;
mod rename;
mod sourcemaps;

pub use autoprefix::AutoprefixStage;
pub use banner::BannerStage;
pub use changed::ChangedStage;
pub use compile::CompileStage;
pub use concat::ConcatStage;
pub use dest::DestStage;
pub use filter::FilterStage;
pub use lint::LintStage;
pub use minify::MinifyStage;
pub use notify::NotifyStage;
pub use optimize_images::OptimizeImagesStage;
pub use reload::ReloadStage;
pub use rename::RenameStage;
pub use sourcemaps::SourcemapsStage;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::banner::{BannerTemplate, BannerVars};
use crate::errors::{AssetflowError, StageError};
use crate::files::{relative_to, FileRecord, FileSet};
use crate::notifier::{Level, Notification, Notifier};
use crate::pipeline::StageSpec;
use crate::reload::Reloader;

/// Per-execution values shared by the stages of one task run
#[derive(Clone)]
pub struct TaskContext {
    /// Task being executed; every failure is attributed to it
    pub task: String,
    /// Directory task paths are relative to
    pub working_dir: PathBuf,
    /// Banner values, rendered once per execution
    pub banner: BannerVars,
    /// Template for `banner` stages without their own
    pub default_banner: BannerTemplate,
    pub notifier: Arc<dyn Notifier>,
    pub reloader: Arc<dyn Reloader>,
}

impl TaskContext {
    /// Send a notification tagged with the task name
    pub fn notify(&self, level: Level, message: impl Into<String>) {
        self.notifier
            .notify(Notification::new(&self.task, level, message));
    }

    /// Send a notification pointing at a file
    pub fn notify_at(&self, level: Level, message: impl Into<String>, file: &Path, line: Option<usize>) {
        self.notifier
            .notify(Notification::new(&self.task, level, message).at(file, line));
    }

    /// Path of a record relative to the working directory, for messages
    pub fn display_path(&self, file: &FileRecord) -> PathBuf {
        relative_to(&file.absolute_path(), &self.working_dir)
    }
}

/// A transform from one file set to the next
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage type name, as written in build files
    fn name(&self) -> &'static str;

    /// Transform the files
    async fn apply(&self, files: FileSet, ctx: &TaskContext) -> Result<FileSet, StageError>;
}

/// Instantiate a stage from its configuration
pub fn build(spec: &StageSpec, task: &str, working_dir: &Path) -> Result<Box<dyn Stage>, AssetflowError> {
    let invalid = |reason: String| AssetflowError::InvalidStage {
        task: task.to_string(),
        stage: spec.name().to_string(),
        reason,
    };

    let stage: Box<dyn Stage> = match spec {
        StageSpec::Lint(lint) => Box::new(LintStage::new(lint, working_dir).map_err(invalid)?),
        StageSpec::Compile(compile) => Box::new(CompileStage::new(compile.clone()).map_err(invalid)?),
        StageSpec::Autoprefix { browsers } => {
            Box::new(AutoprefixStage::new(browsers).map_err(invalid)?)
        }
        StageSpec::Concat { file, separator } => {
            Box::new(ConcatStage::new(file, separator).map_err(invalid)?)
        }
        StageSpec::Minify {
            keep_special_comments,
        } => Box::new(MinifyStage::new(*keep_special_comments)),
        StageSpec::OptimizeImages { jpeg_quality } => {
            Box::new(OptimizeImagesStage::new(*jpeg_quality).map_err(invalid)?)
        }
        StageSpec::Changed { dest, extension } => {
            Box::new(ChangedStage::new(dest.clone(), extension.clone()))
        }
        StageSpec::Banner { template } => Box::new(BannerStage::new(template.as_deref()).map_err(
            |e| match e {
                AssetflowError::InvalidConfig { reason, .. } => invalid(reason),
                other => other,
            },
        )?),
        StageSpec::Sourcemaps {
            dir,
            include_content,
            source_root,
        } => Box::new(
            SourcemapsStage::new(dir, *include_content, source_root.clone()).map_err(invalid)?,
        ),
        StageSpec::Rename {
            file,
            suffix,
            extension,
        } => Box::new(
            RenameStage::new(file.clone(), suffix.clone(), extension.clone()).map_err(invalid)?,
        ),
        StageSpec::Dest { dir } => Box::new(DestStage::new(dir.clone()).map_err(invalid)?),
        StageSpec::Filter { patterns } => Box::new(FilterStage::new(patterns).map_err(invalid)?),
        StageSpec::Notify {
            message,
            issues_message,
        } => Box::new(NotifyStage::new(message.clone(), issues_message.clone())),
        StageSpec::Reload => Box::new(ReloadStage),
    };

    Ok(stage)
}
