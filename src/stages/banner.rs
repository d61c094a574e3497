// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

use async_trait::async_trait;

use super::{Stage, TaskContext};
use crate::banner::BannerTemplate;
use crate::errors::{AssetflowError, StageError};
use crate::files::FileSet;

/// Prepends a rendered banner to every file
#[derive(Debug)]
pub struct BannerStage {
    template: Option<BannerTemplate>,
}

impl BannerStage {
    /// `None` uses the build file's banner
    pub fn new(template: Option<&str>) -> Result<Self, AssetflowError> {
        Ok(Self {
            template: template.map(BannerTemplate::parse).transpose()?,
        })
    }
}

#[async_trait]
impl Stage for BannerStage {
    fn name(&self) -> &'static str {
        "banner"
    }

    async fn apply(&self, mut files: FileSet, ctx: &TaskContext) -> Result<FileSet, StageError> {
        let template = self.template.as_ref().unwrap_or(&ctx.default_banner);
        let banner = template.render(&ctx.banner);

        for file in files.iter_mut() {
            let text = format!("{}{}", banner, file.text()?);
            file.set_text(text);
            if let Some(track) = file.source_map.as_mut() {
                track.shift_for_prefix(&banner);
            }
        }

        Ok(files)
    }
}
