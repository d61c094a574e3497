// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

use async_trait::async_trait;
use lightningcss::targets::Browsers;
use std::collections::BTreeMap;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::FileSet;
use crate::minify::{css, CssOptions};

/// Adds vendor prefixes to `.css` files for the configured browsers
#[derive(Debug)]
pub struct AutoprefixStage {
    browsers: Browsers,
}

impl AutoprefixStage {
    pub fn new(browsers: &BTreeMap<String, String>) -> Result<Self, String> {
        if browsers.is_empty() {
            return Err("at least one browser is required".into());
        }
        Ok(Self {
            browsers: css::parse_browsers(browsers)?,
        })
    }
}

#[async_trait]
impl Stage for AutoprefixStage {
    fn name(&self) -> &'static str {
        "autoprefix"
    }

    async fn apply(&self, mut files: FileSet, ctx: &TaskContext) -> Result<FileSet, StageError> {
        let options = CssOptions {
            browsers: Some(self.browsers),
            minify: false,
            keep_special_comments: true,
        };

        for file in files.iter_mut() {
            if file.extension().as_deref() != Some("css") {
                continue;
            }

            let processed = css::process(file.text()?, &file.relative(), &options).map_err(|e| {
                StageError::Compile {
                    tool: "autoprefixer".into(),
                    file: ctx.display_path(file),
                    line: e.line,
                    column: e.column,
                    message: e.message,
                    details: vec![],
                }
            })?;
            if let Some(track) = file.source_map.as_mut() {
                track.remap(&processed.positions);
            }
            file.set_text(processed.code);
        }

        Ok(files)
    }
}
