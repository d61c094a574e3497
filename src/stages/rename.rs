// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

use async_trait::async_trait;
use std::path::PathBuf;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::{is_contained, FileSet};

/// Changes record paths: a fixed file name, a suffix before the
/// extension, or a new extension. Directories are kept.
#[derive(Debug)]
pub struct RenameStage {
    file: Option<String>,
    suffix: Option<String>,
    extension: Option<String>,
}

impl RenameStage {
    pub fn new(
        file: Option<String>,
        suffix: Option<String>,
        extension: Option<String>,
    ) -> Result<Self, String> {
        if file.is_none() && suffix.is_none() && extension.is_none() {
            return Err("one of 'file', 'suffix' or 'extension' is required".into());
        }
        if let Some(name) = &file {
            if name.is_empty() || name.contains('/') || !is_contained(&PathBuf::from(name)) {
                return Err(format!("'{}' is not a file name", name));
            }
        }

        Ok(Self {
            file,
            suffix,
            extension: extension.map(|e| e.trim_start_matches('.').to_string()),
        })
    }

    fn rename(&self, path: &mut PathBuf) {
        if let Some(name) = &self.file {
            path.set_file_name(name);
        }

        if let Some(suffix) = &self.suffix {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let name = match path.extension() {
                Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
                None => format!("{}{}", stem, suffix),
            };
            path.set_file_name(name);
        }

        if let Some(extension) = &self.extension {
            path.set_extension(extension);
        }
    }
}

#[async_trait]
impl Stage for RenameStage {
    fn name(&self) -> &'static str {
        "rename"
    }

    async fn apply(&self, mut files: FileSet, _ctx: &TaskContext) -> Result<FileSet, StageError> {
        for file in files.iter_mut() {
            self.rename(&mut file.path);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{context, record};

    fn renamed(stage: &RenameStage, path: &str) -> PathBuf {
        let mut path = PathBuf::from(path);
        stage.rename(&mut path);
        path
    }

    #[test]
    fn test_rename_modes() {
        let file = RenameStage::new(Some("app.min.js".into()), None, None).unwrap();
        assert_eq!(renamed(&file, "app.js"), PathBuf::from("app.min.js"));

        let suffix = RenameStage::new(None, Some(".min".into()), None).unwrap();
        assert_eq!(renamed(&suffix, "plugins/slider.js"), PathBuf::from("plugins/slider.min.js"));
        assert_eq!(renamed(&suffix, "LICENSE"), PathBuf::from("LICENSE.min"));

        let ext = RenameStage::new(None, None, Some(".css".into())).unwrap();
        assert_eq!(renamed(&ext, "main.scss"), PathBuf::from("main.css"));
    }

    #[test]
    fn test_requires_an_option() {
        assert!(RenameStage::new(None, None, None).is_err());
        assert!(RenameStage::new(Some("../x.js".into()), None, None).is_err());
    }

    #[tokio::test]
    async fn test_apply_keeps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path());
        let files = FileSet::new(vec![record(dir.path(), "app.css", "a{}")]);

        let out = RenameStage::new(None, Some(".min".into()), None)
            .unwrap()
            .apply(files, &ctx)
            .await
            .unwrap();
        assert_eq!(out.get("app.min.css").unwrap().text().unwrap(), "a{}");
    }
}
