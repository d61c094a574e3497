// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

use async_trait::async_trait;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::{FileSet, SourcePatterns};

/// Keeps records whose relative path matches the patterns (`!` excludes)
#[derive(Debug)]
pub struct FilterStage {
    patterns: SourcePatterns,
}

impl FilterStage {
    pub fn new(patterns: &[String]) -> Result<Self, String> {
        if patterns.is_empty() {
            return Err("at least one pattern is required".into());
        }
        let patterns = SourcePatterns::new(patterns).map_err(|e| e.to_string())?;
        Ok(Self { patterns })
    }
}

#[async_trait]
impl Stage for FilterStage {
    fn name(&self) -> &'static str {
        "filter"
    }

    async fn apply(&self, files: FileSet, _ctx: &TaskContext) -> Result<FileSet, StageError> {
        Ok(files
            .into_iter()
            .filter(|f| self.patterns.matches(&f.path))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{context, record};

    #[tokio::test]
    async fn test_keeps_matching_records() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context(dir.path());
        let files = FileSet::new(vec![
            record(dir.path(), "app.js", ""),
            record(dir.path(), "app.js.map", ""),
            record(dir.path(), "vendor.js", ""),
        ]);

        let stage = FilterStage::new(&["*.js".to_string(), "!vendor.js".to_string()]).unwrap();
        let out = stage.apply(files, &ctx).await.unwrap();

        let paths: Vec<String> = out.iter().map(|f| f.relative()).collect();
        assert_eq!(paths, vec!["app.js"]);
    }

    #[test]
    fn test_rejects_bad_patterns() {
        assert!(FilterStage::new(&[]).is_err());
        assert!(FilterStage::new(&["[".to_string()]).is_err());
    }
}
