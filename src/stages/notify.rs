// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

use async_trait::async_trait;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::FileSet;
use crate::notifier::Level;

/// Sends one notification per file
///
/// `{file}` expands to the path relative to the working directory and
/// `{count}` to the number of lint issues recorded on the file.
#[derive(Debug)]
pub struct NotifyStage {
    message: String,
    issues_message: Option<String>,
}

impl NotifyStage {
    pub fn new(message: String, issues_message: Option<String>) -> Self {
        Self {
            message,
            issues_message,
        }
    }
}

#[async_trait]
impl Stage for NotifyStage {
    fn name(&self) -> &'static str {
        "notify"
    }

    async fn apply(&self, files: FileSet, ctx: &TaskContext) -> Result<FileSet, StageError> {
        for file in files.iter() {
            let shown = ctx.display_path(file);
            let (template, level) = match &self.issues_message {
                Some(issues) if !file.lint.is_empty() => (issues, Level::Warning),
                _ => (&self.message, Level::Success),
            };

            let message = template
                .replace("{file}", &shown.to_string_lossy().replace('\\', "/"))
                .replace("{count}", &file.lint.len().to_string());
            ctx.notify_at(level, message, &shown, None);
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::LintIssue;
    use crate::stages::test_support::{context, record};

    #[tokio::test]
    async fn test_message_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, notifier) = context(dir.path());
        let base = dir.path().join("js/src");
        let mut dirty = record(&base, "b.js", "");
        dirty.lint.push(LintIssue::new(1, 1, "eqeqeq", "x"));
        let files = FileSet::new(vec![record(&base, "a.js", ""), dirty]);

        let stage = NotifyStage::new(
            "Linted {file}".into(),
            Some("{count} issue(s) in {file}".into()),
        );
        let out = stage.apply(files, &ctx).await.unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(
            notifier.messages(),
            vec!["Linted js/src/a.js", "1 issue(s) in js/src/b.js"]
        );
        assert_eq!(notifier.at_level(Level::Warning).len(), 1);
        assert_eq!(notifier.at_level(Level::Success).len(), 1);
    }
}
