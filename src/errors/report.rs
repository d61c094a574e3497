// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Failure reports for the notification channel
//!
//! Turns an [`AssetflowError`] into the multi-line text a developer sees when
//! a stage fails: task, file, line and the tool's own message.

use super::AssetflowError;

/// Human-readable description of a failed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Task the failure is attributed to
    pub task: Option<String>,
    /// Rendered message
    pub message: String,
}

impl FailureReport {
    /// Build a report from an error
    pub fn from_error(error: &AssetflowError) -> Self {
        let message = match error {
            AssetflowError::CompileError {
                task,
                tool,
                file,
                line,
                message,
                details,
            } => {
                let mut out = format!(
                    "Error compiling {} in task '{}'.\n\t   File: {}\n\t   Line: {}\n\t   Message: {}",
                    tool,
                    task,
                    file.display(),
                    line.map(|l| l.to_string()).unwrap_or_else(|| "?".into()),
                    message
                );

                // The second part is kept as-is, anything after it is a trace
                if let Some(second) = details.first() {
                    out.push_str("\n\t   ");
                    out.push_str(second);
                }
                for extra in details.iter().skip(1) {
                    out.push_str("\n\t\t");
                    out.push_str(extra.trim());
                }

                out
            }
            AssetflowError::LintViolation {
                task,
                file,
                issues,
                ..
            } => {
                let mut out = format!(
                    "Lint failed in task '{}': {} ({} error{}).",
                    task,
                    file.display(),
                    issues.len(),
                    if issues.len() == 1 { "" } else { "s" }
                );
                for issue in issues {
                    out.push_str(&format!(
                        "\n\t   line {} col {}  {} ({})",
                        issue.line, issue.column, issue.message, issue.rule
                    ));
                }
                out
            }
            other => match other.task() {
                Some(task) if !other.to_string().contains(task) => {
                    format!("Task '{}' failed: {}", task, other)
                }
                _ => other.to_string(),
            },
        };

        Self {
            task: error.task().map(String::from),
            message,
        }
    }
}

impl std::fmt::Display for FailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_compile_report_layout() {
        let err = AssetflowError::CompileError {
            task: "styles".into(),
            tool: "Sass".into(),
            file: PathBuf::from("css/main.scss"),
            line: Some(12),
            message: "Undefined mixin.".into(),
            details: vec![
                "on line 12 of css/main.scss".into(),
                "   from line 3 of css/_mixins.scss  ".into(),
            ],
        };

        let report = FailureReport::from_error(&err);
        assert_eq!(report.task.as_deref(), Some("styles"));
        assert_eq!(
            report.message,
            "Error compiling Sass in task 'styles'.\n\
             \t   File: css/main.scss\n\
             \t   Line: 12\n\
             \t   Message: Undefined mixin.\n\
             \t   on line 12 of css/main.scss\n\
             \t\tfrom line 3 of css/_mixins.scss"
        );
    }

    #[test]
    fn test_unknown_line_is_marked() {
        let err = AssetflowError::CompileError {
            task: "styles".into(),
            tool: "Sass".into(),
            file: PathBuf::from("css/main.scss"),
            line: None,
            message: "boom".into(),
            details: vec![],
        };

        assert!(FailureReport::from_error(&err).message.contains("Line: ?"));
    }

    #[test]
    fn test_generic_error_mentions_task() {
        let err = AssetflowError::StageFailed {
            task: "images".into(),
            stage: "optimize_images".into(),
            message: "truncated".into(),
        };

        let report = FailureReport::from_error(&err);
        assert!(report.message.contains("images"));
        assert!(report.message.contains("truncated"));
    }
}
