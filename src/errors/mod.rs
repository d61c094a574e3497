// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Error types
//!
//! Stages fail with the narrow [`StageError`]; the runner attaches the task
//! name and converts it into an [`AssetflowError`], which carries miette
//! diagnostics for the CLI.

mod report;

pub use report::FailureReport;

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::files::LintIssue;

/// Result type for assetflow operations
pub type AssetflowResult<T> = Result<T, AssetflowError>;

/// Failure raised by a single stage, before task attribution.
#[derive(Error, Debug, Clone)]
pub enum StageError {
    #[error("{file}: {} lint issue(s)", .issues.len())]
    Lint { file: PathBuf, issues: Vec<LintIssue> },

    #[error("{tool} failed on {file}: {message}")]
    Compile {
        tool: String,
        file: PathBuf,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
        /// Continuation lines of a multi-part message (context, backtrace)
        details: Vec<String>,
    },

    #[error("Failed to write '{path}': {error}")]
    Write { path: PathBuf, error: String },

    #[error("Failed to read '{path}': {error}")]
    Read { path: PathBuf, error: String },

    #[error("'{file}' is not valid UTF-8 text")]
    NotText { file: PathBuf },

    #[error("Could not optimise image '{file}': {message}")]
    Image { file: PathBuf, message: String },

    #[error("Could not run '{tool}': {error}")]
    Tool { tool: String, error: String },

    #[error("Stage worker failed: {message}")]
    Worker { message: String },
}

/// Main error type for assetflow
#[derive(Error, Debug, Diagnostic)]
pub enum AssetflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Task Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Task '{name}' is not defined")]
    #[diagnostic(
        code(assetflow::unknown_task),
        help("Available tasks: {available}")
    )]
    UnknownTask { name: String, available: String },

    #[error("Lint failed in task '{task}': {file} has {count} issue(s)")]
    #[diagnostic(code(assetflow::lint_violation))]
    LintViolation {
        task: String,
        file: PathBuf,
        count: usize,
        issues: Vec<LintIssue>,
        #[help]
        help: Option<String>,
    },

    #[error("Error compiling {tool} in task '{task}': {message}")]
    #[diagnostic(code(assetflow::compile_error))]
    CompileError {
        task: String,
        tool: String,
        file: PathBuf,
        line: Option<usize>,
        message: String,
        details: Vec<String>,
    },

    #[error("Failed to write '{path}' in task '{task}': {error}")]
    #[diagnostic(
        code(assetflow::write_error),
        help("Check that the destination directory is writable")
    )]
    WriteError {
        task: String,
        path: PathBuf,
        error: String,
    },

    #[error("Stage '{stage}' failed in task '{task}': {message}")]
    #[diagnostic(code(assetflow::stage_failed))]
    StageFailed {
        task: String,
        stage: String,
        message: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Build file not found: {path}")]
    #[diagnostic(
        code(assetflow::config_not_found),
        help("Create one with 'assetflow init' or pass --file")
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid build configuration: {reason}")]
    #[diagnostic(code(assetflow::invalid_config))]
    InvalidConfig {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Stage '{stage}' in task '{task}' is invalid: {reason}")]
    #[diagnostic(code(assetflow::invalid_stage))]
    InvalidStage {
        task: String,
        stage: String,
        reason: String,
    },

    #[error("Circular task composition: {}", .tasks.join(" → "))]
    #[diagnostic(
        code(assetflow::circular_dependency),
        help("A sequence or parallel task must not include itself, directly or indirectly")
    )]
    CircularDependency { tasks: Vec<String> },

    #[error("Task '{task}' refers to unknown task '{dependency}'")]
    #[diagnostic(
        code(assetflow::unknown_dependency),
        help("Check that '{dependency}' is defined under 'tasks'")
    )]
    UnknownDependency { task: String, dependency: String },

    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(assetflow::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(assetflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(assetflow::glob_error))]
    GlobPattern { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Watch / Server Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("File watcher error: {message}")]
    #[diagnostic(code(assetflow::watch_error))]
    Watch { message: String },

    #[error("Dev server error: {message}")]
    #[diagnostic(code(assetflow::server_error))]
    Server { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(assetflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(assetflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(assetflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(assetflow::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for AssetflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for AssetflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for AssetflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for AssetflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<glob::PatternError> for AssetflowError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl AssetflowError {
    /// Attribute a stage failure to the task that was running it.
    pub fn from_stage(task: &str, stage: &str, error: StageError) -> Self {
        match error {
            StageError::Lint { file, issues } => {
                let help = issues.first().map(|i| {
                    format!("line {}: {}", i.line, i.message)
                });
                Self::LintViolation {
                    task: task.to_string(),
                    file,
                    count: issues.len(),
                    issues,
                    help,
                }
            }
            StageError::Compile {
                tool,
                file,
                line,
                message,
                details,
                ..
            } => Self::CompileError {
                task: task.to_string(),
                tool,
                file,
                line,
                message,
                details,
            },
            StageError::Write { path, error } => Self::WriteError {
                task: task.to_string(),
                path,
                error,
            },
            other => Self::StageFailed {
                task: task.to_string(),
                stage: stage.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Create a tool not found error with installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        let suggestion = match tool {
            "sass" => "Install Dart Sass: https://sass-lang.com/install/".to_string(),
            _ => format!("Install {} and ensure it's in your PATH", tool),
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion,
        }
    }

    /// Name of the task a failure is attributed to, if any
    pub fn task(&self) -> Option<&str> {
        match self {
            Self::LintViolation { task, .. }
            | Self::CompileError { task, .. }
            | Self::WriteError { task, .. }
            | Self::StageFailed { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Offending file and line, when the failure points at one
    pub fn location(&self) -> Option<(&Path, Option<usize>)> {
        match self {
            Self::LintViolation { file, issues, .. } => {
                Some((file.as_path(), issues.first().map(|i| i.line)))
            }
            Self::CompileError { file, line, .. } => Some((file.as_path(), *line)),
            Self::WriteError { path, .. } => Some((path.as_path(), None)),
            Self::FileReadError { path, .. } => Some((path.as_path(), None)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_keeps_task_and_location() {
        let err = AssetflowError::from_stage(
            "styles",
            "compile",
            StageError::Compile {
                tool: "Sass".into(),
                file: PathBuf::from("css/main.scss"),
                line: Some(3),
                column: Some(10),
                message: "Undefined variable.".into(),
                details: vec![],
            },
        );

        assert_eq!(err.task(), Some("styles"));
        let (file, line) = err.location().unwrap();
        assert_eq!(file, Path::new("css/main.scss"));
        assert_eq!(line, Some(3));
        assert!(err.to_string().contains("task 'styles'"));
    }

    #[test]
    fn test_lint_error_counts_issues() {
        let err = AssetflowError::from_stage(
            "lint-scripts",
            "lint",
            StageError::Lint {
                file: PathBuf::from("a.js"),
                issues: vec![
                    LintIssue::new(1, 5, "eqeqeq", "Expected '===' and instead saw '=='"),
                    LintIssue::new(4, 1, "no_debugger", "Unexpected 'debugger' statement"),
                ],
            },
        );

        match err {
            AssetflowError::LintViolation { count, help, .. } => {
                assert_eq!(count, 2);
                assert!(help.unwrap().starts_with("line 1"));
            }
            other => panic!("Expected LintViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_other_stage_errors_become_stage_failed() {
        let err = AssetflowError::from_stage(
            "images",
            "optimize_images",
            StageError::Image {
                file: PathBuf::from("img/x.png"),
                message: "truncated".into(),
            },
        );

        assert!(matches!(err, AssetflowError::StageFailed { ref stage, .. } if stage == "optimize_images"));
    }
}
