// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Lint stage

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::{FileSet, LintIssue};
use crate::minify::js::mask_non_code;
use crate::notifier::Level;
use crate::pipeline::{LintRules, LintSpec};

/// Rules with defaults applied
#[derive(Debug)]
struct Rules {
    max_line_length: Option<usize>,
    trailing_whitespace: bool,
    eqeqeq: bool,
    no_debugger: bool,
    no_console: bool,
    forbid: Vec<(Regex, String)>,
}

/// Checks files against a small rule set
#[derive(Debug)]
pub struct LintStage {
    rules: Rules,
    gate: bool,
    debugger: Regex,
    console: Regex,
}

impl LintStage {
    pub fn new(spec: &LintSpec, working_dir: &Path) -> Result<Self, String> {
        let file_rules = match &spec.config {
            Some(path) => {
                let full = working_dir.join(path);
                let text = std::fs::read_to_string(&full)
                    .map_err(|e| format!("cannot read rules file '{}': {}", path.display(), e))?;
                serde_json::from_str::<LintRules>(&text)
                    .map_err(|e| format!("invalid rules file '{}': {}", path.display(), e))?
            }
            None => LintRules::default(),
        };

        let inline = &spec.rules;
        let mut forbid = Vec::new();
        for rule in file_rules.forbid.iter().chain(&inline.forbid) {
            let regex = Regex::new(&rule.pattern)
                .map_err(|e| format!("invalid forbid pattern '{}': {}", rule.pattern, e))?;
            forbid.push((regex, rule.message.clone()));
        }

        let rules = Rules {
            max_line_length: inline.max_line_length.or(file_rules.max_line_length),
            trailing_whitespace: inline
                .trailing_whitespace
                .or(file_rules.trailing_whitespace)
                .unwrap_or(false),
            eqeqeq: inline.eqeqeq.or(file_rules.eqeqeq).unwrap_or(true),
            no_debugger: inline.no_debugger.or(file_rules.no_debugger).unwrap_or(true),
            no_console: inline.no_console.or(file_rules.no_console).unwrap_or(false),
            forbid,
        };

        Ok(Self {
            rules,
            gate: spec.gate,
            debugger: Regex::new(r"\bdebugger\b").map_err(|e| e.to_string())?,
            console: Regex::new(r"\bconsole\s*\.").map_err(|e| e.to_string())?,
        })
    }

    /// Issues in one file. Code-level rules skip strings and comments in scripts.
    pub fn check(&self, text: &str, is_script: bool) -> Vec<LintIssue> {
        let mut issues = Vec::new();
        let masked = if is_script {
            mask_non_code(text)
        } else {
            text.to_string()
        };

        for (idx, (raw, code)) in text.split('\n').zip(masked.split('\n')).enumerate() {
            let line = idx + 1;
            let raw = raw.strip_suffix('\r').unwrap_or(raw);

            if let Some(max) = self.rules.max_line_length {
                let len = raw.chars().count();
                if len > max {
                    issues.push(LintIssue::new(
                        line,
                        max + 1,
                        "max_line_length",
                        format!("Line is too long ({} > {}).", len, max),
                    ));
                }
            }

            if self.rules.trailing_whitespace {
                let trimmed = raw.trim_end_matches(|c: char| c == ' ' || c == '\t');
                if trimmed.len() != raw.len() {
                    issues.push(LintIssue::new(
                        line,
                        trimmed.chars().count() + 1,
                        "trailing_whitespace",
                        "Trailing whitespace.",
                    ));
                }
            }

            if self.rules.eqeqeq {
                for (column, op) in loose_equality(code) {
                    issues.push(LintIssue::new(
                        line,
                        column,
                        "eqeqeq",
                        format!("Expected '{}=' and instead saw '{}'.", op, op),
                    ));
                }
            }

            if self.rules.no_debugger {
                if let Some(m) = self.debugger.find(code) {
                    issues.push(LintIssue::new(
                        line,
                        m.start() + 1,
                        "no_debugger",
                        "Forbidden 'debugger' statement.",
                    ));
                }
            }

            if self.rules.no_console {
                if let Some(m) = self.console.find(code) {
                    issues.push(LintIssue::new(
                        line,
                        m.start() + 1,
                        "no_console",
                        "Unexpected 'console' call.",
                    ));
                }
            }

            for (pattern, message) in &self.rules.forbid {
                if let Some(m) = pattern.find(raw) {
                    issues.push(LintIssue::new(line, m.start() + 1, "forbid", message.clone()));
                }
            }
        }

        issues
    }
}

/// 1-based columns of `==` and `!=` that are not part of `===`, `!==`,
/// `<=` or `>=`
fn loose_equality(code: &str) -> Vec<(usize, &'static str)> {
    let bytes = code.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        let op = match (bytes[i], bytes[i + 1]) {
            (b'=', b'=') => Some("=="),
            (b'!', b'=') => Some("!="),
            _ => None,
        };

        if let Some(op) = op {
            let strict = bytes.get(i + 2) == Some(&b'=');
            let joined = i > 0 && matches!(bytes[i - 1], b'=' | b'!' | b'<' | b'>');
            if strict || joined {
                i += if strict { 3 } else { 2 };
                continue;
            }
            found.push((i + 1, op));
            i += 2;
            continue;
        }
        i += 1;
    }

    found
}

#[async_trait]
impl Stage for LintStage {
    fn name(&self) -> &'static str {
        "lint"
    }

    async fn apply(&self, mut files: FileSet, ctx: &TaskContext) -> Result<FileSet, StageError> {
        let mut first_failure = None;

        for file in files.iter_mut() {
            let is_script = matches!(file.extension().as_deref(), Some("js" | "mjs" | "cjs"));
            let issues = self.check(file.text()?, is_script);
            let shown = ctx.display_path(file);

            for issue in &issues {
                ctx.notify_at(
                    Level::Warning,
                    format!(
                        "{}: line {}, col {}, {}",
                        shown.display(),
                        issue.line,
                        issue.column,
                        issue.message
                    ),
                    &shown,
                    Some(issue.line),
                );
            }

            if !issues.is_empty() && first_failure.is_none() {
                first_failure = Some((shown, issues.clone()));
            }
            file.lint = issues;
        }

        match first_failure {
            Some((file, issues)) if self.gate => Err(StageError::Lint { file, issues }),
            _ => Ok(files),
        }
    }
}
