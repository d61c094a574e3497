// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! External compiler stage
//!
//! Runs a command once per file with the contents on stdin and takes the
//! compiled result from stdout, e.g. `sass --stdin`.

use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::FileSet;
use crate::pipeline::CompileSpec;

/// Continuation lines kept from a compiler's error output
const MAX_DETAIL_LINES: usize = 8;

pub struct CompileStage {
    spec: CompileSpec,
    line_col: Regex,
    pair: Regex,
}

impl CompileStage {
    pub fn new(spec: CompileSpec) -> Result<Self, String> {
        if spec.command.trim().is_empty() {
            return Err("command is empty".into());
        }

        Ok(Self {
            spec,
            line_col: Regex::new(r"(?i)\bline:?\s+(\d+)(?:,?\s+col(?:umn)?:?\s+(\d+))?")
                .map_err(|e| e.to_string())?,
            pair: Regex::new(r"(?:^|\s)(\d+):(\d+)(?:\s|$)").map_err(|e| e.to_string())?,
        })
    }

    /// Whether the executable can be found on PATH
    pub fn is_available(&self) -> bool {
        which::which(&self.spec.command).is_ok()
    }

    /// First line, location and continuation lines of compiler output
    fn parse_failure(&self, stderr: &str) -> (String, Option<usize>, Option<usize>, Vec<String>) {
        let lines: Vec<&str> = stderr
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect();

        let message = lines
            .first()
            .map(|l| l.trim().trim_start_matches("Error:").trim().to_string())
            .unwrap_or_else(|| "compiler exited with an error".to_string());

        let mut line = None;
        let mut column = None;
        for text in &lines {
            if let Some(caps) = self.line_col.captures(text) {
                line = caps.get(1).and_then(|m| m.as_str().parse().ok());
                column = caps.get(2).and_then(|m| m.as_str().parse().ok());
                break;
            }
            if let Some(caps) = self.pair.captures(text) {
                line = caps.get(1).and_then(|m| m.as_str().parse().ok());
                column = caps.get(2).and_then(|m| m.as_str().parse().ok());
                break;
            }
        }

        let details = lines
            .iter()
            .skip(1)
            .take(MAX_DETAIL_LINES)
            .map(|l| l.to_string())
            .collect();

        (message, line, column, details)
    }
}

#[async_trait]
impl Stage for CompileStage {
    fn name(&self) -> &'static str {
        "compile"
    }

    async fn apply(&self, files: FileSet, ctx: &TaskContext) -> Result<FileSet, StageError> {
        let tool = self.spec.tool_label().to_string();
        let mut out = FileSet::default();

        for mut file in files {
            if self.spec.skip_partials && file.file_name().starts_with('_') {
                debug!(file = %file.relative(), "skipping partial");
                continue;
            }

            let absolute = file.absolute_path();
            let dir = absolute
                .parent()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();
            let args: Vec<String> = self
                .spec
                .args
                .iter()
                .map(|a| {
                    a.replace("{file}", &absolute.to_string_lossy())
                        .replace("{dir}", &dir)
                })
                .collect();

            let mut child = Command::new(&self.spec.command)
                .args(&args)
                .current_dir(&ctx.working_dir)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| StageError::Tool {
                    tool: tool.clone(),
                    error: e.to_string(),
                })?;

            // Write on a separate task so a full stdout pipe cannot block us
            let writer = child.stdin.take().map(|mut stdin| {
                let input = file.contents.clone();
                tokio::spawn(async move { stdin.write_all(&input).await })
            });

            let output = child.wait_with_output().await.map_err(|e| StageError::Tool {
                tool: tool.clone(),
                error: e.to_string(),
            })?;
            if let Some(writer) = writer {
                match writer.await {
                    Ok(Ok(())) => {}
                    // Usually a compiler that exited before reading all input
                    Ok(Err(e)) => {
                        debug!(tool = %tool, file = %file.relative(), error = %e, "stdin write failed");
                    }
                    Err(e) => debug!(tool = %tool, error = %e, "stdin writer task failed"),
                }
            }

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let (message, line, column, details) = self.parse_failure(&stderr);
                return Err(StageError::Compile {
                    tool,
                    file: ctx.display_path(&file),
                    line,
                    column,
                    message,
                    details,
                });
            }

            file.contents = output.stdout;
            file.path.set_extension(&self.spec.extension);
            if let Some(track) = file.source_map.as_mut() {
                track.collapse(&String::from_utf8_lossy(&file.contents));
            }
            out.push(file);
        }

        Ok(out)
    }
}
