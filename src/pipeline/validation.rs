// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Build file validation
//!
//! Checks a build file before anything runs: task references, glob syntax,
//! stage settings, server settings and compiler availability.

use std::path::Path;

use crate::banner::BannerTemplate;
use crate::errors::AssetflowError;
use crate::files::SourcePatterns;
use crate::pipeline::{BuildFile, PipelineTask, StageSpec, TaskGraph};
use crate::stages;

/// Build file validator
pub struct BuildValidator;

impl BuildValidator {
    /// Validate a build file whose relative paths start at `working_dir`
    pub fn validate(build: &BuildFile, working_dir: &Path) -> ValidationResult {
        let mut result = ValidationResult::new();

        if build.tasks.is_empty() {
            result.add_error("Build file defines no tasks");
        }

        match TaskGraph::build(build) {
            Ok(_) => {}
            Err(AssetflowError::CircularDependency { tasks }) => {
                result.add_error(&format!("Circular task composition: {}", tasks.join(" → ")));
            }
            Err(AssetflowError::UnknownDependency { task, dependency }) => {
                result.add_error(&format!(
                    "Task '{}' refers to unknown task '{}'",
                    task, dependency
                ));
            }
            Err(e) => result.add_error(&e.to_string()),
        }

        if let Some(banner) = &build.banner {
            if let Err(e) = BannerTemplate::parse(banner) {
                result.add_error(&format!("Build file banner: {}", e));
            }
        }

        if !build.tasks.contains_key("default") {
            result.add_warning(
                "No 'default' task: 'assetflow run' and 'assetflow watch' need a task name",
            );
        }

        for (name, task) in &build.tasks {
            if task.kind() != "pipeline" && task.members().is_empty() {
                result.add_warning(&format!("Task '{}': {} has no members", name, task.kind()));
            }
        }

        for (name, task) in build.pipeline_tasks() {
            Self::validate_pipeline(name, task, working_dir, &mut result);
        }

        Self::validate_server(build, &mut result);

        result
    }

    fn validate_pipeline(name: &str, task: &PipelineTask, working_dir: &Path, result: &mut ValidationResult) {
        if task.src.is_empty() {
            result.add_error(&format!("Task '{}': 'src' is empty", name));
        } else if let Err(e) = SourcePatterns::new(&task.src.to_vec()) {
            result.add_error(&format!("Task '{}': {}", name, e));
        }

        if let Some(watch) = &task.watch {
            if let Err(e) = SourcePatterns::new(&watch.to_vec()) {
                result.add_error(&format!("Task '{}': watch patterns: {}", name, e));
            }
        }

        for spec in &task.stages {
            if let Err(e) = stages::build(spec, name, working_dir) {
                result.add_error(&e.to_string());
            }

            if let StageSpec::Compile(compile) = spec {
                if which::which(&compile.command).is_err() {
                    result.add_warning(&format!(
                        "Task '{}': compiler '{}' was not found on PATH",
                        name, compile.command
                    ));
                }
            }
        }

        if task.stages.is_empty() {
            result.add_warning(&format!("Task '{}': no stages, files are only read", name));
        }

        // Rewrites after the map is written leave it pointing at stale positions
        if let Some(pos) = task
            .stages
            .iter()
            .position(|s| matches!(s, StageSpec::Sourcemaps { .. }))
        {
            let rewrites = task.stages[pos + 1..].iter().find(|s| {
                matches!(
                    s,
                    StageSpec::Minify { .. }
                        | StageSpec::Banner { .. }
                        | StageSpec::Concat { .. }
                        | StageSpec::Compile(_)
                        | StageSpec::Autoprefix { .. }
                )
            });
            if let Some(stage) = rewrites {
                result.add_warning(&format!(
                    "Task '{}': '{}' runs after 'sourcemaps', its changes are not mapped",
                    name,
                    stage.name()
                ));
            }
        }
    }

    fn validate_server(build: &BuildFile, result: &mut ValidationResult) {
        let Some(server) = &build.server else {
            let reloads = build
                .pipeline_tasks()
                .any(|(_, t)| t.stages.iter().any(|s| matches!(s, StageSpec::Reload)));
            if reloads {
                result.add_warning(
                    "'reload' stages are used but no 'server' is configured; browsers will not be told",
                );
            }
            return;
        };

        match (&server.proxy, &server.root) {
            (Some(_), Some(_)) => {
                result.add_error("Server: set either 'proxy' or 'root', not both");
            }
            (None, None) => {
                result.add_error("Server: one of 'proxy' or 'root' is required");
            }
            (Some(proxy), None) => {
                if !(proxy.starts_with("http://") || proxy.starts_with("https://")) {
                    result.add_error(&format!(
                        "Server: proxy '{}' must start with http:// or https://",
                        proxy
                    ));
                }
            }
            (None, Some(_)) => {}
        }
    }
}

/// Result of build file validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
