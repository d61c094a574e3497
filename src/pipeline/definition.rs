// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Build file structures
//!
//! Defines the schema for `assetflow.yaml` (or `.toml`) files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::AssetflowError;
use crate::watch::OverlapPolicy;

/// Build file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildFile {
    /// Schema version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Project name, shown in listings
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Package manifest supplying banner fields
    #[serde(default = "default_package")]
    pub package: PathBuf,

    /// Banner template used by `banner` stages without their own
    #[serde(default)]
    pub banner: Option<String>,

    /// Tasks by name
    pub tasks: BTreeMap<String, TaskDef>,

    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Dev server settings for `watch --serve`
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

fn default_version() -> String {
    "1".to_string()
}

fn default_package() -> PathBuf {
    PathBuf::from("package.json")
}

impl BuildFile {
    /// Load a build file; `.toml` files are parsed as TOML, anything else as YAML
    pub fn from_file(path: &Path) -> Result<Self, AssetflowError> {
        if !path.exists() {
            return Err(AssetflowError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| AssetflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, AssetflowError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Parse from a TOML string
    pub fn from_toml(text: &str) -> Result<Self, AssetflowError> {
        toml::from_str(text).map_err(Into::into)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, AssetflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a task by name
    pub fn task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name)
    }

    /// All task names, sorted
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    /// Tasks that read files (as opposed to composites)
    pub fn pipeline_tasks(&self) -> impl Iterator<Item = (&str, &PipelineTask)> {
        self.tasks.iter().filter_map(|(name, task)| match task {
            TaskDef::Pipeline(p) => Some((name.as_str(), p)),
            _ => None,
        })
    }

    /// Comma-separated names, for "unknown task" help
    pub fn available(&self) -> String {
        self.task_names().join(", ")
    }
}

/// A task: a pipeline over files, or a composition of other tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskDef {
    /// Run tasks one after another, stopping at the first failure
    Sequence {
        sequence: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },

    /// Run tasks concurrently and wait for all of them
    Parallel {
        parallel: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },

    /// Read files and pass them through stages
    Pipeline(PipelineTask),
}

impl TaskDef {
    /// `pipeline`, `sequence` or `parallel`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sequence { .. } => "sequence",
            Self::Parallel { .. } => "parallel",
            Self::Pipeline(_) => "pipeline",
        }
    }

    /// Tasks referenced by a composite
    pub fn members(&self) -> &[String] {
        match self {
            Self::Sequence { sequence, .. } => sequence,
            Self::Parallel { parallel, .. } => parallel,
            Self::Pipeline(_) => &[],
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Sequence { description, .. } | Self::Parallel { description, .. } => {
                description.as_deref()
            }
            Self::Pipeline(p) => p.description.as_deref(),
        }
    }
}

/// Glob-selected files flowing through stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTask {
    /// Source globs; `!` excludes
    pub src: Patterns,

    /// Globs that re-run the task in watch mode (defaults to `src`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch: Option<Patterns>,

    /// Stages in execution order
    #[serde(default)]
    pub stages: Vec<StageSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PipelineTask {
    /// Patterns that trigger the task in watch mode
    pub fn trigger_patterns(&self) -> Vec<String> {
        self.watch.as_ref().unwrap_or(&self.src).to_vec()
    }

    /// Whether source positions need tracking
    pub fn has_sourcemaps(&self) -> bool {
        self.stages
            .iter()
            .any(|s| matches!(s, StageSpec::Sourcemaps { .. }))
    }
}

/// One glob or a list of globs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Patterns {
    Single(String),
    Multiple(Vec<String>),
}

impl Patterns {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Single(s) => vec![s.clone()],
            Self::Multiple(v) => v.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(s) => s.is_empty(),
            Self::Multiple(v) => v.is_empty() || v.iter().all(String::is_empty),
        }
    }
}

/// Stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageSpec {
    /// Check files against lint rules
    Lint(LintSpec),

    /// Run an external compiler per file (stdin → stdout)
    Compile(CompileSpec),

    /// Add vendor prefixes for the given browsers
    Autoprefix {
        /// Browser name → minimum version, e.g. `safari: "5"`
        browsers: BTreeMap<String, String>,
    },

    /// Merge all files into one
    Concat {
        file: String,
        #[serde(default = "default_separator")]
        separator: String,
    },

    /// Minify `.js` and `.css` files
    Minify {
        /// Keep `/*! ... */` comments
        #[serde(default)]
        keep_special_comments: bool,
    },

    /// Recompress PNG and JPEG images
    OptimizeImages {
        #[serde(default = "default_jpeg_quality")]
        jpeg_quality: u8,
    },

    /// Drop files whose output is already up to date
    Changed {
        dest: PathBuf,
        /// Extension of the output file, when it differs
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extension: Option<String>,
    },

    /// Prepend a banner comment
    Banner {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
    },

    /// Write source maps for tracked files
    Sourcemaps {
        /// Map directory relative to each file, `.` for siblings
        #[serde(default = "default_map_dir")]
        dir: String,
        #[serde(default)]
        include_content: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_root: Option<String>,
    },

    /// Change file paths
    Rename {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suffix: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extension: Option<String>,
    },

    /// Write files below a directory
    Dest { dir: PathBuf },

    /// Keep only files matching any pattern
    Filter { patterns: Vec<String> },

    /// Tell the developer about each file
    Notify {
        /// `{file}` and `{count}` are replaced
        message: String,
        /// Used instead of `message` for files with lint issues
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issues_message: Option<String>,
    },

    /// Signal connected browsers
    Reload,
}

fn default_separator() -> String {
    "\n".to_string()
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_map_dir() -> String {
    ".".to_string()
}

impl StageSpec {
    /// Stage type name as written in build files
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lint(_) => "lint",
            Self::Compile(_) => "compile",
            Self::Autoprefix { .. } => "autoprefix",
            Self::Concat { .. } => "concat",
            Self::Minify { .. } => "minify",
            Self::OptimizeImages { .. } => "optimize_images",
            Self::Changed { .. } => "changed",
            Self::Banner { .. } => "banner",
            Self::Sourcemaps { .. } => "sourcemaps",
            Self::Rename { .. } => "rename",
            Self::Dest { .. } => "dest",
            Self::Filter { .. } => "filter",
            Self::Notify { .. } => "notify",
            Self::Reload => "reload",
        }
    }
}

/// Lint stage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintSpec {
    /// JSON rules file, overridden by inline rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,

    #[serde(default)]
    pub rules: LintRules,

    /// Fail the task when issues are found
    #[serde(default = "default_true")]
    pub gate: bool,
}

/// Lint rules; unset rules fall back to the rules file, then to defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_line_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_whitespace: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eqeqeq: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_debugger: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_console: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbid: Vec<ForbidRule>,
}

/// Custom rule: lines matching `pattern` are reported with `message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForbidRule {
    pub pattern: String,
    pub message: String,
}

/// Compile stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileSpec {
    /// Executable, e.g. `sass`
    pub command: String,

    /// Arguments; `{file}` and `{dir}` expand to the input's path and directory
    #[serde(default)]
    pub args: Vec<String>,

    /// Extension of the compiled output, e.g. `css`
    pub extension: String,

    /// Skip files whose name starts with `_`
    #[serde(default = "default_true")]
    pub skip_partials: bool,

    /// Tool name in error messages (defaults to the command)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CompileSpec {
    pub fn tool_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.command)
    }
}

fn default_true() -> bool {
    true
}

/// Watch mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period before a burst of changes triggers tasks
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// What to do when a running task is triggered again
    #[serde(default)]
    pub on_overlap: OverlapPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            on_overlap: OverlapPolicy::default(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    200
}

/// Dev server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Site to proxy, e.g. `http://local.domain.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Directory to serve when not proxying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            proxy: None,
            root: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}
