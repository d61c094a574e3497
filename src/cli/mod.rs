// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for assetflow.

pub mod graph;
pub mod init;
pub mod list;
pub mod run;
pub mod validate;
pub mod watch;

use clap::{Parser, Subcommand, ValueEnum};
use miette::Result;
use std::path::{Path, PathBuf};

use crate::pipeline::BuildFile;

/// Front-end asset pipelines
///
/// Lint, concatenate, compile, minify and banner scripts and styles, with
/// source maps, image optimisation and live reload.
#[derive(Parser, Debug)]
#[clap(
    name = "assetflow",
    version,
    about = "Declarative front-end asset pipelines with watch mode and live reload",
    long_about = None,
    after_help = "Examples:\n\
        assetflow init                  Write a starter assetflow.yaml\n\
        assetflow run                   Run the 'default' task\n\
        assetflow run scripts styles    Run two tasks in order\n\
        assetflow watch --serve         Rebuild on change and reload the browser\n\n\
        See 'assetflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Build file
    #[clap(
        short,
        long,
        global = true,
        env = "ASSETFLOW_FILE",
        default_value = "assetflow.yaml",
        value_name = "FILE"
    )]
    pub file: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run tasks once
    Run {
        /// Tasks to run, in order (defaults to 'default')
        tasks: Vec<String>,

        /// Banner timestamp as RFC 3339, e.g. 2024-01-02T03:04:05+00:00
        #[clap(long, value_name = "DATE")]
        build_date: Option<String>,

        /// Show what would run without reading or writing files
        #[clap(long)]
        dry_run: bool,
    },

    /// Re-run tasks when their files change
    Watch {
        /// Tasks to watch (defaults to every pipeline task)
        tasks: Vec<String>,

        /// Start the live-reload dev server
        #[clap(long)]
        serve: bool,

        /// Run the watched tasks once before waiting for changes
        #[clap(long)]
        initial: bool,

        /// Debounce delay in milliseconds (overrides the build file)
        #[clap(long, value_name = "MS")]
        debounce: Option<u64>,
    },

    /// List tasks
    List,

    /// Validate the build file
    Validate,

    /// Show task composition as a graph
    Graph {
        /// Output format
        #[clap(short = 'F', long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },

    /// Write a starter build file
    Init {
        /// Overwrite an existing build file
        #[clap(long)]
        force: bool,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Load the build file; relative paths in it start at its directory
pub(crate) fn load_build(file: &Path) -> Result<(BuildFile, PathBuf)> {
    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
    let path = cwd.join(file);

    let build = BuildFile::from_file(&path)?;
    let working_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(cwd);

    Ok((build, working_dir))
}
