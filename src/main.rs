// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! assetflow - front-end asset pipelines
//!
//! Lint, compile, concatenate, minify and banner scripts and styles, with
//! watch mode and live reload.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assetflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "assetflow=debug"
    } else {
        "assetflow=info"
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    assetflow::utils::configure_colors();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let file = cli.file;

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            tasks,
            build_date,
            dry_run,
        } => assetflow::cli::run::run(file, tasks, build_date, dry_run, cli.verbose).await,
        Commands::Watch {
            tasks,
            serve,
            initial,
            debounce,
        } => {
            assetflow::cli::watch::run(file, tasks, serve, initial, debounce, cli.verbose).await
        }
        Commands::List => assetflow::cli::list::run(file, cli.verbose).await,
        Commands::Validate => assetflow::cli::validate::run(file, cli.verbose).await,
        Commands::Graph { format } => assetflow::cli::graph::run(file, format, cli.verbose).await,
        Commands::Init { force } => assetflow::cli::init::run(file, force, cli.verbose).await,
    }
}
