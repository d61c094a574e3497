// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Watch command - re-run tasks on file changes

use colored::Colorize;
use miette::Result;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::notifier::ConsoleNotifier;
use crate::pipeline::{Runner, ServerConfig};
use crate::reload::{DevServer, ReloadHub, ServeMode};
use crate::watch::{watch_loop, TaskScheduler, WatchBindings};

/// Run the watch command
pub async fn run(
    file: PathBuf,
    tasks: Vec<String>,
    serve: bool,
    initial: bool,
    debounce: Option<u64>,
    verbose: bool,
) -> Result<()> {
    let (build, working_dir) = super::load_build(&file)?;
    let working_dir = working_dir
        .canonicalize()
        .map_err(|e| miette::miette!("Failed to resolve '{}': {}", working_dir.display(), e))?;

    let bindings = WatchBindings::from_build(&build, &tasks)?;
    if bindings.is_empty() {
        return Err(miette::miette!("No pipeline tasks to watch"));
    }

    let debounce_ms = debounce.unwrap_or(build.watch.debounce_ms);
    let policy = build.watch.on_overlap;
    let server = build.server.clone().unwrap_or_default();

    let mut builder = Runner::builder(build, working_dir.clone())
        .notifier(Arc::new(ConsoleNotifier::new(verbose)));

    if serve {
        let hub = ReloadHub::new();
        builder = builder.reloader(Arc::new(hub.clone()));

        let addr = resolve(&server).await?;
        let dev_server = DevServer::new(addr, serve_mode(&server, &working_dir), hub)?;
        // Bound here so a taken port stops the command before anything runs
        let listener = dev_server.bind().await?;
        println!(
            "{} Dev server on {}",
            "→".blue(),
            format!("http://{}", addr).cyan()
        );
        tokio::spawn(async move {
            if let Err(e) = dev_server.serve_on(listener).await {
                error!(error = %e, "dev server stopped");
            }
        });
    }

    let runner = builder.build()?;
    let scheduler = TaskScheduler::new(runner, policy);

    println!("{}", "Starting watch mode...".bold());
    println!(
        "Watching {} (debounce: {}ms, on overlap: {})",
        bindings.tasks().join(", "),
        debounce_ms,
        policy
    );
    println!("Press {} to exit.", "Ctrl+C".cyan());
    println!();

    if initial {
        for task in bindings.tasks() {
            scheduler.trigger(task);
        }
    }

    watch_loop(
        &bindings,
        &scheduler,
        &working_dir,
        Duration::from_millis(debounce_ms),
    )
    .await?;

    Ok(())
}

async fn resolve(server: &ServerConfig) -> Result<SocketAddr> {
    tokio::net::lookup_host((server.host.as_str(), server.port))
        .await
        .map_err(|e| miette::miette!("Cannot resolve '{}': {}", server.host, e))?
        .next()
        .ok_or_else(|| miette::miette!("No address for '{}'", server.host))
}

/// Proxy when configured, otherwise serve `root` (or the working directory)
fn serve_mode(server: &ServerConfig, working_dir: &Path) -> ServeMode {
    match (&server.proxy, &server.root) {
        (Some(proxy), _) => ServeMode::Proxy(proxy.clone()),
        (None, Some(root)) => ServeMode::Static(working_dir.join(root)),
        (None, None) => ServeMode::Static(working_dir.to_path_buf()),
    }
}
