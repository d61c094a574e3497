// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Run command - execute tasks once

use chrono::DateTime;
use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::errors::AssetflowError;
use crate::notifier::ConsoleNotifier;
use crate::pipeline::{BuildFile, Runner, TaskDef, TaskGraph};
use crate::utils::{print_info, print_section};

/// Run the named tasks in order
pub async fn run(
    file: PathBuf,
    tasks: Vec<String>,
    build_date: Option<String>,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    let (build, working_dir) = super::load_build(&file)?;

    let tasks = if tasks.is_empty() {
        vec!["default".to_string()]
    } else {
        tasks
    };

    for name in &tasks {
        if build.task(name).is_none() {
            return Err(AssetflowError::UnknownTask {
                name: name.clone(),
                available: build.available(),
            }
            .into());
        }
    }

    if dry_run {
        return print_plan(&build, &tasks);
    }

    let mut builder = Runner::builder(build, working_dir)
        .notifier(Arc::new(ConsoleNotifier::new(verbose)));

    if let Some(date) = build_date {
        let timestamp = DateTime::parse_from_rfc3339(&date)
            .map_err(|e| miette::miette!("Invalid --build-date '{}': {}", date, e))?;
        builder = builder.timestamp(timestamp);
    }

    let runner = builder.build()?;

    for name in &tasks {
        let start = Instant::now();
        match runner.run(name).await {
            Ok(()) => {
                println!(
                    "{} Task '{}' finished in {:.2}s",
                    "✓".green(),
                    name,
                    start.elapsed().as_secs_f64()
                );
            }
            Err(e @ AssetflowError::UnknownTask { .. }) => return Err(e.into()),
            // Anything else was already reported by the notifier
            Err(_) => return Err(miette::miette!("Task '{}' failed", name)),
        }
    }

    Ok(())
}

fn print_plan(build: &BuildFile, tasks: &[String]) -> Result<()> {
    let graph = TaskGraph::build(build)?;

    println!("{}", "Dry run - no files are read or written".bold());
    for name in tasks {
        print_section(name);
        for pipeline in graph.pipelines_under(name) {
            let Some(TaskDef::Pipeline(task)) = build.task(&pipeline) else {
                continue;
            };
            let stages: Vec<&str> = task.stages.iter().map(|s| s.name()).collect();
            print_info(&format!(
                "{} {} {}",
                pipeline,
                task.src.to_vec().join(", ").dimmed(),
                if stages.is_empty() {
                    "(no stages)".to_string()
                } else {
                    stages.join(" → ")
                }
            ));
        }
    }

    Ok(())
}
