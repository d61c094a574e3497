// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! List command - show tasks

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::TaskDef;

/// Print every task with its kind, sources and stages
pub async fn run(file: PathBuf, verbose: bool) -> Result<()> {
    let (build, _) = super::load_build(&file)?;

    if let Some(name) = &build.name {
        println!("{}", name.bold());
        if let Some(description) = &build.description {
            println!("{}", description.dimmed());
        }
        println!();
    }

    for (name, task) in &build.tasks {
        println!("{} {}", name.bold(), format!("({})", task.kind()).dimmed());

        if let Some(description) = task.description() {
            println!("    {}", description);
        }

        match task {
            TaskDef::Pipeline(p) => {
                println!("    src: {}", p.src.to_vec().join(", ").cyan());
                if let Some(watch) = &p.watch {
                    println!("    watch: {}", watch.to_vec().join(", ").cyan());
                }
                let stages: Vec<&str> = p.stages.iter().map(|s| s.name()).collect();
                if !stages.is_empty() {
                    println!("    stages: {}", stages.join(" → "));
                }
                if verbose {
                    for stage in &p.stages {
                        println!("      {} {:?}", "•".dimmed(), stage);
                    }
                }
            }
            composite => {
                println!("    runs: {}", composite.members().join(", "));
            }
        }
    }

    Ok(())
}
