// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Validate command - check the build file

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{BuildFile, BuildValidator};
use crate::utils::{print_error, print_section, print_success, print_warning};

/// Run the validate command
pub async fn run(file: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating build file...".bold());
    println!();

    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
    let path = cwd.join(&file);

    let build = match BuildFile::from_file(&path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("  {} Failed to parse {}", "✗".red(), file.display());
            eprintln!();
            return Err(e.into());
        }
    };

    print_success(&format!("{} parses", file.display()));

    let working_dir = path.parent().map(|p| p.to_path_buf()).unwrap_or(cwd);
    let validation = BuildValidator::validate(&build, &working_dir);

    if !validation.errors.is_empty() {
        print_section("Errors");
        for error in &validation.errors {
            print_error(error);
        }
    }

    if !validation.warnings.is_empty() {
        print_section("Warnings");
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if verbose {
        print_section("Summary");
        println!("  Tasks: {}", build.tasks.len());
        println!("  Pipelines: {}", build.pipeline_tasks().count());
        println!(
            "  Dev server: {}",
            if build.server.is_some() { "configured" } else { "none" }
        );
    }

    println!();
    if validation.is_valid() {
        if validation.has_warnings() {
            println!("{}", "Build file is valid (with warnings)".yellow());
        } else {
            println!("{}", "Build file is valid".green());
        }
        Ok(())
    } else {
        Err(miette::miette!(
            "Build file has {} error(s)",
            validation.errors.len()
        ))
    }
}
