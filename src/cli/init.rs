// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Init command - write a starter build file

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::BuildFile;
use crate::utils::{print_section, print_success};

/// Scripts, styles and images for a classic theme layout:
///
/// ```text
/// js/src/*.js       → js/app.js, js/app.min.js (+ js/maps)
/// js/plugins/*.js   → js/plugins.min.js
/// css/**/*.scss     → css/*.css, css/*.min.css
/// css/plugins/*.css → css/plugins.min.css
/// img/src/**        → img/build/**
/// ```
pub const TEMPLATE: &str = r#"version: "1"
package: package.json

tasks:
  lint-scripts:
    description: Check scripts and report issues per file
    src: js/src/*.js
    stages:
      - type: lint
        gate: false
        rules:
          eqeqeq: true
          no_debugger: true
          trailing_whitespace: true
      - type: notify
        message: "Lint: {file} (complete)."
        issues_message: "Lint: {file} ({count} errors)."

  scripts:
    description: Concatenate, minify and map scripts
    src: js/src/*.js
    stages:
      - type: concat
        file: app.js
      - type: banner
      - type: dest
        dir: js
      - type: rename
        file: app.min.js
      - type: minify
      - type: banner
      - type: sourcemaps
        dir: maps
        source_root: /js/src
      - type: dest
        dir: js
      - type: filter
        patterns: ["*.js"]
      - type: reload
      - type: notify
        message: "Scripts: {file} generated."

  plugin-scripts:
    description: Concatenate plugin scripts
    src: js/plugins/*.js
    stages:
      - type: concat
        file: plugins.min.js
      - type: banner
      - type: dest
        dir: js
      - type: reload
      - type: notify
        message: "Scripts: {file} generated."

  styles:
    description: Compile Sass, add prefixes and minify
    src: css/**/*.scss
    stages:
      - type: compile
        command: sass
        args: ["--stdin", "--style=expanded", "--no-source-map", "--load-path={dir}"]
        extension: css
        label: Sass
      - type: autoprefix
        browsers:
          chrome: "49"
          firefox: "52"
          safari: "9"
          ie: "11"
      - type: sourcemaps
        dir: "."
        source_root: "."
      - type: dest
        dir: css
      - type: filter
        patterns: ["**/*.css"]
      - type: rename
        suffix: .min
      - type: minify
      - type: banner
      - type: dest
        dir: css
      - type: reload
      - type: notify
        message: "Styles: {file} generated."

  plugin-styles:
    description: Concatenate and minify plugin styles
    src: css/plugins/*.css
    stages:
      - type: concat
        file: plugins.min.css
      - type: minify
      - type: banner
      - type: dest
        dir: css
      - type: reload
      - type: notify
        message: "Styles: {file} generated."

  optimise-images:
    description: Recompress new or changed images
    src: img/src/**/*
    stages:
      - type: changed
        dest: img/build
      - type: optimize_images
        jpeg_quality: 80
      - type: dest
        dir: img/build

  default:
    parallel: [lint-scripts, scripts, plugin-scripts, styles, plugin-styles]

watch:
  debounce_ms: 200
  on_overlap: queue

server:
  port: 3000
  proxy: http://local.domain.com
"#;

/// Run the init command
pub async fn run(file: PathBuf, force: bool, verbose: bool) -> Result<()> {
    println!("{}", "Initializing assetflow project...".bold());
    println!();

    if file.exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Use --force to overwrite.",
            file.display()
        ));
    }

    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            miette::miette!("Failed to create directory '{}': {}", parent.display(), e)
        })?;
    }

    std::fs::write(&file, TEMPLATE)
        .map_err(|e| miette::miette!("Failed to write {}: {}", file.display(), e))?;

    print_success(&format!("Created {}", file.display()));

    if verbose {
        let build = BuildFile::from_yaml(TEMPLATE)?;
        print_section("Tasks");
        for (name, task) in &build.tasks {
            println!("  • {} {}", name, task.description().unwrap_or_default().dimmed());
        }
    }

    print_section("Next steps");
    println!("  1. Edit {} to match your layout", file.display().to_string().cyan());
    println!("  2. Run {} to check it", "assetflow validate".cyan());
    println!("  3. Run {} to rebuild on change", "assetflow watch --serve".cyan());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{BuildValidator, TaskGraph};

    #[test]
    fn test_template_parses_and_validates() {
        let build = BuildFile::from_yaml(TEMPLATE).unwrap();
        assert_eq!(
            build.task_names(),
            vec![
                "default",
                "lint-scripts",
                "optimise-images",
                "plugin-scripts",
                "plugin-styles",
                "scripts",
                "styles"
            ]
        );

        let dir = tempfile::tempdir().unwrap();
        let result = BuildValidator::validate(&build, dir.path());
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn test_template_runs_every_asset_task_by_default() {
        let build = BuildFile::from_yaml(TEMPLATE).unwrap();
        let graph = TaskGraph::build(&build).unwrap();
        assert_eq!(
            graph.pipelines_under("default"),
            vec!["lint-scripts", "scripts", "plugin-scripts", "styles", "plugin-styles"]
        );
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("assetflow.yaml");
        std::fs::write(&file, "tasks: {}\n").unwrap();

        assert!(run(file.clone(), false, false).await.is_err());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "tasks: {}\n");

        run(file.clone(), true, false).await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), TEMPLATE);
    }
}
