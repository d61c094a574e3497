// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! # assetflow - front-end asset pipelines
//!
//! `assetflow` runs named tasks over glob-selected files. A task is either a
//! pipeline of stages (lint, compile, concat, minify, banner, source maps,
//! dest, reload, notify, ...) or a sequence/parallel composition of other
//! tasks.
//!
//! ## Features
//!
//! - **Declarative build files** - tasks and stages in `assetflow.yaml`
//! - **Source maps** - line mappings survive concat, banner and minify
//! - **Watch mode** - changed files re-run the tasks whose globs match
//! - **Live reload** - a dev server tells browsers to refresh pages or styles
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter build file
//! assetflow init
//!
//! # Run the default task
//! assetflow run
//!
//! # Rebuild on change and reload the browser
//! assetflow watch --serve
//! ```

pub mod banner;
pub mod cli;
pub mod errors;
pub mod files;
pub mod minify;
pub mod notifier;
pub mod pipeline;
pub mod reload;
pub mod sourcemap;
pub mod stages;
pub mod utils;
pub mod watch;

// Re-export commonly used types
pub use errors::{AssetflowError, AssetflowResult};
pub use notifier::{ConsoleNotifier, Notifier};
pub use pipeline::{BuildFile, Runner};
pub use stages::{Stage, TaskContext};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
