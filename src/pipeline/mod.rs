// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Build files and task execution
//!
//! This module defines the build-file schema, the task composition graph,
//! static validation and the runner that executes tasks.

mod dag;
mod definition;
mod executor;
mod validation;

pub use dag::TaskGraph;
pub use definition::*;
pub use executor::{Runner, RunnerBuilder};
pub use validation::{BuildValidator, ValidationResult};
