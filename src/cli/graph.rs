// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Graph command - show task composition

use miette::Result;
use std::path::PathBuf;

use super::GraphFormat;
use crate::pipeline::TaskGraph;

/// Print the task graph in the requested format
pub async fn run(file: PathBuf, format: GraphFormat, _verbose: bool) -> Result<()> {
    let (build, _) = super::load_build(&file)?;
    let graph = TaskGraph::build(&build)?;

    let output = match format {
        GraphFormat::Text => graph.to_text(&build),
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    };
    print!("{}", output);

    Ok(())
}
