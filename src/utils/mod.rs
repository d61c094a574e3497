// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Terminal helpers for the CLI

pub mod colors;

pub use colors::*;
