// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Script and stylesheet transforms

pub mod css;
pub mod js;

pub use css::{CssError, CssOptions};
pub use js::{JsError, JsOptions, Minified};
