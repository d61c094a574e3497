// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Stylesheet processing through lightningcss
//!
//! Used for both vendor prefixing and minification. Browser targets come
//! from the build file as `name: version` pairs.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::sourcemap::Mapping;

/// A stylesheet that could not be processed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CssError {
    /// 1-based line, when known
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl<T: std::fmt::Display> From<lightningcss::error::Error<T>> for CssError {
    fn from(e: lightningcss::error::Error<T>) -> Self {
        Self {
            line: e.loc.as_ref().map(|l| l.line as usize + 1),
            column: e.loc.as_ref().map(|l| l.column as usize),
            message: e.kind.to_string(),
        }
    }
}

/// How to print a stylesheet
#[derive(Debug, Clone, Default)]
pub struct CssOptions {
    /// Browsers to add vendor prefixes for
    pub browsers: Option<Browsers>,
    /// Compact output
    pub minify: bool,
    /// Keep `/*! ... */` license comments
    pub keep_special_comments: bool,
}

/// Encode `12.1` as lightningcss does: `major << 16 | minor << 8 | patch`
pub fn parse_version(version: &str) -> Option<u32> {
    let mut parts = version.trim().split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next().map(str::parse).transpose().ok()?.unwrap_or(0);
    let patch: u32 = parts.next().map(str::parse).transpose().ok()?.unwrap_or(0);

    if parts.next().is_some() || minor > 255 || patch > 255 {
        return None;
    }
    Some((major << 16) | (minor << 8) | patch)
}

/// Build targets from `browser: version` pairs
pub fn parse_browsers(config: &BTreeMap<String, String>) -> Result<Browsers, String> {
    let mut browsers = Browsers::default();

    for (name, version) in config {
        let encoded = parse_version(version)
            .ok_or_else(|| format!("invalid version '{}' for browser '{}'", version, name))?;

        let slot = match name.to_ascii_lowercase().as_str() {
            "android" => &mut browsers.android,
            "chrome" => &mut browsers.chrome,
            "edge" => &mut browsers.edge,
            "firefox" | "ff" => &mut browsers.firefox,
            "ie" => &mut browsers.ie,
            "ios" | "ios_saf" => &mut browsers.ios_saf,
            "opera" => &mut browsers.opera,
            "safari" => &mut browsers.safari,
            "samsung" => &mut browsers.samsung,
            other => return Err(format!("unknown browser '{}'", other)),
        };
        *slot = Some(encoded);
    }

    Ok(browsers)
}

/// A printed stylesheet
#[derive(Debug, Clone)]
pub struct Processed {
    pub code: String,
    /// Output positions (`generated_*`) with the input position each was
    /// printed from (`original_*`), as taken by
    /// [`SourceTrack::remap`](crate::sourcemap::SourceTrack::remap)
    pub positions: Vec<Mapping>,
}

/// Parse, transform for the configured targets and print a stylesheet
pub fn process(code: &str, filename: &str, options: &CssOptions) -> Result<Processed, CssError> {
    let targets = options.browsers.map(Targets::from).unwrap_or_default();

    let mut sheet = StyleSheet::parse(
        code,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(CssError::from)?;

    if !options.keep_special_comments {
        sheet.license_comments.clear();
    }

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(CssError::from)?;

    let mut map = SourceMap::new("/");
    let printed = sheet
        .to_css(PrinterOptions {
            minify: options.minify,
            targets,
            source_map: Some(&mut map),
            ..PrinterOptions::default()
        })
        .map_err(CssError::from)?;

    let positions = map
        .get_mappings()
        .into_iter()
        .filter_map(|m| {
            let input = m.original?;
            Some(Mapping {
                generated_line: m.generated_line,
                generated_column: m.generated_column,
                source: 0,
                original_line: input.original_line,
                original_column: input.original_column,
            })
        })
        .collect();

    Ok(Processed {
        code: printed.code,
        positions,
    })
}
