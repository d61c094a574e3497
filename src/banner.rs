// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Banner templates
//!
//! A banner is a comment block prepended to generated files. Templates use
//! `{{ pkg.<field> }}` for package manifest fields and `{{ date }}` for the
//! build timestamp.

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

use crate::errors::AssetflowError;

/// Banner used when a build file enables banners without its own template
pub const DEFAULT_BANNER: &str = "/*!\n * {{ pkg.name }}\n * @author {{ pkg.author }}\n * @version {{ pkg.version }}\n * Build date: {{ date }}\n */\n";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Top-level string fields of a package manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    fields: BTreeMap<String, String>,
}

impl PackageInfo {
    /// Load a `package.json`; `Ok(None)` when the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>, AssetflowError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| AssetflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let value: serde_json::Value = serde_json::from_str(&content)?;
        Ok(Some(Self::from_json(&value)))
    }

    /// Extract string-like fields from a manifest value
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut fields = BTreeMap::new();

        if let Some(map) = value.as_object() {
            for (key, field) in map {
                let rendered = match field {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    serde_json::Value::Bool(b) => Some(b.to_string()),
                    // People fields: { "name": ..., "email": ... }
                    serde_json::Value::Object(person) => person
                        .get("name")
                        .and_then(|n| n.as_str())
                        .map(|name| match person.get("email").and_then(|e| e.as_str()) {
                            Some(email) => format!("{} <{}>", name, email),
                            None => name.to_string(),
                        }),
                    _ => None,
                };

                if let Some(rendered) = rendered {
                    fields.insert(key.clone(), rendered);
                }
            }
        }

        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Values available to a banner at render time
#[derive(Debug, Clone)]
pub struct BannerVars {
    pub package: PackageInfo,
    pub date: String,
}

impl BannerVars {
    pub fn new(package: PackageInfo, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            package,
            date: format_timestamp(&timestamp),
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS +HHMM`
pub fn format_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S %z").to_string()
}

/// A parsed banner template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerTemplate {
    source: String,
}

impl BannerTemplate {
    /// Parse a template, rejecting unknown placeholders
    pub fn parse(source: &str) -> Result<Self, AssetflowError> {
        for caps in placeholder_regex().captures_iter(source) {
            let key = &caps[1];
            let known = key == "date"
                || key
                    .strip_prefix("pkg.")
                    .is_some_and(|field| !field.is_empty() && !field.contains('.'));

            if !known {
                return Err(AssetflowError::InvalidConfig {
                    reason: format!("Unknown banner placeholder '{{{{ {} }}}}'", key),
                    help: Some("Use {{ date }} or {{ pkg.<field> }}, e.g. {{ pkg.version }}".into()),
                });
            }
        }

        Ok(Self {
            source: source.to_string(),
        })
    }

    /// Placeholder names used by the template
    pub fn placeholders(&self) -> Vec<String> {
        placeholder_regex()
            .captures_iter(&self.source)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// Render with the given values. Missing package fields render empty.
    pub fn render(&self, vars: &BannerVars) -> String {
        placeholder_regex()
            .replace_all(&self.source, |caps: &regex::Captures<'_>| {
                let key = &caps[1];
                if key == "date" {
                    return vars.date.clone();
                }

                let field = key.trim_start_matches("pkg.");
                match vars.package.get(field) {
                    Some(value) => value.to_string(),
                    None => {
                        warn!(field, "package field used in banner is missing");
                        String::new()
                    }
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vars() -> BannerVars {
        let package = PackageInfo::from_json(&serde_json::json!({
            "name": "my-site",
            "version": "1.4.0",
            "author": { "name": "Sam Doe", "email": "sam@example.com" },
            "private": true,
            "scripts": { "build": "x" }
        }));
        let ts = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .unwrap();
        BannerVars::new(package, ts)
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(vars().date, "2024-03-09 14:05:07 +0100");
    }

    #[test]
    fn test_default_banner_renders() {
        let banner = BannerTemplate::parse(DEFAULT_BANNER).unwrap();
        assert_eq!(
            banner.render(&vars()),
            "/*!\n * my-site\n * @author Sam Doe <sam@example.com>\n * @version 1.4.0\n * Build date: 2024-03-09 14:05:07 +0100\n */\n"
        );
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = BannerTemplate::parse("/* {{ version }} */").unwrap_err();
        assert!(err.to_string().contains("version"));
        assert!(BannerTemplate::parse("/* {{ pkg.a.b }} */").is_err());
    }

    #[test]
    fn test_missing_field_renders_empty() {
        let banner = BannerTemplate::parse("/* {{pkg.license}}|{{ pkg.private }} */").unwrap();
        assert_eq!(banner.render(&vars()), "/* |true */");
        assert_eq!(banner.placeholders(), vec!["pkg.license", "pkg.private"]);
    }

    #[test]
    fn test_load_missing_package() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PackageInfo::load(&dir.path().join("package.json")).unwrap().is_none());
    }
}
