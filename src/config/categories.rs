// src/config/categories.rs
//! UI category code → API category code table.
//!
//! The mapping is a best guess: most UI codes have no API counterpart and fall
//! back to `all`. Deployments extend or override it with a TOML or JSON file.

use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::api::ALL_CATEGORIES;

const BUILTIN: &[(&str, &str)] = &[
    ("3", "b"),  // business & finance
    ("5", "e"),  // entertainment
    ("8", "m"),  // health
    ("18", "s"), // sports
    ("19", "t"), // science & technology
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap {
    map: BTreeMap<String, String>,
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self {
            map: BUILTIN
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl CategoryMap {
    /// API code for a UI category; unknown codes map to `all`.
    pub fn api_code(&self, ui_code: &str) -> &str {
        self.map
            .get(ui_code.trim())
            .map(String::as_str)
            .unwrap_or(ALL_CATEGORIES)
    }

    pub fn insert(&mut self, ui_code: &str, api_code: &str) {
        self.map
            .insert(ui_code.trim().to_string(), api_code.trim().to_string());
    }

    /// Overlay entries from a TOML (`[categories]`) or JSON (flat object) file.
    pub fn extend_from_path(&mut self, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading category map from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let entries = parse_category_map(&content, ext.as_str())?;
        let n = entries.len();
        for (k, v) in entries {
            self.insert(&k, &v);
        }
        Ok(n)
    }
}

fn parse_category_map(s: &str, hint_ext: &str) -> Result<BTreeMap<String, String>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[categories]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported category map format"))
}

fn parse_toml(s: &str) -> Result<BTreeMap<String, String>> {
    #[derive(serde::Deserialize)]
    struct TomlMap {
        categories: BTreeMap<String, String>,
    }
    let v: TomlMap = toml::from_str(s)?;
    Ok(clean_map(v.categories))
}

fn parse_json(s: &str) -> Result<BTreeMap<String, String>> {
    let v: BTreeMap<String, String> = serde_json::from_str(s)?;
    Ok(clean_map(v))
}

fn clean_map(items: BTreeMap<String, String>) -> BTreeMap<String, String> {
    items
        .into_iter()
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect()
}
