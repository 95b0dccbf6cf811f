//! Site configuration module.
//!
//! Handles loading, validating, and merging the `config.toml` at the site
//! root. Stock defaults are the base layer; the user file overrides any
//! subset of keys.
//!
//! ## Site Layout
//!
//! ```text
//! site/
//! ├── config.toml        # Optional, overrides stock defaults
//! ├── pages/             # source: one page per directory
//! ├── theme/             # theme: article.html + directory.html (optional)
//! ├── authors/           # authors: <id>.json records (optional)
//! └── public/            # output: generated pages
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! title = "node docs"       # Site label, used as "<title> :: <page title>"
//! tags = []                 # Keywords added to every page's <meta name="keywords">
//! source = "pages"          # Source tree, relative to the site root
//! output = "public"         # Destination tree, relative to the site root
//! theme = "theme"           # Theme directory (stock theme when missing)
//! authors = "authors"       # Author registry directory
//!
//! [highlight]
//! enabled = true            # Highlight <code> blocks
//! auto_detect = true        # Guess the language of untagged blocks
//! preserve_entities = true  # Code is already HTML-escaped
//!
//! [processing]
//! max_processes = 4         # Max parallel render workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site label prefixed to page titles.
    pub title: String,
    /// Global keywords, appended after each page's own tags.
    pub tags: Vec<String>,
    /// Source tree, relative to the site root.
    pub source: String,
    /// Destination tree, relative to the site root.
    pub output: String,
    /// Theme directory, relative to the site root.
    pub theme: String,
    /// Author registry directory, relative to the site root.
    pub authors: String,
    /// Code highlighting options.
    pub highlight: HighlightConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "node docs".to_string(),
            tags: Vec::new(),
            source: "pages".to_string(),
            output: "public".to_string(),
            theme: "theme".to_string(),
            authors: "authors".to_string(),
            highlight: HighlightConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title.trim().is_empty() {
            return Err(ConfigError::Validation("title must not be empty".into()));
        }
        if self.source.trim().is_empty() {
            return Err(ConfigError::Validation("source must not be empty".into()));
        }
        if self.output.trim().is_empty() {
            return Err(ConfigError::Validation("output must not be empty".into()));
        }
        if Path::new(&self.source) == Path::new(&self.output) {
            return Err(ConfigError::Validation(
                "source and output must be different directories".into(),
            ));
        }
        Ok(())
    }
}

/// Code highlighting settings, passed to the highlighter for every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightConfig {
    /// Run the highlighter at all. The `&gt;` repair runs either way.
    pub enabled: bool,
    /// Detect the language of blocks without a `language-*` class.
    pub auto_detect: bool,
    /// Treat code as already HTML-escaped instead of escaping it again.
    pub preserve_entities: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_detect: true,
            preserve_entities: true,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel render workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// Base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the site root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# docweld Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at the site root. Paths are relative to that directory.
# Unknown keys will cause an error.

# Site label. Article pages get "<title> :: <page title>" as their <title>.
title = "node docs"

# Keywords added to every page's <meta name="keywords">, after the page's
# own tags. Duplicates are dropped.
tags = []

# Source tree. Every directory is one page: a directory holding a .md file
# is an article, any other directory lists its children.
source = "pages"

# Destination tree. Each page is written to <output>/<path>/index.html.
output = "public"

# Theme directory holding article.html and directory.html.
# The built-in theme is used when this directory does not exist.
theme = "theme"

# Author registry: one <id>.json file per author.
authors = "authors"

# ---------------------------------------------------------------------------
# Code highlighting
# ---------------------------------------------------------------------------
[highlight]
# Highlight <code> blocks in rendered pages.
enabled = true

# Guess the language of code blocks without a language tag.
auto_detect = true

# Code blocks are already HTML-escaped; decode entities before highlighting.
preserve_entities = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel render workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
