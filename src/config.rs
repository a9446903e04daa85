//! Size configuration module.
//!
//! Handles loading, validating, and merging `sizes.toml` files, and turning
//! the result into a [`SizeRegistry`]. Configuration is layered: stock
//! defaults are overridden by each config file in turn (for example a
//! site-wide file, then a theme file).
//!
//! ## Configuration Options
//!
//! ```toml
//! [processing]
//! max_processes = 4          # Max parallel render workers (omit for auto = CPU cores)
//!
//! # A plain size: registered on its own, with magnified variants.
//! [sizes.thumb]
//! size = "150x150"
//! magnify = { "2x" = 2.0 }   # registers "thumb @2x" at 300x300
//!
//! # A responsive set: one entry per breakpoint, in markup order.
//! [sizes.hero]
//! size = [1600, 900]         # optional; registered as a plain size too
//!
//! [[sizes.hero.breakpoints]]
//! key = "mobile"
//! size = [400, 300, true]    # [width, height, crop]
//! picture = '<source media="(max-width: 600px)" srcset="{src}">'
//! bg = '@media (max-width: 600px) { .hero { background-image: url("{src}"); } }'
//! srcset = "{src} {w}w"
//! sizes = "(max-width: 600px) 100vw"
//!
//! [[sizes.hero.breakpoints]]
//! key = "desktop"
//! size = "1200x900"
//! picture = '<img srcset="{src}" alt="{alt}" title="{title}">'
//! ```
//!
//! ## Size Values
//!
//! | Form | Meaning |
//! |------|---------|
//! | `"400x300"` | width x height, no crop |
//! | `"400x300x1"` | width x height, crop flag |
//! | `[400, 300]` | width, height, no crop |
//! | `[400, 300, true]` | hard crop |
//! | `[400, 300, ["left", "top"]]` | crop anchored at a position |
//!
//! ## Layering
//!
//! Tables merge key by key, everything else is replaced. In particular a
//! later file that lists `breakpoints` for a set replaces that set's
//! breakpoint list wholesale rather than appending to it.
//!
//! Unknown keys are rejected to catch typos early.

use crate::registry::{SizeRegistry, Templates};
use crate::size::{RawSize, SizeError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid size: {0}")]
    Size(#[from] SizeError),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Size configuration loaded from `sizes.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RwdConfig {
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Sizes and responsive sets, keyed by size key.
    pub sizes: BTreeMap<String, SizeConfig>,
}

/// One `[sizes.<key>]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizeConfig {
    /// Plain size registered under the table's key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<RawSize>,
    /// Magnification descriptors and factors, e.g. `"2x" = 2.0`.
    pub magnify: BTreeMap<String, f64>,
    /// Breakpoints of the responsive set named by the table's key.
    pub breakpoints: Vec<BreakpointConfig>,
}

/// One `[[sizes.<key>.breakpoints]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakpointConfig {
    pub key: String,
    pub size: RawSize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub magnify: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srcset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<String>,
}

impl BreakpointConfig {
    pub fn templates(&self) -> Templates {
        Templates {
            picture: self.picture.clone(),
            background: self.bg.clone(),
            srcset: self.srcset.clone(),
            sizes: self.sizes.clone(),
        }
    }
}

impl RwdConfig {
    /// Validate config values that the size parser does not check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        for (key, size) in &self.sizes {
            if key.trim().is_empty() {
                return Err(ConfigError::Validation("size keys must not be empty".into()));
            }
            if size.size.is_none() && size.breakpoints.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "sizes.{key} needs a size or at least one breakpoint"
                )));
            }
            if size.breakpoints.iter().any(|bp| bp.key.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "sizes.{key}.breakpoints keys must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Perform every registration the config describes, in key order.
    ///
    /// Stops at the first size that fails to parse.
    pub fn build_registry(&self) -> Result<SizeRegistry, ConfigError> {
        let mut registry = SizeRegistry::new();
        for (key, size) in &self.sizes {
            if let Some(raw) = &size.size {
                registry.register_size(key, raw, &size.magnify)?;
            }
            for bp in &size.breakpoints {
                registry.register_breakpoint(key, &bp.key, &bp.size, bp.templates())?;
                if !bp.magnify.is_empty() {
                    registry.register_size(&bp.key, &bp.size, &bp.magnify)?;
                }
            }
        }
        Ok(registry)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel render workers for batch rendering.
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
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer every config file is merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RwdConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values entirely.
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<RwdConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RwdConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a single file on top of stock defaults.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<RwdConfig, ConfigError> {
    load_layered(&[path])
}

/// Load and merge several config files in order, later files winning.
/// Missing files are skipped.
pub fn load_layered(paths: &[&Path]) -> Result<RwdConfig, ConfigError> {
    let mut merged = stock_defaults_value()?;
    for path in paths {
        if let Some(layer) = load_raw_config(path)? {
            tracing::debug!(path = %path.display(), "merging config layer");
            merged = merge_toml(merged, layer);
        }
    }
    resolve_config(merged, None)
}

/// Returns a fully-commented starter `sizes.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# rwd-image Size Configuration
# ============================
# Declares image sizes and responsive sets. Unknown keys cause an error.
#
# Several files can be layered with repeated --config flags; each later file
# only needs the keys it wants to override.
#
# Size values accept:
#   "400x300"                   width x height
#   "400x300x1"                 width x height x crop
#   [400, 300]                  width, height
#   [400, 300, true]            hard crop
#   [400, 300, ["left", "top"]] crop anchored at a position
#
# Template tokens: {src} {alt} {title} {w} {h}

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel render workers for `batch`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Plain sizes
# ---------------------------------------------------------------------------
[sizes.thumb]
size = "150x150x1"
# Magnified variants for high-density screens, registered as "thumb @2x".
magnify = { "2x" = 2.0 }

# ---------------------------------------------------------------------------
# Responsive sets
# ---------------------------------------------------------------------------
# The set's own size, when the host generated it, caps every breakpoint:
# no breakpoint wider than it is ever rendered.
[sizes.hero]
size = [1600, 900]

# Breakpoints render in the order listed.
[[sizes.hero.breakpoints]]
key = "hero-mobile"
size = [400, 300, true]
picture = '<source media="(max-width: 600px)" srcset="{src}">'
bg = '@media (max-width: 600px) { .hero { background-image: url("{src}"); } }'
srcset = "{src} {w}w"
sizes = "(max-width: 600px) 100vw"

[[sizes.hero.breakpoints]]
key = "hero-desktop"
size = [1200, 900, ["center", "top"]]
picture = '<img srcset="{src}" alt="{alt}" title="{title}">'
bg = '@media (min-width: 601px) { .hero { background-image: url("{src}"); } }'
srcset = "{src} {w}w"
sizes = "1200px"
"##
}
