//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `imgpipe.toml`. The file lives in
//! the site root and is optional: stock defaults are used for anything it
//! doesn't set.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [cache]
//! dir = "cache/resize"      # Cache directory, relative to the site root
//! hash_length = 32          # Hex characters of the hashed filename (8-64)
//! naming = "hash"           # "hash" or "slug"
//!
//! [tool]
//! program = "convert"       # External pixel tool for raw requests
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [tool]
//! program = "magick"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::paths::NamingPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

/// Name of the config file looked up in the site root.
pub const CONFIG_FILENAME: &str = "imgpipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `imgpipe.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Cache location and filename derivation.
    pub cache: CacheConfig,
    /// External pixel tool used by raw requests.
    pub tool: ToolConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(8..=64).contains(&self.cache.hash_length) {
            return Err(ConfigError::Validation(
                "cache.hash_length must be 8-64".into(),
            ));
        }
        let dir = Path::new(&self.cache.dir);
        if self.cache.dir.trim().is_empty()
            || !dir.components().all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(ConfigError::Validation(format!(
                "cache.dir must be a relative path inside the site root, got {:?}",
                self.cache.dir
            )));
        }
        if self.tool.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "tool.program must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Where cached artifacts go and how they are named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub dir: String,
    pub hash_length: usize,
    pub naming: NamingPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: "cache/resize".to_string(),
            hash_length: 32,
            naming: NamingPolicy::Hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub program: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "convert".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel batch workers.
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
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
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

/// Load `imgpipe.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `imgpipe.toml` in the given site root.
pub fn load_config(root: &Path) -> Result<PipelineConfig, ConfigError> {
    resolve_config(load_raw_config(root)?)
}

/// Returns a fully-commented stock `imgpipe.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgpipe configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Transform cache
# ---------------------------------------------------------------------------
[cache]
# Directory for generated images, relative to the site root.
dir = "cache/resize"

# Number of hex characters kept from the SHA-256 filename hash (8-64).
hash_length = 32

# Filename policy:
#   "hash" - <sha256 prefix>.<ext>, collision resistant
#   "slug" - <base>_<spelled-out options>.<ext>, human readable
naming = "hash"

# ---------------------------------------------------------------------------
# External pixel tool (raw requests)
# ---------------------------------------------------------------------------
[tool]
# Invoked as: <program> <source> <args...> <destination>
program = "convert"

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of parallel batch workers.
# Omit to use all available CPU cores. Values above the core count are clamped.
# max_processes = 4
"##
}
