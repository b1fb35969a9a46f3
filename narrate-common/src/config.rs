//! Configuration loading
//!
//! Values are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 are handled by clap in the binary. This module owns the TOML
//! tier and the parsing helpers every tier funnels through, so a bad value
//! surfaces as [`Error::Config`] no matter where it came from.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Optional TOML configuration file contents
///
/// Every field is optional; absent fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub api_key: Option<String>,
    pub input_folder: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub temp_folder: Option<PathBuf>,
    pub voice: Option<String>,
    pub model: Option<String>,
    pub debug: Option<bool>,
    pub max_workers: Option<u64>,
    pub chunk_workers: Option<u64>,
    pub max_chunk_size: Option<u64>,
    pub retries: Option<u64>,
    pub retry_base_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub audio_format: Option<String>,
    pub base_url: Option<String>,
    pub ffmpeg_path: Option<PathBuf>,
}

/// Default TOML location: `{config_dir}/narrate/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("narrate").join("config.toml"))
}

/// Load the TOML tier.
///
/// An explicit path must exist and parse. Without one, the platform default is
/// used if present; a missing default file yields an empty config.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return read_toml_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => read_toml_config(&path),
        Some(path) => {
            debug!("No config file at {}, using defaults", path.display());
            Ok(TomlConfig::default())
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Validate a credential (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Parse a strictly positive integer setting
pub fn parse_positive(name: &str, raw: &str) -> Result<usize> {
    let value: usize = raw.trim().parse().map_err(|_| {
        Error::Config(format!("{} must be a positive integer, got {:?}", name, raw))
    })?;
    if value == 0 {
        return Err(Error::Config(format!("{} must be greater than zero", name)));
    }
    Ok(value)
}

/// Convert a TOML integer into a strictly positive `usize`
pub fn positive_from_toml(name: &str, value: u64) -> Result<usize> {
    if value == 0 {
        return Err(Error::Config(format!("{} must be greater than zero", name)));
    }
    usize::try_from(value).map_err(|_| Error::Config(format!("{} is out of range: {}", name, value)))
}

/// Parse a boolean flag the way environment files spell them
///
/// Accepts `true/false`, `1/0`, `yes/no`, `on/off` (case-insensitive).
pub fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be a boolean, got {:?}",
            name, other
        ))),
    }
}
