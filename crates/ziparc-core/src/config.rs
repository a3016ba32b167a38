//! Configuration module

use crate::archive::EntryNaming;
use crate::{Error, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Extraction defaults
    #[serde(default)]
    pub extract: ExtractConfig,
    /// Packing defaults
    #[serde(default)]
    pub pack: PackConfig,
}

/// Extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Copy buffer size in bytes ("8KiB" style strings accepted)
    #[serde(deserialize_with = "deserialize_size")]
    pub buffer_size: u64,
    /// Allow entries to resolve outside the destination directory
    pub allow_path_escape: bool,
    /// Create directories for directory entries
    pub create_directory_entries: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            buffer_size: 8 * 1024,
            allow_path_escape: false,
            create_directory_entries: false,
        }
    }
}

/// Packing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Emit entries for directories
    pub include_folders: bool,
    /// Entry naming scheme: "relative" or "base-name"
    pub naming: EntryNaming,
    /// Deflate level (0-9)
    pub compression_level: Option<i64>,
    /// Follow symlinks when walking
    pub follow_symlinks: bool,
    /// Copy buffer size in bytes ("4KiB" style strings accepted)
    #[serde(deserialize_with = "deserialize_size")]
    pub buffer_size: u64,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            include_folders: true,
            naming: EntryNaming::Relative,
            compression_level: None,
            follow_symlinks: false,
            buffer_size: 4 * 1024,
        }
    }
}

/// Size given either as a byte count or a human-readable string
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Numeric(u64),
    String(String),
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Numeric(bytes) => Ok(bytes),
        SizeValue::String(text) => parse_size(&text)
            .map_err(|e| D::Error::custom(format!("Failed to parse size: {}", e))),
    }
}

/// Parse size string like "8KiB" to bytes
pub fn parse_size(size_str: &str) -> Result<u64> {
    let size_str = size_str.trim();

    if let Ok(bytes) = size_str.parse::<u64>() {
        return Ok(bytes);
    }

    let split_pos = size_str
        .chars()
        .position(|c| !c.is_ascii_digit() && c != '.')
        .unwrap_or(size_str.len());

    if split_pos == 0 {
        return Err(Error::Config(format!("Invalid size format: {}", size_str)));
    }

    let (number_part, unit_part) = size_str.split_at(split_pos);
    let number: f64 = number_part
        .parse()
        .map_err(|_| Error::Config(format!("Invalid number in size: {}", number_part)))?;

    let multiplier: u64 = match unit_part.trim().to_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "ki" | "kib" => 1_024,
        "mi" | "mib" => 1_048_576,
        "gi" | "gib" => 1_073_741_824,
        _ => return Err(Error::Config(format!("Unknown size unit: {}", unit_part))),
    };

    Ok((number * multiplier as f64) as u64)
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| Error::Config("Unable to determine config directory".to_string()))?;

        Ok(config_dir.join("ziparc").join("config.toml"))
    }

    /// Load the user configuration, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.extract.buffer_size == 0 || self.pack.buffer_size == 0 {
            return Err(Error::Config("buffer_size must be greater than zero".to_string()));
        }
        if let Some(level) = self.pack.compression_level {
            if !(0..=9).contains(&level) {
                return Err(Error::Config(format!(
                    "compression_level must be between 0 and 9, got {}",
                    level
                )));
            }
        }
        Ok(())
    }
}
