//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the nz-tides.toml file.
//! It provides a centralized way to configure where tide data files live, how they
//! are decoded, and how the command-line report is laid out.

use crate::codec::{DecodeOptions, Endianness, PartialPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "nz-tides.toml";

/// Application configuration loaded from nz-tides.toml
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Tide data file location and decoding
    pub data: DataConfig,
    /// Report layout
    pub display: DisplayConfig,
}

/// Where the `.tdat` files are and how to read them
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding one `<port>.<extension>` file per port
    pub dir: PathBuf,
    /// File extension without the dot
    pub extension: String,
    /// Integer byte order in the data files
    pub byte_order: Endianness,
    /// Whether to keep data from files that end inside the record table
    pub partial_records: PartialPolicy,
}

/// Report layout configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Port shown when none is given on the command line
    pub default_port: String,
    /// Days of upcoming tides to list
    pub listing_days: u32,
    /// ASCII graph height in rows
    pub graph_rows: usize,
    /// ASCII graph width in columns
    pub graph_cols: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            dir: PathBuf::from("data"),
            extension: "tdat".to_string(),
            byte_order: Endianness::Little,
            partial_records: PartialPolicy::AcceptIfSufficient,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            default_port: "Auckland".to_string(),
            listing_days: 35,
            graph_rows: 10,
            graph_cols: 40,
        }
    }
}

impl Config {
    /// Load configuration from nz-tides.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), data_dir = %config.data.dir.display(), "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }

    /// Codec settings from the `[data]` section
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            byte_order: self.data.byte_order,
            partial: self.data.partial_records,
        }
    }
}
