// SPDX-License-Identifier: MIT OR Apache-2.0
//! Session configuration.
//!
//! Stored as RON next to the host's settings:
//! - Pivot and step type sets for pipeline selection
//! - Node types stripped from templates before rendering
//! - Placement margins
//! - Debounce delays for index and command changes

use flowsplice_graph::{PipelineConfig, SpliceConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Type of the loader node itself
pub const LOADER_NODE_TYPE: &str = "LoadImageWithCMD";

/// Complete session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Configuration format version
    pub version: u32,
    /// Pipeline selection type sets
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Node types removed from templates before rendering
    #[serde(default = "default_excluded_types")]
    pub excluded_types: Vec<String>,
    /// Placement margins
    #[serde(default)]
    pub placement: SpliceConfig,
    /// Delay before an index change renders, in milliseconds
    #[serde(default = "default_index_debounce_ms")]
    pub index_debounce_ms: u64,
    /// Delay before a command change renders, in milliseconds
    #[serde(default = "default_command_debounce_ms")]
    pub command_debounce_ms: u64,
}

fn default_excluded_types() -> Vec<String> {
    vec![LOADER_NODE_TYPE.to_string()]
}

fn default_index_debounce_ms() -> u64 {
    256
}

fn default_command_debounce_ms() -> u64 {
    512
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            pipeline: PipelineConfig::default(),
            excluded_types: default_excluded_types(),
            placement: SpliceConfig::default(),
            index_debounce_ms: default_index_debounce_ms(),
            command_debounce_ms: default_command_debounce_ms(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = ron::from_str(&content)?;

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }

        tracing::debug!(path = %path.display(), "loaded session config");
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Debounce delay for index changes
    pub fn index_debounce(&self) -> Duration {
        Duration::from_millis(self.index_debounce_ms)
    }

    /// Debounce delay for command changes
    pub fn command_debounce(&self) -> Duration {
        Duration::from_millis(self.command_debounce_ms)
    }

    /// Check whether nodes of `node_type` are stripped from templates
    pub fn is_excluded(&self, node_type: &str) -> bool {
        self.excluded_types.iter().any(|t| t == node_type)
    }
}

/// Error while loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("Config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON for this format
    #[error("Config parse failed: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serializing failed
    #[error("Config serialize failed: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Highest version understood
        supported: u32,
    },
}
