//! Packing configuration
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! block_size = 1048576     # bytes per leaf
//! fan_out = 5              # max children per node
//! copy_buffer_size = 65536 # read buffer shared by hashing and staging
//! staging_dir = "/var/tmp" # optional, defaults to the system temp dir
//! ```
//!
//! The hash function is always sha2-256.

use crate::core::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Default bytes per leaf block: 1 MiB
pub const DEFAULT_BLOCK_SIZE: u32 = 1024 * 1024;

/// Default maximum children per internal node
pub const DEFAULT_FAN_OUT: usize = 5;

/// Default size of the leaf copy buffer: 64 KiB
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    /// Bytes per leaf block
    #[validate(range(min = 1))]
    pub block_size: u32,

    /// Maximum children per internal node
    #[validate(range(min = 2))]
    pub fan_out: usize,

    /// Size of the buffer used to stream each block
    #[validate(range(min = 1))]
    pub copy_buffer_size: usize,

    /// Directory for the staging file (system temp dir when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            fan_out: DEFAULT_FAN_OUT,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            staging_dir: None,
        }
    }
}

impl PackConfig {
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn with_copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: PackConfig =
            toml::from_str(s).map_err(|e| ArchiveError::InvalidConfig(e.to_string()))?;
        config.validate_config()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check field ranges
    pub fn validate_config(&self) -> Result<()> {
        self.validate()
            .map_err(|e| ArchiveError::InvalidConfig(e.to_string()))
    }
}
