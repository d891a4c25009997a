//! Gateway configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DfsError, DfsResult};
use crate::path::HOPSFS_SCHEME;

/// Connection and behaviour settings shared by sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DfsConfig {
    /// URI of the filesystem used when a session names no endpoint.
    pub default_fs: String,
    /// Buffer size for stream copies, in bytes.
    pub io_buffer_size: usize,
    /// Bits cleared from the default permission of implicitly created nodes.
    pub umask: u16,
    /// Name of the filesystem superuser, used for display only.
    pub superuser: String,
}

impl Default for DfsConfig {
    fn default() -> Self {
        Self {
            default_fs: format!("{}://namenode.service.consul:8020", HOPSFS_SCHEME),
            io_buffer_size: 64 * 1024,
            umask: 0o022,
            superuser: String::from("hdfs"),
        }
    }
}

impl DfsConfig {
    /// Loads a `.toml` or `.json` config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let config: DfsConfig = match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and that `default_fs` is a usable URI.
    pub fn validate(&self) -> DfsResult<()> {
        if self.io_buffer_size == 0 {
            return Err(DfsError::InvalidArgument(
                "io_buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.umask > 0o777 {
            return Err(DfsError::InvalidArgument(format!(
                "umask {:o} out of range",
                self.umask
            )));
        }
        self.default_uri().map(|_| ())
    }

    /// Parses `default_fs`.
    pub fn default_uri(&self) -> DfsResult<Url> {
        Url::parse(&self.default_fs).map_err(|e| {
            DfsError::InvalidArgument(format!("invalid default_fs '{}': {}", self.default_fs, e))
        })
    }
}
