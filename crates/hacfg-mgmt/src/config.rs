//! Configuration of the `hacfg` binary.

use hacfg_core::{EnvOptions, WaitPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings read from a TOML or JSON file. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MgmtConfig {
    /// Document the live commands operate on.
    pub document_file: PathBuf,
    /// Default wait in seconds; 0 waits forever, absent disables waiting.
    pub wait_timeout_secs: Option<u64>,
    /// Timeout of one peer request in seconds.
    pub peer_request_timeout_secs: u64,
    /// Tolerate unreachable peers.
    pub skip_offline_nodes: bool,
    /// Read ambiguous resource arguments strictly.
    pub future_parsing: bool,
}

impl Default for MgmtConfig {
    fn default() -> Self {
        Self {
            document_file: PathBuf::from("/var/lib/hacfg/cib.json"),
            wait_timeout_secs: None,
            peer_request_timeout_secs: 30,
            skip_offline_nodes: false,
            future_parsing: false,
        }
    }
}

impl MgmtConfig {
    /// Loads the configuration; the format follows the file extension.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: MgmtConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: MgmtConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Environment options, with `wait_override` taking precedence over
    /// the configured wait.
    pub fn env_options(&self, wait_override: Option<u64>, skip_offline: bool) -> EnvOptions {
        EnvOptions {
            wait: WaitPolicy::from_secs(wait_override.or(self.wait_timeout_secs)),
            skip_offline_nodes: skip_offline || self.skip_offline_nodes,
            peer_request_timeout: Duration::from_secs(self.peer_request_timeout_secs),
            user: std::env::var("USER").ok(),
        }
    }
}
