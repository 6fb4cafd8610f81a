//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use pool_model::RiskPolicy;
use serde::{Deserialize, Serialize};

use crate::gateway::ChainId;

/// Env var naming the config file
pub const CONFIG_ENV: &str = "POOL_CLIENT_CONFIG";

/// Config file used when `CONFIG_ENV` is unset
pub const DEFAULT_CONFIG_PATH: &str = "pool-client.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    pub name: String,
    /// JSON-RPC HTTP endpoint
    pub rpc_url: String,
}

/// Receipt polling schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Delay before the first receipt poll
    pub initial_backoff_ms: u64,
    /// Cap for the doubling delay
    pub max_backoff_ms: u64,
    /// Polls before giving up on a transaction
    pub max_attempts: u32,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1_000,
            max_backoff_ms: 15_000,
            max_attempts: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Active chain (wallet session)
    pub active_chain: ChainId,

    /// Connected account; absent when no wallet is connected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Pool catalog TOML path (`~` expanded)
    pub catalog_path: String,

    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    #[serde(default)]
    pub risk_policy: RiskPolicy,

    /// Chains the gateway may talk to
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

impl Config {
    /// Load configuration from the TOML file named by `POOL_CLIENT_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .context(format!("Failed to read config file: {}", config_path))?;

        let config: Config = toml::from_str(&config_str).context("Failed to parse config TOML")?;

        Ok(config)
    }

    /// Local development chain (anvil/hardhat defaults)
    pub fn default_local() -> Self {
        Self {
            active_chain: 31337,
            account: None,
            catalog_path: "pools.toml".to_string(),
            request_timeout_secs: 10,
            confirmation: ConfirmationConfig::default(),
            risk_policy: RiskPolicy::default(),
            chains: vec![ChainConfig {
                chain_id: 31337,
                name: "local".to_string(),
                rpc_url: "http://127.0.0.1:8545".to_string(),
            }],
        }
    }

    /// Write default config to file, pointing at `catalog_path`
    pub fn write_default(path: &str, catalog_path: &str) -> Result<()> {
        let mut config = Self::default_local();
        config.catalog_path = catalog_path.to_string();
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        std::fs::write(path, toml_str).context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }

    /// Catalog path with `~` and env vars expanded
    pub fn catalog_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.catalog_path)
            .context(format!("Failed to expand catalog path {}", self.catalog_path))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn chain(&self, chain_id: ChainId) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}
