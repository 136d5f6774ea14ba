//! Configuration module for the issuance pipeline
//!
//! This module handles all configuration loading from TOML files,
//! environment variables, and provides structured configuration types.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoint configuration
    pub rpc: RpcConfig,

    /// Wallet configuration
    pub wallet: WalletConfig,

    /// Batch input configuration
    pub batch: BatchConfig,

    /// Auction/store addresses
    pub auction: AuctionConfig,

    /// Checkpoint persistence
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Audit log path
    #[serde(default = "default_audit_path")]
    pub audit_log_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// RPC endpoint URL
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Max submission attempts per confirmation loop
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff between confirmation attempts in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Interval between signature status polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Path to the batch JSON file
    pub file: String,

    /// Maximum items accepted per run
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionConfig {
    /// Store owner used for store/whitelisted-creator PDA derivation
    pub store_owner: String,

    /// Wallet that receives distributed edition prints
    pub distribution_wallet: String,
}

impl AuctionConfig {
    pub fn store_owner_pubkey(&self) -> anyhow::Result<Pubkey> {
        self.store_owner
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid store_owner: {e}"))
    }

    pub fn distribution_wallet_pubkey(&self) -> anyhow::Result<Pubkey> {
        self.distribution_wallet
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid distribution_wallet: {e}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Enable stage-record persistence and resume
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path of the checkpoint database
    #[serde(default = "default_checkpoint_path")]
    pub path: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_checkpoint_path(),
        }
    }
}

// Default value functions
fn default_rpc_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    10
}
fn default_retry_backoff_ms() -> u64 {
    30_000
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_max_items() -> usize {
    crate::types::MAX_BATCH_ITEMS
}
fn default_audit_path() -> String {
    "mintpipe-audit.log".to_string()
}
fn default_checkpoint_path() -> String {
    "mintpipe-checkpoints".to_string()
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        if let Ok(url) = std::env::var("MINTPIPE_RPC_URL") {
            config.rpc.url = url;
        }
        if let Ok(keypair) = std::env::var("MINTPIPE_KEYPAIR") {
            config.wallet.keypair_path = keypair;
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                url: "https://api.mainnet-beta.solana.com".to_string(),
                timeout_secs: default_rpc_timeout(),
                max_retries: default_max_retries(),
                retry_backoff_ms: default_retry_backoff_ms(),
                poll_interval_ms: default_poll_interval_ms(),
            },
            wallet: WalletConfig {
                keypair_path: "~/.config/solana/id.json".to_string(),
            },
            batch: BatchConfig {
                file: "batch.json".to_string(),
                max_items: default_max_items(),
            },
            auction: AuctionConfig {
                store_owner: "2W5E5DF5r296bGvCqNCQs7jrSoaenLW8SMPUuZGCVXHY".to_string(),
                distribution_wallet: "BsfNMxeoxUwQCV1zb1h5x1S6WCXeSDkzWaHMspuUj5UB".to_string(),
            },
            checkpoint: CheckpointConfig::default(),
            audit_log_path: default_audit_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.batch.max_items, 200);
        assert_eq!(config.rpc.max_retries, 10);
        assert!(config.checkpoint.enabled);
        assert!(config.auction.store_owner_pubkey().is_ok());
        assert!(config.auction.distribution_wallet_pubkey().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            [rpc]
            url = "http://127.0.0.1:8899"

            [wallet]
            keypair_path = "/tmp/id.json"

            [batch]
            file = "batch.json"

            [auction]
            store_owner = "2W5E5DF5r296bGvCqNCQs7jrSoaenLW8SMPUuZGCVXHY"
            distribution_wallet = "BsfNMxeoxUwQCV1zb1h5x1S6WCXeSDkzWaHMspuUj5UB"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.rpc.url, "http://127.0.0.1:8899");
        assert_eq!(config.rpc.retry_backoff_ms, 30_000);
        assert_eq!(config.batch.max_items, 200);
    }
}
