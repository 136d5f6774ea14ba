//! Mintpipe - Batch Issuance and Instant-Sale Pipeline
//!
//! Entry point: loads configuration, reads the batch file, and drives
//! every item through the issuance, escrow, and auction chain until it
//! settles or is abandoned.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mintpipe::audit::AuditLog;
use mintpipe::checkpoint::CheckpointStore;
use mintpipe::config::Config;
use mintpipe::confirm::ConfirmPolicy;
use mintpipe::ledger::RpcConnection;
use mintpipe::metadata::MetadataClient;
use mintpipe::pipeline::Pipeline;
use mintpipe::stages::StageContext;
use mintpipe::types::BatchItem;
use mintpipe::wallet::WalletManager;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Batch file path, overriding the configured one
    #[arg(short, long)]
    batch: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    info!("Starting mintpipe");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("Loading configuration from: {}", args.config);
    let config = load_config(&args.config)?;

    let wallet =
        WalletManager::from_file(&config.wallet.keypair_path).context("Failed to load wallet")?;
    info!("Wallet address: {}", wallet.pubkey());

    let connection = RpcConnection::new(
        config.rpc.url.clone(),
        Duration::from_secs(config.rpc.timeout_secs),
        Duration::from_millis(config.rpc.poll_interval_ms),
    );
    let policy = ConfirmPolicy::new(config.rpc.max_retries, config.rpc.retry_backoff_ms);

    let audit = AuditLog::open(&config.audit_log_path)
        .with_context(|| format!("Failed to open audit log at {}", config.audit_log_path))?;

    let checkpoints = if config.checkpoint.enabled {
        CheckpointStore::open(&config.checkpoint.path)
            .context("Failed to open checkpoint store")?
    } else {
        warn!("Checkpointing disabled, crashed runs will not resume");
        CheckpointStore::disabled()
    };

    let metadata = MetadataClient::new(Duration::from_secs(config.rpc.timeout_secs))?;

    let batch_path = args.batch.as_deref().unwrap_or(&config.batch.file);
    info!("Reading batch from: {}", batch_path);
    let items = read_batch(batch_path)?;
    info!("Batch holds {} items", items.len());

    let ctx = StageContext {
        connection: &connection,
        wallet: &wallet,
        policy: &policy,
        audit: &audit,
        store_owner: config.auction.store_owner_pubkey()?,
        distribution_wallet: config.auction.distribution_wallet_pubkey()?,
    };
    let pipeline = Pipeline::new(ctx, &checkpoints, &metadata, config.batch.max_items);

    let summary = pipeline.run(items).await?;

    info!(
        settled = summary.settled.len(),
        abandoned = summary.abandoned.len(),
        skipped = summary.skipped.len(),
        "Run complete"
    );
    for abandoned in &summary.abandoned {
        error!(
            item = %abandoned.item_id,
            stage = abandoned.stage,
            error = %abandoned.error,
            "Item abandoned"
        );
    }

    if !summary.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "mintpipe=debug,info"
    } else {
        "mintpipe=info,warn,error"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        Ok(Config::default())
    }
}

/// Read and decode the batch file
fn read_batch(path: &str) -> Result<Vec<BatchItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path))?;
    let items: Vec<BatchItem> =
        serde_json::from_str(&content).context("Failed to decode batch file")?;
    Ok(items)
}
