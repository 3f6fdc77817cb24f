//! netvine-daemon entry point.
//!
//! Startup order follows the dataplane dependency chain: configuration,
//! store seeding, bridge/VLAN reconciliation, classifier rules, config
//! cache, then the queue workers. Reconciliation failures are logged and
//! tolerated so the daemon keeps running for later administrative repair.

mod cli;
mod logging;
mod seed;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use netvine_core::config::NetvineConfig;
use netvine_core::pipeline::Pipeline;
use netvine_core::shell::{CommandRunner, ShellRunner};
use netvine_core::storage::{MemoryStore, Storage};
use netvine_netctl::{BridgeManager, NftManager};
use netvine_nfqueue::{QueueConfig, QueueWorker};
use netvine_packet_engine::{ConfigCache, PacketProcessor};

use crate::cli::DaemonCli;
use crate::seed::SeedFile;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // Load configuration; a missing file falls back to defaults so the
    // daemon can run from CLI flags alone.
    let mut config = if cli.config.exists() {
        NetvineConfig::load(&cli.config)
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?
    } else {
        NetvineConfig::default()
    };

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        config = %cli.config.display(),
        queues = config.queue.queues.as_str(),
        family = config.queue.family.as_str(),
        "netvine-daemon starting"
    );
    if !cli.config.exists() {
        tracing::warn!(config = %cli.config.display(), "config file not found, using defaults");
    }

    // In-process store seeded from the declarative record file.
    let storage: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    if !config.general.seed_file.is_empty() {
        let seed = SeedFile::load(config.general.seed_file.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to load seed file: {}", e))?;
        let counts = seed
            .apply(storage.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to apply seed file: {}", e))?;
        tracing::info!(
            fields = counts.fields,
            rules = counts.rules,
            nft_rules = counts.nft_rules,
            interfaces = counts.interfaces,
            "seed records loaded"
        );
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner::new());

    // Bridge/VLAN reconciliation. Failures are logged and startup continues.
    if config.network.reconcile_on_start {
        let bridge = BridgeManager::new(Arc::clone(&runner), storage_handle(&storage));
        let result = tokio::task::spawn_blocking(move || bridge.reconcile()).await?;
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to reconcile network configuration");
        }
    }

    // Classifier rules steer traffic into the queues; skip entirely in
    // no-queue mode.
    if config.queue.enabled && !cli.no_queue {
        let nft = NftManager::new(Arc::clone(&runner), storage_handle(&storage));
        let result = tokio::task::spawn_blocking(move || nft.apply()).await?;
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to apply classifier rules");
        }
    }

    // Config cache is the only rule/field source on the packet path.
    let cache = Arc::new(ConfigCache::new());
    cache
        .reload(storage.as_ref())
        .map_err(|e| anyhow::anyhow!("failed to load config cache: {}", e))?;
    let processor = Arc::new(PacketProcessor::new(cache, Arc::clone(&runner)));

    let mut worker = if config.queue.enabled && !cli.no_queue {
        let mut worker = QueueWorker::builder()
            .config(QueueConfig::from_core(&config.queue))
            .processor(processor)
            .storage(storage_handle(&storage))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build queue worker: {}", e))?;

        match worker.start().await {
            Ok(()) => {
                tracing::info!("queue worker started");
                Some(worker)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start queue worker, continuing without it");
                None
            }
        }
    } else {
        tracing::info!("queue worker disabled");
        None
    };

    let signal = wait_for_shutdown_signal().await?;
    tracing::info!(signal = signal, "shutdown signal received");

    if let Some(worker) = worker.as_mut() {
        if let Err(e) = worker.stop().await {
            tracing::error!(error = %e, "failed to stop queue worker");
        }
    }

    tracing::info!("netvine-daemon shut down");
    Ok(())
}

fn storage_handle(storage: &Arc<MemoryStore>) -> Arc<dyn Storage> {
    Arc::clone(storage) as Arc<dyn Storage>
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
