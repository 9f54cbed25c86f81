//! Backup Mirror - Main entry point
//!
//! Loads the inventory and retention table, then runs the daily scheduler
//! until the process is killed.

use anyhow::{Context, Result};
use backup_mirror::{
    config::AppConfig,
    daemon::DailyScheduler,
    executor::BackupExecutor,
    inventory::Inventory,
    notify::{LogNotifier, Notifier, WebhookNotifier},
    retention::{RetentionEngine, RetentionPolicy},
    transfer::RsyncTransport,
    utils::{self, Clock, SystemClock},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize logging
    utils::logger::init(&config.log_level)?;

    tracing::info!("Starting backup-mirror v{}", env!("CARGO_PKG_VERSION"));

    let inventory = Inventory::from_file(&config.inventory_file)
        .with_context(|| format!("loading inventory {}", config.inventory_file.display()))?;
    if inventory.is_empty() {
        tracing::warn!("Inventory lists no hosts, passes will do nothing");
    }
    tracing::info!("Found inventory file. Hosts to backup: {}", inventory.len());
    for (id, host) in inventory.hosts() {
        tracing::info!("- {} ({}, {} folders)", host.url, id, host.folders.len());
    }

    let policy = match &config.retention_file {
        Some(path) => RetentionPolicy::from_file(path)
            .with_context(|| format!("loading retention policy {}", path.display()))?,
        None => RetentionPolicy::default(),
    };
    if policy.is_empty() {
        tracing::warn!("Retention table is empty, only per-host prefixes are rotated");
    } else {
        tracing::info!("Loaded {} retention rules", policy.len());
    }
    for (prefix, rule) in policy.rules() {
        tracing::info!(prefix, min_count = rule.min_count, max_age_days = rule.max_age_days, "Retention rule");
    }

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone(), config.webhook_username.clone())?),
        None => {
            tracing::warn!("DISCORD_WEBHOOK is not set, failures are only logged");
            Arc::new(LogNotifier)
        }
    };
    let transport = Arc::new(RsyncTransport::new(
        config.rsync_bin.clone(),
        config.ssh_user.clone(),
        config.ssh_key_file.clone(),
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let executor = BackupExecutor::new(
        config.backup_root.clone(),
        RetentionEngine::new(policy),
        transport,
        notifier,
        clock.clone(),
    );
    let scheduler = DailyScheduler::new(config.start_hour_utc, config.poll_interval, config.cooldown, clock);

    tracing::info!("Waiting for trigger hour {:02}:00 UTC", config.start_hour_utc);

    // Never cancelled: the process runs until it is killed.
    let cancel = CancellationToken::new();
    let executor = &executor;
    let inventory = &inventory;
    scheduler
        .run(cancel, move || async move {
            executor.run(inventory).await;
        })
        .await;

    Ok(())
}
