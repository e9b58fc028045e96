//! Medic Daemon - self-healing runtime monitor
//!
//! Samples its own vitals on every heartbeat tick and runs one
//! monitor -> diagnose -> repair -> learn cycle per tick.

use anyhow::{Context, Result};
use medic_common::{HealingEngine, MedicConfig, SqliteStore, SystemSnapshots};
use medicd::actions::registry_from_config;
use medicd::heartbeat::{run_heartbeat, HeartbeatSettings};
use medicd::sampler::VitalsSampler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = MedicConfig::load();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("[BOOT] Medic Daemon v{} starting...", env!("CARGO_PKG_VERSION"));

    let store = SqliteStore::open_at(&config.store.path)
        .with_context(|| format!("Failed to open store at {}", config.store.path))?;
    info!("[BOOT] Store ready ({})", config.store.path);

    let registry = registry_from_config(&config);
    if registry.kinds().is_empty() {
        warn!("[BOOT] No [actions] configured; fixes will be simulated");
    }

    let engine = Arc::new(
        HealingEngine::builder(Arc::new(store))
            .registry(registry)
            .snapshot_source(Arc::new(SystemSnapshots::new()))
            .config(&config)
            .build(),
    );

    let settings = HeartbeatSettings {
        interval: Duration::from_secs(config.heartbeat.interval_secs.max(1)),
        retention_days: config.store.retention_days,
    };
    info!("[READY] medicd operational (heartbeat every {:?})", settings.interval);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
    };
    let cycles = run_heartbeat(engine.clone(), VitalsSampler::new(), settings, shutdown).await;

    let stats = engine.get_repair_stats();
    info!(
        "Shutting down gracefully after {} cycles ({} repairs, {} knowledge entries)",
        cycles, stats.repairs_total, stats.knowledge_entries
    );
    Ok(())
}
