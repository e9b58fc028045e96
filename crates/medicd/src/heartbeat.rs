//! Heartbeat loop
//!
//! One full repair cycle per tick until the shutdown future resolves.
//! Metric history is pruned once an hour.

use crate::sampler::VitalsSampler;
use medic_common::HealingEngine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Heartbeat settings
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub retention_days: u32,
}

impl HeartbeatSettings {
    /// Ticks between metric history prunes
    fn prune_every(&self) -> u64 {
        let secs = self.interval.as_secs().max(1);
        (3600 / secs).max(1)
    }
}

/// Run until `shutdown` completes. Returns the number of cycles run.
pub async fn run_heartbeat<F>(
    engine: Arc<HealingEngine>,
    mut sampler: VitalsSampler,
    settings: HeartbeatSettings,
    shutdown: F,
) -> u64
where
    F: Future<Output = ()>,
{
    let mut ticker = interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let prune_every = settings.prune_every();
    let mut cycles: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("[HEARTBEAT] Shutdown requested after {} cycles", cycles);
                break;
            }
            _ = ticker.tick() => {
                let metrics = sampler.sample();
                let report = engine.full_repair_cycle(&metrics).await;
                cycles += 1;

                if !report.health_report.healthy {
                    warn!(
                        "[HEARTBEAT] Unhealthy: {} issue(s), primary {}",
                        report.health_report.issues.len(),
                        report.diagnosis.issue_type()
                    );
                }

                if cycles % prune_every == 0 {
                    engine.prune_metric_history(settings.retention_days);
                }
            }
        }
    }

    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_common::{ActionRegistry, SqliteStore};

    #[test]
    fn test_prune_interval() {
        let s = |secs| HeartbeatSettings {
            interval: Duration::from_secs(secs),
            retention_days: 30,
        };
        assert_eq!(s(30).prune_every(), 120);
        assert_eq!(s(7200).prune_every(), 1);
        assert_eq!(s(0).prune_every(), 3600);
    }

    #[tokio::test]
    async fn test_heartbeat_runs_until_shutdown() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = Arc::new(HealingEngine::new(store, ActionRegistry::new()));
        let settings = HeartbeatSettings {
            interval: Duration::from_millis(10),
            retention_days: 30,
        };

        let cycles = run_heartbeat(
            engine.clone(),
            VitalsSampler::new(),
            settings,
            tokio::time::sleep(Duration::from_millis(60)),
        )
        .await;

        assert!(cycles >= 1);
        assert!(!engine.monitor().window(medic_common::MetricCategory::Cpu).is_empty());
    }
}
