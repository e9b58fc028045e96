//! Healing Engine - one heartbeat tick end to end
//!
//! Owns the monitor, diagnoser, executor, predictor and learner built over a
//! single store, and runs monitor -> diagnose -> repair -> learn per call to
//! `full_repair_cycle`. Hosts construct one engine and share it by reference.
//! Concurrent callers are serialized: one cycle runs start to finish before
//! the next records its metrics, so `phase()` always describes a single cycle.

use crate::config::MedicConfig;
use crate::diagnosis::{Diagnoser, Diagnosis};
use crate::error::MedicResult;
use crate::executor::{
    ActionRegistry, CyclePhase, Executor, PhaseCell, RepairResult, DEFAULT_FIX_TIMEOUT_MS,
};
use crate::ids::{IdFactory, UuidIdFactory};
use crate::learner::{CompressionReport, Learner, PatternSubmission, RepairStats};
use crate::monitor::{Monitor, DEFAULT_WINDOW_CAPACITY};
use crate::predictor::{Predictor, DEFAULT_CONFIDENCE_SCALE};
use crate::snapshot::{SnapshotSource, SystemSnapshots};
use crate::store::RepairStore;
use crate::types::{HealthReport, Issue, KnowledgeEntry, Prediction, RepairPattern};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything one cycle produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub health_report: HealthReport,
    pub diagnosis: Diagnosis,
    /// None when nothing needed repairing
    pub repair: Option<RepairResult>,
    pub predictions: Vec<Prediction>,
    pub timestamp: DateTime<Utc>,
}

/// Builder for [`HealingEngine`]
pub struct EngineBuilder {
    store: Arc<dyn RepairStore>,
    registry: ActionRegistry,
    ids: Arc<dyn IdFactory>,
    snapshots: Option<Arc<dyn SnapshotSource>>,
    window_capacity: usize,
    persist_samples: bool,
    fix_timeout: Duration,
    predictions_enabled: bool,
    confidence_scale: f64,
}

impl EngineBuilder {
    pub fn registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdFactory>) -> Self {
        self.ids = ids;
        self
    }

    pub fn snapshot_source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.snapshots = Some(source);
        self
    }

    pub fn fix_timeout(mut self, timeout: Duration) -> Self {
        self.fix_timeout = timeout;
        self
    }

    /// Apply monitor, executor and predictor settings from a config file
    pub fn config(mut self, config: &MedicConfig) -> Self {
        self.window_capacity = config.monitor.window_capacity;
        self.persist_samples = config.monitor.persist_samples;
        self.fix_timeout = config.executor.fix_timeout();
        self.predictions_enabled = config.predictor.enabled;
        self.confidence_scale = config.predictor.confidence_scale;
        self
    }

    pub fn build(self) -> HealingEngine {
        let phase = Arc::new(PhaseCell::default());
        let snapshots = self
            .snapshots
            .unwrap_or_else(|| Arc::new(SystemSnapshots::new()) as Arc<dyn SnapshotSource>);

        HealingEngine {
            monitor: Monitor::new(self.store.clone())
                .with_capacity(self.window_capacity)
                .with_persistence(self.persist_samples),
            diagnoser: Diagnoser::new(self.store.clone(), self.ids.clone()),
            executor: Executor::new(self.store.clone(), self.ids.clone(), self.registry)
                .with_snapshot_source(snapshots)
                .with_fix_timeout(self.fix_timeout)
                .with_phase(phase.clone()),
            predictor: Predictor::new(self.store.clone(), self.ids.clone())
                .with_confidence_scale(self.confidence_scale),
            learner: Learner::new(self.store.clone(), self.ids),
            store: self.store,
            phase,
            predictions_enabled: self.predictions_enabled,
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }
}

pub struct HealingEngine {
    monitor: Monitor,
    diagnoser: Diagnoser,
    executor: Executor,
    predictor: Predictor,
    learner: Learner,
    store: Arc<dyn RepairStore>,
    phase: Arc<PhaseCell>,
    predictions_enabled: bool,
    cycle_lock: tokio::sync::Mutex<()>,
}

impl HealingEngine {
    pub fn builder(store: Arc<dyn RepairStore>) -> EngineBuilder {
        EngineBuilder {
            store,
            registry: ActionRegistry::new(),
            ids: Arc::new(UuidIdFactory),
            snapshots: None,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            persist_samples: true,
            fix_timeout: Duration::from_millis(DEFAULT_FIX_TIMEOUT_MS),
            predictions_enabled: true,
            confidence_scale: DEFAULT_CONFIDENCE_SCALE,
        }
    }

    /// Engine with default settings and the given handlers
    pub fn new(store: Arc<dyn RepairStore>, registry: ActionRegistry) -> Self {
        Self::builder(store).registry(registry).build()
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase.get()
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn diagnoser(&self) -> &Diagnoser {
        &self.diagnoser
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    /// Run one cycle over `metrics`. Never fails.
    pub async fn full_repair_cycle(&self, metrics: &HashMap<String, f64>) -> CycleReport {
        self.full_repair_cycle_with(metrics, None).await
    }

    /// Run one cycle with an extra operator-reported issue
    pub async fn full_repair_cycle_with(
        &self,
        metrics: &HashMap<String, f64>,
        extra: Option<Issue>,
    ) -> CycleReport {
        let _cycle = self.cycle_lock.lock().await;
        self.phase.set(CyclePhase::Idle);
        let health_report = self.monitor.monitor(metrics);

        self.phase.set(CyclePhase::Diagnosing);
        let diagnosis = self.diagnoser.diagnose(&health_report, extra);

        let predictions = if self.predictions_enabled {
            self.predictor.predict_issues(&health_report)
        } else {
            Vec::new()
        };

        let repair = if diagnosis.classification.classified {
            let result = self.executor.repair(&diagnosis).await;
            self.learner.learn_from_repair(&result, &diagnosis);
            self.phase.set(CyclePhase::Learned);
            Some(result)
        } else {
            self.phase.set(CyclePhase::Idle);
            None
        };

        match &repair {
            Some(r) => info!(
                "[CYCLE] {} -> {} ({}, {}ms), {} prediction(s)",
                diagnosis.issue_type(),
                r.option.as_ref().map(|o| o.fix.as_str()).unwrap_or("none"),
                if r.success { "ok" } else { "failed" },
                r.repair_time_ms,
                predictions.len()
            ),
            None => debug!(
                "[CYCLE] healthy={} issues={} predictions={}",
                health_report.healthy,
                health_report.issues.len(),
                predictions.len()
            ),
        }

        CycleReport {
            health_report,
            diagnosis,
            repair,
            predictions,
            timestamp: Utc::now(),
        }
    }

    pub fn record_metric(&self, name: &str, value: f64) -> MedicResult<()> {
        self.monitor.record_metric(name, value)
    }

    pub fn enhanced_check(&self) -> HealthReport {
        self.monitor.enhanced_check()
    }

    pub fn apply_preventive_fix(&self, prediction_id: &str, outcome: &str) -> bool {
        self.predictor.apply_preventive_fix(prediction_id, outcome)
    }

    pub fn submit_error_pattern(
        &self,
        submission: PatternSubmission,
    ) -> MedicResult<(RepairPattern, KnowledgeEntry)> {
        self.learner.submit_error_pattern(submission)
    }

    pub fn compress_repair_knowledge(&self) -> CompressionReport {
        self.learner.compress_repair_knowledge()
    }

    pub fn get_repair_stats(&self) -> RepairStats {
        self.learner.get_repair_stats()
    }

    pub fn rollback(&self, repair_id: &str) -> bool {
        self.executor.rollback(repair_id)
    }

    pub fn verify_repair_outcome(&self, repair_id: &str, verified: bool) -> bool {
        self.executor.verify_repair_outcome(repair_id, verified)
    }

    /// Drop metric samples older than `days`. Returns rows removed, 0 on failure.
    pub fn prune_metric_history(&self, days: u32) -> u64 {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        match self.store.prune_metric_history(cutoff) {
            Ok(n) => {
                if n > 0 {
                    info!("[STORE] Pruned {} metric samples older than {} days", n, days);
                }
                n
            }
            Err(e) => {
                warn!("[STORE] Metric pruning failed: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ActionOutcome;
    use crate::snapshot::Snapshot;
    use crate::store::SqliteStore;
    use crate::types::{FixKind, MetricCategory, Pattern, RepairOption, Severity};
    use std::sync::{Mutex, OnceLock, Weak};

    struct StaticSource;

    impl SnapshotSource for StaticSource {
        fn capture(&self) -> Snapshot {
            Snapshot::default()
        }
    }

    fn engine() -> (Arc<SqliteStore>, HealingEngine) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = HealingEngine::builder(store.clone())
            .snapshot_source(Arc::new(StaticSource))
            .build();
        (store, engine)
    }

    fn metrics(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[tokio::test]
    async fn test_quiet_cycle_short_circuits() {
        let (store, engine) = engine();
        let report = engine.full_repair_cycle(&metrics(&[("cpu", 12.0)])).await;
        assert!(report.repair.is_none());
        assert!(!report.diagnosis.classification.classified);
        assert_eq!(engine.phase(), CyclePhase::Idle);
        assert!(store.recent_repairs(5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_with_reported_issue_reaches_learned() {
        let (store, engine) = engine();
        let extra =
            Issue::reported(MetricCategory::Connections, Pattern::Leak, Severity::High, 0.8);
        let report = engine.full_repair_cycle_with(&HashMap::new(), Some(extra)).await;

        let repair = report.repair.unwrap();
        assert!(repair.attempted);
        assert!(repair.success);
        assert_eq!(engine.phase(), CyclePhase::Learned);
        assert_eq!(store.recent_repairs(5).unwrap().len(), 1);
        assert_eq!(store.knowledge_for_issue("connections:leak").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_cycles_do_not_interleave() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let slot: Arc<OnceLock<Weak<HealingEngine>>> = Arc::new(OnceLock::new());
        let seen: Arc<Mutex<Vec<(CyclePhase, usize)>>> = Arc::default();

        let (handler_slot, handler_seen) = (slot.clone(), seen.clone());
        let registry = ActionRegistry::new().with_handler(
            FixKind::ResetConnectionPool,
            move |_: &RepairOption| -> MedicResult<ActionOutcome> {
                std::thread::sleep(Duration::from_millis(50));
                if let Some(engine) = handler_slot.get().and_then(Weak::upgrade) {
                    let latency = engine.monitor().window(MetricCategory::Latency).len();
                    handler_seen.lock().unwrap().push((engine.phase(), latency));
                }
                Ok(ActionOutcome::ok("pool reset"))
            },
        );
        let engine = Arc::new(
            HealingEngine::builder(store)
                .registry(registry)
                .snapshot_source(Arc::new(StaticSource))
                .build(),
        );
        slot.set(Arc::downgrade(&engine)).unwrap();

        let extra =
            Issue::reported(MetricCategory::Connections, Pattern::Leak, Severity::High, 0.8);
        let empty = HashMap::new();
        let latency = metrics(&[("latency", 5.0)]);
        let (first, second) = tokio::join!(
            engine.full_repair_cycle_with(&empty, Some(extra)),
            engine.full_repair_cycle(&latency),
        );

        assert!(first.repair.is_some());
        assert!(second.repair.is_none());
        // The second cycle neither recorded its sample nor moved the phase
        // while the first cycle's handler was running
        assert_eq!(*seen.lock().unwrap(), vec![(CyclePhase::Repairing, 0)]);
        assert_eq!(engine.monitor().window(MetricCategory::Latency), vec![5.0]);
    }

    #[test]
    fn test_builder_applies_config() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut config = MedicConfig::default();
        config.monitor.window_capacity = 3;
        config.predictor.enabled = false;
        let engine = HealingEngine::builder(store).config(&config).build();

        for v in 1..=5 {
            engine.record_metric("latency", v as f64).unwrap();
        }
        assert_eq!(engine.monitor().window(MetricCategory::Latency), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_prune_metric_history() {
        let (_, engine) = engine();
        engine.record_metric("cpu", 5.0).unwrap();
        assert_eq!(engine.prune_metric_history(1), 0);
    }
}
