//! Repair Executor
//!
//! Applies the recommended fix of a diagnosis through a typed handler
//! registry, brackets it with process snapshots, verifies improvement with a
//! per-category rule and records one history row per attempt.
//!
//! Contract:
//! - at most one repair in flight (async mutex held for the whole repair)
//! - at most one handler running; a handler that outlives its timeout keeps
//!   the fix slot until its blocking thread returns, and repairs started in
//!   the meantime are not attempted
//! - handlers run on the blocking pool under a timeout
//! - handler errors, panics and timeouts become `success = false`, never a
//!   propagated error
//! - a fix kind with no registered handler is a simulated no-op success

use crate::diagnosis::Diagnosis;
use crate::error::{MedicResult, RepairError};
use crate::ids::IdFactory;
use crate::snapshot::{Snapshot, SnapshotSource, SystemSnapshots};
use crate::store::RepairStore;
use crate::types::{FixKind, MetricCategory, RepairHistoryRecord, RepairOption};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default fix timeout
pub const DEFAULT_FIX_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Cycle phase
// ============================================================================

/// Where the current repair cycle is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    #[default]
    Idle,
    Diagnosing,
    Repairing,
    Verifying,
    Learned,
}

/// Phase shared between the engine and the executor
#[derive(Debug, Default)]
pub struct PhaseCell(Mutex<CyclePhase>);

impl PhaseCell {
    pub fn get(&self) -> CyclePhase {
        *self.0.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set(&self, phase: CyclePhase) {
        let mut current = self.0.lock().unwrap_or_else(|p| p.into_inner());
        if *current != phase {
            debug!("[EXECUTOR] phase {:?} -> {:?}", *current, phase);
            *current = phase;
        }
    }
}

// ============================================================================
// Action handlers
// ============================================================================

/// What a handler reports back. A missing `success` counts as success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: Option<bool>,
    pub description: Option<String>,
}

impl ActionOutcome {
    pub fn ok(description: impl Into<String>) -> Self {
        Self {
            success: Some(true),
            description: Some(description.into()),
        }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            description: Some(description.into()),
        }
    }
}

/// Host-supplied implementation of one fix kind
pub trait RepairAction: Send + Sync {
    fn apply(&self, option: &RepairOption) -> MedicResult<ActionOutcome>;
}

impl<F> RepairAction for F
where
    F: Fn(&RepairOption) -> MedicResult<ActionOutcome> + Send + Sync,
{
    fn apply(&self, option: &RepairOption) -> MedicResult<ActionOutcome> {
        self(option)
    }
}

/// Fix kind -> handler
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<FixKind, Arc<dyn RepairAction>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: FixKind, handler: Arc<dyn RepairAction>) {
        self.handlers.insert(kind, handler);
    }

    pub fn with_handler(mut self, kind: FixKind, handler: impl RepairAction + 'static) -> Self {
        self.register(kind, Arc::new(handler));
        self
    }

    pub fn get(&self, kind: FixKind) -> Option<Arc<dyn RepairAction>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<FixKind> {
        let mut kinds: Vec<FixKind> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of applying one fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixResult {
    pub fix: FixKind,
    pub success: bool,
    pub description: String,
    /// No handler was registered; nothing ran
    pub simulated: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl FixResult {
    fn new(fix: FixKind, success: bool, description: impl Into<String>) -> Self {
        Self {
            fix,
            success,
            description: description.into(),
            simulated: false,
            error: None,
            duration_ms: 0,
        }
    }

    fn simulated(option: &RepairOption) -> Self {
        let mut result = Self::new(option.fix, true, format!("Simulated: {}", option.description));
        result.simulated = true;
        result
    }

    fn failed(fix: FixKind, error: &RepairError) -> Self {
        let mut result = Self::new(fix, false, format!("Fix {} failed: {}", fix, error));
        result.error = Some(error.kind().to_string());
        result
    }

    fn with_duration(mut self, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }
}

/// Before/after comparison for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub category: Option<MetricCategory>,
    pub before: Option<f64>,
    pub after: Option<f64>,
    /// after - before
    pub delta: Option<f64>,
    pub improved: bool,
    /// Both readings were available
    pub conclusive: bool,
}

impl Verification {
    fn inconclusive(
        category: Option<MetricCategory>,
        before: Option<f64>,
        after: Option<f64>,
    ) -> Self {
        Self {
            category,
            before,
            after,
            delta: None,
            improved: false,
            conclusive: false,
        }
    }
}

/// Improvement rule per category
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerifyStrategy {
    /// Any decrease
    Decrease,
    /// Decrease by at least this fraction of the before value
    RelativeDecrease(f64),
    /// Decrease, or settling at zero
    DecreaseOrZero,
    /// Decrease by at least this many units
    AbsoluteDecrease(f64),
}

impl VerifyStrategy {
    pub fn for_category(category: MetricCategory) -> Self {
        match category {
            MetricCategory::Memory => VerifyStrategy::Decrease,
            MetricCategory::Latency => VerifyStrategy::RelativeDecrease(0.05),
            MetricCategory::ErrorRate => VerifyStrategy::DecreaseOrZero,
            MetricCategory::Connections => VerifyStrategy::Decrease,
            MetricCategory::Cpu => VerifyStrategy::AbsoluteDecrease(1.0),
        }
    }

    pub fn improved(&self, before: f64, after: f64) -> bool {
        match *self {
            VerifyStrategy::Decrease => after < before,
            VerifyStrategy::RelativeDecrease(fraction) => {
                after < before && before - after >= before.abs() * fraction
            }
            VerifyStrategy::DecreaseOrZero => after < before || after == 0.0,
            VerifyStrategy::AbsoluteDecrease(units) => before - after >= units,
        }
    }
}

/// Compare the category's readings between two snapshots
pub fn verify_repair(
    category: Option<MetricCategory>,
    before: &Snapshot,
    after: &Snapshot,
) -> Verification {
    let Some(category) = category else {
        return Verification::inconclusive(None, None, None);
    };
    let (b, a) = (before.reading(category), after.reading(category));
    let (Some(b), Some(a)) = (b, a) else {
        return Verification::inconclusive(Some(category), b, a);
    };

    Verification {
        category: Some(category),
        before: Some(b),
        after: Some(a),
        delta: Some(a - b),
        improved: VerifyStrategy::for_category(category).improved(b, a),
        conclusive: true,
    }
}

/// Outcome of one `repair()` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairResult {
    /// History row id, set once the row was written
    pub history_id: Option<String>,
    pub attempted: bool,
    pub success: bool,
    pub message: String,
    pub option: Option<RepairOption>,
    pub fix: Option<FixResult>,
    pub verification: Option<Verification>,
    pub before: Option<Snapshot>,
    pub after: Option<Snapshot>,
    pub repair_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl RepairResult {
    fn unattempted(message: impl Into<String>) -> Self {
        Self {
            history_id: None,
            attempted: false,
            success: false,
            message: message.into(),
            option: None,
            fix: None,
            verification: None,
            before: None,
            after: None,
            repair_time_ms: 0,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

pub struct Executor {
    store: Arc<dyn RepairStore>,
    ids: Arc<dyn IdFactory>,
    registry: ActionRegistry,
    snapshots: Arc<dyn SnapshotSource>,
    fix_timeout: Duration,
    phase: Arc<PhaseCell>,
    repair_lock: tokio::sync::Mutex<()>,
    /// Held by the blocking thread of the running handler
    fix_slot: Arc<tokio::sync::Mutex<()>>,
}

impl Executor {
    pub fn new(
        store: Arc<dyn RepairStore>,
        ids: Arc<dyn IdFactory>,
        registry: ActionRegistry,
    ) -> Self {
        Self {
            store,
            ids,
            registry,
            snapshots: Arc::new(SystemSnapshots::new()),
            fix_timeout: Duration::from_millis(DEFAULT_FIX_TIMEOUT_MS),
            phase: Arc::new(PhaseCell::default()),
            repair_lock: tokio::sync::Mutex::new(()),
            fix_slot: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn with_snapshot_source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.snapshots = source;
        self
    }

    pub fn with_fix_timeout(mut self, timeout: Duration) -> Self {
        self.fix_timeout = timeout;
        self
    }

    pub fn with_phase(mut self, phase: Arc<PhaseCell>) -> Self {
        self.phase = phase;
        self
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase.get()
    }

    pub fn capture_snapshot(&self) -> Snapshot {
        self.snapshots.capture()
    }

    /// A handler from an earlier fix is still running
    pub fn fix_in_flight(&self) -> bool {
        self.fix_slot.try_lock().is_err()
    }

    /// Run the handler for `option.fix`. Never fails.
    pub async fn apply_fix(&self, option: &RepairOption) -> FixResult {
        let started = Instant::now();

        let Some(handler) = self.registry.get(option.fix) else {
            debug!("[EXECUTOR] No handler for {}, simulating", option.fix);
            return FixResult::simulated(option).with_duration(started);
        };

        let Ok(slot) = self.fix_slot.clone().try_lock_owned() else {
            let err = RepairError::FixInFlight(option.fix.to_string());
            warn!("[EXECUTOR] {}", err);
            return FixResult::failed(option.fix, &err).with_duration(started);
        };

        let task_option = option.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _slot = slot;
            handler.apply(&task_option)
        });

        let result = match tokio::time::timeout(self.fix_timeout, task).await {
            Ok(Ok(Ok(outcome))) => {
                let success = outcome.success != Some(false);
                let description = outcome.description.unwrap_or_else(|| {
                    let verb = if success { "applied" } else { "reported failure" };
                    format!("{} {}", option.fix, verb)
                });
                FixResult::new(option.fix, success, description)
            }
            Ok(Ok(Err(e))) => FixResult::failed(option.fix, &e),
            Ok(Err(join_err)) => {
                let err = if join_err.is_panic() {
                    RepairError::HandlerPanicked(panic_message(join_err.into_panic()))
                } else {
                    RepairError::Handler("handler task cancelled".to_string())
                };
                FixResult::failed(option.fix, &err)
            }
            Err(_) => {
                let err = RepairError::Timeout(self.fix_timeout.as_millis() as u64);
                FixResult::failed(option.fix, &err)
            }
        };

        if !result.success {
            warn!("[EXECUTOR] {}", result.description);
        }
        result.with_duration(started)
    }

    /// snapshot -> fix -> snapshot -> verify -> history row
    pub async fn repair(&self, diagnosis: &Diagnosis) -> RepairResult {
        let Some(option) = diagnosis.recommended_action.clone() else {
            return RepairResult::unattempted("No recommended action");
        };

        let _guard = self.repair_lock.lock().await;
        if self.fix_in_flight() {
            warn!("[EXECUTOR] Skipping {}: previous fix still running", option.fix);
            return RepairResult::unattempted("Previous fix still running");
        }
        self.phase.set(CyclePhase::Repairing);
        let started = Instant::now();

        let before = self.capture_snapshot();
        let fix = self.apply_fix(&option).await;

        self.phase.set(CyclePhase::Verifying);
        let after = self.capture_snapshot();
        let category = option
            .category
            .or_else(|| diagnosis.classification.primary_issue.as_ref().map(|i| i.category));
        let verification = verify_repair(category, &before, &after);
        let repair_time_ms = started.elapsed().as_millis() as u64;

        info!(
            "[EXECUTOR] {} {} in {}ms (improved: {}, conclusive: {})",
            option.fix,
            if fix.success { "succeeded" } else { "failed" },
            repair_time_ms,
            verification.improved,
            verification.conclusive
        );

        let record = self.history_record(diagnosis, &option, &fix, &verification, repair_time_ms);
        let history_id = match self.store.insert_repair(&record) {
            Ok(()) => Some(record.id),
            Err(e) => {
                warn!("[EXECUTOR] Failed to record repair history: {}", e);
                None
            }
        };

        RepairResult {
            history_id,
            attempted: true,
            success: fix.success,
            message: fix.description.clone(),
            option: Some(option),
            fix: Some(fix),
            verification: Some(verification),
            before: Some(before),
            after: Some(after),
            repair_time_ms,
            timestamp: record.timestamp,
        }
    }

    fn history_record(
        &self,
        diagnosis: &Diagnosis,
        option: &RepairOption,
        fix: &FixResult,
        verification: &Verification,
        repair_time_ms: u64,
    ) -> RepairHistoryRecord {
        let classification = &diagnosis.classification;
        let symptoms = classification
            .all_issues
            .iter()
            .map(|i| format!("{} {} ({})", i.category, i.analysis.pattern, i.analysis.severity))
            .collect();
        let severity = classification
            .primary_issue
            .as_ref()
            .map(|i| i.analysis.severity)
            .unwrap_or_default();
        let snapshot = serde_json::to_value(diagnosis).unwrap_or_else(|e| {
            warn!("[EXECUTOR] Could not serialize diagnosis {}: {}", diagnosis.id, e);
            serde_json::Value::Null
        });

        RepairHistoryRecord {
            id: self.ids.next_id("rep"),
            issue_type: diagnosis.issue_type(),
            symptoms,
            severity,
            diagnosis: snapshot,
            repair_option: Some(option.clone()),
            fix_description: fix.description.clone(),
            success: fix.success,
            repair_time_ms,
            rollback_needed: fix.success && verification.conclusive && !verification.improved,
            verified: false,
            timestamp: Utc::now(),
        }
    }

    /// Record intent to roll back a repair. Returns whether the repair is known.
    ///
    /// State restoration belongs to the host; nothing is undone here.
    pub fn rollback(&self, repair_id: &str) -> bool {
        match self.store.get_repair(repair_id) {
            Ok(Some(record)) => {
                info!(
                    "[EXECUTOR] Rollback requested for {} ({}: {})",
                    record.id, record.issue_type, record.fix_description
                );
                true
            }
            Ok(None) => {
                warn!("[EXECUTOR] Rollback requested for unknown repair {}", repair_id);
                false
            }
            Err(e) => {
                warn!("[EXECUTOR] Rollback lookup for {} failed: {}", repair_id, e);
                false
            }
        }
    }

    /// Set the verified flag of a history row
    pub fn verify_repair_outcome(&self, repair_id: &str, verified: bool) -> bool {
        match self.store.set_repair_verified(repair_id, verified) {
            Ok(found) => {
                if !found {
                    warn!("[EXECUTOR] No repair {} to verify", repair_id);
                }
                found
            }
            Err(e) => {
                warn!("[EXECUTOR] Verification update for {} failed: {}", repair_id, e);
                false
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::Classification;
    use crate::ids::UuidIdFactory;
    use crate::store::SqliteStore;
    use crate::types::{Issue, OptionSource, Pattern, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns `before` on the first capture and `after` afterwards
    struct FixedSource {
        readings: Mutex<Vec<Snapshot>>,
    }

    impl FixedSource {
        fn new(before: Snapshot, after: Snapshot) -> Self {
            Self {
                readings: Mutex::new(vec![after, before]),
            }
        }
    }

    impl SnapshotSource for FixedSource {
        fn capture(&self) -> Snapshot {
            let mut readings = self.readings.lock().unwrap();
            if readings.len() > 1 {
                readings.pop().unwrap()
            } else {
                readings[0].clone()
            }
        }
    }

    fn option(fix: FixKind) -> RepairOption {
        RepairOption {
            fix,
            description: "test fix".into(),
            confidence: 0.4,
            category: Some(MetricCategory::Memory),
            source: OptionSource::Generic,
        }
    }

    fn diagnosis(recommended: Option<RepairOption>) -> Diagnosis {
        let issue = Issue::reported(
            MetricCategory::Memory,
            Pattern::LinearGrowth,
            Severity::High,
            0.9,
        );
        Diagnosis {
            id: "diag-1".into(),
            timestamp: Utc::now(),
            classification: Classification {
                classified: true,
                primary_issue: Some(issue.clone()),
                all_issues: vec![issue],
            },
            options: recommended.iter().cloned().collect(),
            recommended_action: recommended,
        }
    }

    fn executor(store: Arc<SqliteStore>, registry: ActionRegistry) -> Executor {
        let source = FixedSource::new(
            Snapshot::default().with_reading(MetricCategory::Memory, 200.0),
            Snapshot::default().with_reading(MetricCategory::Memory, 150.0),
        );
        Executor::new(store, Arc::new(UuidIdFactory), registry)
            .with_snapshot_source(Arc::new(source))
            .with_fix_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_missing_handler_is_simulated_success() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let exec = executor(store, ActionRegistry::new());
        let result = exec.apply_fix(&option(FixKind::ClearCaches)).await;
        assert!(result.success);
        assert!(result.simulated);
    }

    #[tokio::test]
    async fn test_handler_outcomes() {
        fn reclaimed(_: &RepairOption) -> MedicResult<ActionOutcome> {
            Ok(ActionOutcome::default())
        }
        fn busy(_: &RepairOption) -> MedicResult<ActionOutcome> {
            Ok(ActionOutcome::failed("cache busy"))
        }
        fn broken(_: &RepairOption) -> MedicResult<ActionOutcome> {
            Err(RepairError::Handler("boom".into()))
        }
        fn exploding(_: &RepairOption) -> MedicResult<ActionOutcome> {
            panic!("handler exploded")
        }

        let registry = ActionRegistry::new()
            .with_handler(FixKind::ReclaimMemory, reclaimed)
            .with_handler(FixKind::ClearCaches, busy)
            .with_handler(FixKind::ShedLoad, broken)
            .with_handler(FixKind::RestartComponent, exploding);
        let exec = executor(Arc::new(SqliteStore::open_in_memory().unwrap()), registry);

        assert!(exec.apply_fix(&option(FixKind::ReclaimMemory)).await.success);

        let failed = exec.apply_fix(&option(FixKind::ClearCaches)).await;
        assert!(!failed.success);
        assert_eq!(failed.description, "cache busy");

        let errored = exec.apply_fix(&option(FixKind::ShedLoad)).await;
        assert!(!errored.success);
        assert_eq!(errored.error.as_deref(), Some("handler"));

        let panicked = exec.apply_fix(&option(FixKind::RestartComponent)).await;
        assert!(!panicked.success);
        assert!(panicked.description.contains("handler exploded"));
    }

    #[tokio::test]
    async fn test_fix_timeout() {
        fn slow(_: &RepairOption) -> MedicResult<ActionOutcome> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(ActionOutcome::ok("late"))
        }

        let registry = ActionRegistry::new().with_handler(FixKind::ThrottleWorkload, slow);
        let exec = executor(Arc::new(SqliteStore::open_in_memory().unwrap()), registry);
        let result = exec.apply_fix(&option(FixKind::ThrottleWorkload)).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_timed_out_handler_holds_fix_slot() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (running.clone(), peak.clone());
        let registry = ActionRegistry::new().with_handler(
            FixKind::ReclaimMemory,
            move |_: &RepairOption| -> MedicResult<ActionOutcome> {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(300));
                r.fetch_sub(1, Ordering::SeqCst);
                Ok(ActionOutcome::ok("slow"))
            },
        );
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let exec = executor(store.clone(), registry);
        let diag = diagnosis(Some(option(FixKind::ReclaimMemory)));

        let first = exec.repair(&diag).await;
        assert!(first.attempted);
        assert_eq!(first.fix.as_ref().unwrap().error.as_deref(), Some("timeout"));
        assert!(exec.fix_in_flight());

        let second = exec.repair(&diag).await;
        assert!(!second.attempted);
        let direct = exec.apply_fix(&option(FixKind::ReclaimMemory)).await;
        assert_eq!(direct.error.as_deref(), Some("busy"));

        while exec.fix_in_flight() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let third = exec.repair(&diag).await;
        assert!(third.attempted);

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(store.recent_repairs(10).unwrap().len(), 2);
    }

    #[test]
    fn test_verify_strategies() {
        let check = |c: MetricCategory, before: f64, after: f64| {
            let before = Snapshot::default().with_reading(c, before);
            let after = Snapshot::default().with_reading(c, after);
            verify_repair(Some(c), &before, &after)
        };

        let v = check(MetricCategory::Memory, 100.0, 99.0);
        assert!(v.improved && v.conclusive);
        assert_eq!(v.delta, Some(-1.0));

        // Latency needs at least a 5% drop
        assert!(!check(MetricCategory::Latency, 100.0, 97.0).improved);
        assert!(check(MetricCategory::Latency, 100.0, 90.0).improved);

        assert!(check(MetricCategory::ErrorRate, 0.0, 0.0).improved);
        assert!(!check(MetricCategory::Cpu, 90.0, 89.5).improved);

        let after = Snapshot::default().with_reading(MetricCategory::Connections, 3.0);
        let v = verify_repair(Some(MetricCategory::Connections), &Snapshot::default(), &after);
        assert!(!v.improved);
        assert!(!v.conclusive);
    }

    #[tokio::test]
    async fn test_repair_writes_one_history_row() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let exec = executor(store.clone(), ActionRegistry::new());

        let result = exec.repair(&diagnosis(Some(option(FixKind::ReclaimMemory)))).await;
        assert!(result.attempted);
        assert!(result.success);
        assert!(result.verification.as_ref().unwrap().improved);
        assert_eq!(exec.phase(), CyclePhase::Verifying);

        let rows = store.recent_repairs(10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(Some(rows[0].id.clone()), result.history_id);
        assert_eq!(rows[0].issue_type, "memory:linear_growth");
        assert!(!rows[0].rollback_needed);
    }

    #[tokio::test]
    async fn test_repair_without_recommendation() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let exec = executor(store.clone(), ActionRegistry::new());

        let result = exec.repair(&diagnosis(None)).await;
        assert!(!result.attempted);
        assert!(!result.success);
        assert!(store.recent_repairs(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_and_verify_outcome() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let exec = executor(store.clone(), ActionRegistry::new());
        let result = exec.repair(&diagnosis(Some(option(FixKind::ReclaimMemory)))).await;
        let id = result.history_id.unwrap();

        assert!(exec.rollback(&id));
        assert!(!exec.rollback("rep-missing"));
        assert!(exec.verify_repair_outcome(&id, true));
        assert!(!exec.verify_repair_outcome("rep-missing", true));
        assert!(store.get_repair(&id).unwrap().unwrap().verified);
    }
}
