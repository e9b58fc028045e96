//! Monitor - sliding metric windows and health reports
//!
//! Producers call `record_metric` from any thread. Each accepted sample is
//! appended to its category window (bounded, oldest evicted) and then
//! persisted best-effort. `enhanced_check` runs the category analyzers over
//! the current windows and never touches the store.

use crate::error::{MedicResult, RepairError};
use crate::patterns;
use crate::store::RepairStore;
use crate::types::{HealthReport, Issue, MetricCategory, Severity};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Default samples kept per category
pub const DEFAULT_WINDOW_CAPACITY: usize = 120;

/// Fixed-capacity window of recent samples
#[derive(Debug, Clone)]
pub struct MetricWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl MetricWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    windows: HashMap<MetricCategory, MetricWindow>,
    last_sample_at: Option<DateTime<Utc>>,
}

pub struct Monitor {
    state: Mutex<MonitorState>,
    store: Arc<dyn RepairStore>,
    capacity: usize,
    persist_samples: bool,
}

impl Monitor {
    pub fn new(store: Arc<dyn RepairStore>) -> Self {
        Self {
            state: Mutex::new(MonitorState::default()),
            store,
            capacity: DEFAULT_WINDOW_CAPACITY,
            persist_samples: true,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_persistence(mut self, persist_samples: bool) -> Self {
        self.persist_samples = persist_samples;
        self
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        // Windows hold plain numbers; a panic mid-push cannot leave them torn
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record one sample.
    ///
    /// Rejects unknown metric names and non-finite values. A failed store
    /// write is logged and does not fail the call.
    pub fn record_metric(&self, name: &str, value: f64) -> MedicResult<()> {
        let category = validate(name, value)?;
        let at = Utc::now();
        {
            let mut state = self.state();
            self.append(&mut state, category, value, at);
        }
        self.persist(category, value, at);
        Ok(())
    }

    /// Record every entry of `metrics`, then analyze.
    ///
    /// Recording and analysis happen under one lock hold, so the report
    /// reflects exactly this batch plus what came before it.
    pub fn monitor(&self, metrics: &HashMap<String, f64>) -> HealthReport {
        let at = Utc::now();
        let mut accepted = Vec::with_capacity(metrics.len());

        // Sorted so window updates do not depend on hash order
        let mut entries: Vec<(&String, &f64)> = metrics.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let report = {
            let mut state = self.state();
            for (name, &value) in entries {
                match validate(name, value) {
                    Ok(category) => {
                        self.append(&mut state, category, value, at);
                        accepted.push((category, value));
                    }
                    Err(e) => warn!("[MONITOR] Skipping metric: {}", e),
                }
            }
            build_report(&state)
        };

        for (category, value) in accepted {
            self.persist(category, value, at);
        }

        report
    }

    /// Analyze the current windows. Pure read.
    pub fn enhanced_check(&self) -> HealthReport {
        let state = self.state();
        build_report(&state)
    }

    /// Copy of a category's window, oldest first
    pub fn window(&self, category: MetricCategory) -> Vec<f64> {
        self.state()
            .windows
            .get(&category)
            .map(MetricWindow::values)
            .unwrap_or_default()
    }

    fn append(
        &self,
        state: &mut MonitorState,
        category: MetricCategory,
        value: f64,
        at: DateTime<Utc>,
    ) {
        state
            .windows
            .entry(category)
            .or_insert_with(|| MetricWindow::new(self.capacity))
            .push(value);
        state.last_sample_at = Some(at);
        debug!("[MONITOR] {} <- {}", category, value);
    }

    fn persist(&self, category: MetricCategory, value: f64, at: DateTime<Utc>) {
        if !self.persist_samples {
            return;
        }
        if let Err(e) = self.store.record_metric_sample(category.as_str(), value, at) {
            warn!("[MONITOR] Failed to persist {} sample ({}): {}", category, e.kind(), e);
        }
    }
}

fn validate(name: &str, value: f64) -> MedicResult<MetricCategory> {
    let category = MetricCategory::from_name(name)
        .ok_or_else(|| RepairError::UnknownMetric(name.to_string()))?;
    if !value.is_finite() {
        return Err(RepairError::InvalidSample {
            name: name.to_string(),
            value,
        });
    }
    Ok(category)
}

fn build_report(state: &MonitorState) -> HealthReport {
    let mut analyses = BTreeMap::new();
    for (category, window) in &state.windows {
        if window.is_empty() {
            continue;
        }
        analyses.insert(*category, patterns::analyze(*category, &window.values()));
    }

    let issues: Vec<Issue> = analyses
        .iter()
        .filter(|(_, analysis)| analysis.severity != Severity::Info)
        .map(|(category, analysis)| Issue::detected(*category, analysis.clone()))
        .collect();

    let healthy = !issues.iter().any(|i| i.analysis.severity >= Severity::Medium);

    HealthReport {
        timestamp: state.last_sample_at.unwrap_or_default(),
        healthy,
        analyses,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::Pattern;

    fn test_monitor() -> Monitor {
        Monitor::new(Arc::new(SqliteStore::open_in_memory().unwrap()))
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = MetricWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            window.push(v);
        }
        assert_eq!(window.values(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_window_capacity_bound() {
        let monitor = test_monitor();
        for i in 0..200 {
            monitor.record_metric("cpu", i as f64).unwrap();
        }
        let window = monitor.window(MetricCategory::Cpu);
        assert_eq!(window.len(), DEFAULT_WINDOW_CAPACITY);
        assert_eq!(window[0], 80.0);
    }

    #[test]
    fn test_record_metric_rejects_bad_input() {
        let monitor = test_monitor();
        assert!(matches!(
            monitor.record_metric("disk_io", 1.0),
            Err(RepairError::UnknownMetric(_))
        ));
        assert!(matches!(
            monitor.record_metric("cpu", f64::NAN),
            Err(RepairError::InvalidSample { .. })
        ));
        assert!(monitor.window(MetricCategory::Cpu).is_empty());
    }

    #[test]
    fn test_aliases_share_a_window() {
        let monitor = test_monitor();
        monitor.record_metric("heap_used", 10.0).unwrap();
        monitor.record_metric("memory", 11.0).unwrap();
        assert_eq!(monitor.window(MetricCategory::Memory), vec![10.0, 11.0]);
    }

    #[test]
    fn test_empty_monitor_is_healthy() {
        let report = test_monitor().enhanced_check();
        assert!(report.healthy);
        assert!(report.analyses.is_empty());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_monitor_skips_unknown_and_reports() {
        let monitor = test_monitor();
        let mut report = None;
        for v in [20.0, 22.0, 21.0, 23.0, 95.0] {
            let mut metrics = HashMap::new();
            metrics.insert("cpu".to_string(), v);
            metrics.insert("gpu_temp".to_string(), 60.0);
            report = Some(monitor.monitor(&metrics));
        }
        let report = report.unwrap();
        assert!(!report.healthy);
        assert_eq!(report.analyses.len(), 1);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].analysis.pattern, Pattern::Spike);
        assert_eq!(report.issues[0].analysis.severity, Severity::High);
    }

    #[test]
    fn test_enhanced_check_is_idempotent() {
        let monitor = test_monitor();
        for v in [100.0, 105.0, 112.0, 121.0, 132.0, 145.0] {
            monitor.record_metric("memory", v).unwrap();
        }
        assert_eq!(monitor.enhanced_check(), monitor.enhanced_check());
    }

    #[test]
    fn test_concurrent_producers() {
        let monitor = Arc::new(test_monitor().with_persistence(false));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&monitor);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        m.record_metric("latency", 10.0).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(monitor.window(MetricCategory::Latency).len(), 100);
    }
}
