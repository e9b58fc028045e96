//! Predictor
//!
//! Scans a health report for precursor signatures that usually precede a
//! visible failure and emits early, low-confidence predictions with a
//! preventive action. Runs whether or not the report already has issues.

use crate::ids::IdFactory;
use crate::store::RepairStore;
use crate::types::{
    FixKind, HealthReport, MetricCategory, Pattern, PatternAnalysis, Prediction, Severity,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Default multiplier applied to analysis confidence
pub const DEFAULT_CONFIDENCE_SCALE: f64 = 0.6;

/// A signature in one category's analysis that precedes a failure
pub struct Precursor {
    pub category: MetricCategory,
    pub predicted_issue: &'static str,
    pub preventive_action: FixKind,
    pub matches: fn(&PatternAnalysis) -> bool,
    pub time_to_impact: fn(&PatternAnalysis) -> String,
    pub severity: fn(&PatternAnalysis) -> Severity,
}

fn same_severity(a: &PatternAnalysis) -> Severity {
    a.severity
}

/// Growth with the newest sample at the window max, i.e. nothing freed since
fn memory_growth_without_recovery(a: &PatternAnalysis) -> bool {
    a.pattern == Pattern::LinearGrowth && a.details.latest >= a.details.max
}

/// Minutes until another ~100 units at the current slope
fn memory_time_to_impact(a: &PatternAnalysis) -> String {
    if a.details.slope <= 0.0 {
        return "unknown".to_string();
    }
    format!("~{} minutes", (100.0 / a.details.slope).ceil() as u64)
}

pub static PRECURSORS: [Precursor; 5] = [
    Precursor {
        category: MetricCategory::Memory,
        predicted_issue: "memory exhaustion",
        preventive_action: FixKind::ReclaimMemory,
        matches: memory_growth_without_recovery,
        time_to_impact: memory_time_to_impact,
        severity: same_severity,
    },
    Precursor {
        category: MetricCategory::Latency,
        predicted_issue: "service timeout",
        preventive_action: FixKind::ShedLoad,
        matches: |a| a.pattern == Pattern::GradualDegradation,
        time_to_impact: |_| "~30 minutes".to_string(),
        severity: same_severity,
    },
    Precursor {
        category: MetricCategory::ErrorRate,
        predicted_issue: "service failure",
        preventive_action: FixKind::EnableCircuitBreaker,
        matches: |a| matches!(a.pattern, Pattern::Cascading | Pattern::Burst),
        time_to_impact: |_| "imminent".to_string(),
        severity: |_| Severity::Critical,
    },
    Precursor {
        category: MetricCategory::Connections,
        predicted_issue: "connection exhaustion",
        preventive_action: FixKind::ResetConnectionPool,
        matches: |a| matches!(a.pattern, Pattern::Leak | Pattern::Saturation),
        time_to_impact: |_| "~1 hour".to_string(),
        severity: same_severity,
    },
    Precursor {
        category: MetricCategory::Cpu,
        predicted_issue: "cpu overload",
        preventive_action: FixKind::ThrottleWorkload,
        matches: |a| matches!(a.pattern, Pattern::SustainedHigh | Pattern::GradualIncrease),
        time_to_impact: |a| {
            if a.pattern == Pattern::SustainedHigh {
                "~5 minutes".to_string()
            } else {
                "~20 minutes".to_string()
            }
        },
        severity: same_severity,
    },
];

pub struct Predictor {
    store: Arc<dyn RepairStore>,
    ids: Arc<dyn IdFactory>,
    confidence_scale: f64,
}

impl Predictor {
    pub fn new(store: Arc<dyn RepairStore>, ids: Arc<dyn IdFactory>) -> Self {
        Self {
            store,
            ids,
            confidence_scale: DEFAULT_CONFIDENCE_SCALE,
        }
    }

    pub fn with_confidence_scale(mut self, scale: f64) -> Self {
        self.confidence_scale = scale.clamp(0.0, 1.0);
        self
    }

    /// Evaluate every precursor against the report; persist and return matches
    pub fn predict_issues(&self, report: &HealthReport) -> Vec<Prediction> {
        let mut predictions = Vec::new();

        for precursor in PRECURSORS.iter() {
            let Some(analysis) = report.analyses.get(&precursor.category) else {
                continue;
            };
            if !(precursor.matches)(analysis) {
                continue;
            }

            let prediction = Prediction {
                id: self.ids.next_id("pred"),
                predicted_issue: precursor.predicted_issue.to_string(),
                category: precursor.category,
                severity: (precursor.severity)(analysis),
                confidence: (analysis.confidence * self.confidence_scale).clamp(0.0, 1.0),
                time_to_impact: (precursor.time_to_impact)(analysis),
                preventive_action: precursor.preventive_action.to_string(),
                applied: false,
                outcome: None,
                source_pattern: format!("{}:{}", precursor.category, analysis.pattern),
                timestamp: Utc::now(),
            };

            info!(
                "[PREDICTOR] {} in {} ({:.0}% confidence, from {})",
                prediction.predicted_issue,
                prediction.time_to_impact,
                prediction.confidence * 100.0,
                prediction.source_pattern
            );

            if let Err(e) = self.store.insert_prediction(&prediction) {
                warn!("[PREDICTOR] Failed to persist prediction {}: {}", prediction.id, e);
            }
            predictions.push(prediction);
        }

        predictions
    }

    /// Mark a stored prediction applied. False if the id is unknown or the
    /// prediction was already applied; the first outcome is kept.
    pub fn apply_preventive_fix(&self, prediction_id: &str, outcome: &str) -> bool {
        match self.store.mark_prediction_applied(prediction_id, outcome) {
            Ok(true) => {
                info!("[PREDICTOR] Prediction {} applied: {}", prediction_id, outcome);
                true
            }
            Ok(false) => {
                warn!("[PREDICTOR] Unknown or already applied prediction {}", prediction_id);
                false
            }
            Err(e) => {
                warn!("[PREDICTOR] Failed to update prediction {}: {}", prediction_id, e);
                false
            }
        }
    }

    /// Predictions not yet applied, empty on store failure
    pub fn active_predictions(&self) -> Vec<Prediction> {
        self.store.active_predictions().unwrap_or_else(|e| {
            warn!("[PREDICTOR] Failed to list predictions: {}", e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UuidIdFactory;
    use crate::patterns;
    use crate::store::SqliteStore;
    use std::collections::BTreeMap;

    fn report_for(category: MetricCategory, values: &[f64]) -> HealthReport {
        let mut analyses = BTreeMap::new();
        analyses.insert(category, patterns::analyze(category, values));
        HealthReport {
            timestamp: Utc::now(),
            healthy: true,
            analyses,
            issues: vec![],
        }
    }

    fn predictor() -> (Arc<SqliteStore>, Predictor) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let predictor = Predictor::new(store.clone(), Arc::new(UuidIdFactory));
        (store, predictor)
    }

    #[test]
    fn test_memory_growth_predicts_exhaustion() {
        let (store, predictor) = predictor();
        let values: Vec<f64> = (0..10).map(|i| 100.0 + 10.0 * i as f64).collect();
        let predictions = predictor.predict_issues(&report_for(MetricCategory::Memory, &values));

        assert_eq!(predictions.len(), 1);
        let p = &predictions[0];
        assert_eq!(p.predicted_issue, "memory exhaustion");
        assert_eq!(p.time_to_impact, "~10 minutes");
        assert_eq!(p.source_pattern, "memory:linear_growth");
        assert!(p.confidence <= DEFAULT_CONFIDENCE_SCALE);
        assert_eq!(store.count_predictions(true).unwrap(), 1);
    }

    #[test]
    fn test_stable_windows_predict_nothing() {
        let (_, predictor) = predictor();
        let flat = [50.0; 10];
        for category in MetricCategory::ALL {
            assert!(predictor.predict_issues(&report_for(category, &flat)).is_empty());
        }
    }

    #[test]
    fn test_error_cascade_is_imminent_and_critical() {
        let (_, predictor) = predictor();
        let values = [0.01, 0.02, 0.03, 0.04, 0.05, 0.06, 0.07, 0.08];
        let predictions = predictor.predict_issues(&report_for(MetricCategory::ErrorRate, &values));
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].time_to_impact, "imminent");
        assert_eq!(predictions[0].severity, Severity::Critical);
    }

    #[test]
    fn test_cpu_horizon_depends_on_pattern() {
        let (_, predictor) = predictor();
        let sustained = [90.0, 91.0, 89.0, 90.0, 92.0, 90.0];
        let p = predictor.predict_issues(&report_for(MetricCategory::Cpu, &sustained));
        assert_eq!(p[0].time_to_impact, "~5 minutes");

        let rising: Vec<f64> = (0..10).map(|i| 20.0 + 3.0 * i as f64).collect();
        let p = predictor.predict_issues(&report_for(MetricCategory::Cpu, &rising));
        assert_eq!(p[0].time_to_impact, "~20 minutes");
    }

    #[test]
    fn test_apply_preventive_fix() {
        let (store, predictor) = predictor();
        let values: Vec<f64> = (0..10).map(|i| 10.0 + 2.0 * i as f64).collect();
        let id = predictor.predict_issues(&report_for(MetricCategory::Connections, &values))[0]
            .id
            .clone();

        assert!(predictor.apply_preventive_fix(&id, "pool recycled"));
        assert!(!predictor.apply_preventive_fix("pred-unknown", "n/a"));
        assert!(!predictor.apply_preventive_fix(&id, "applied again"));
        assert!(predictor.active_predictions().is_empty());
        let stored = store.get_prediction(&id).unwrap().unwrap();
        assert_eq!(stored.outcome.as_deref(), Some("pool recycled"));
    }
}
