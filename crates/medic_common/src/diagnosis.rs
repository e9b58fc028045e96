//! Diagnosis - classify the primary issue and rank repair options
//!
//! Ranking combines three sources for the primary issue's category:
//! curated patterns with a resolution, learned knowledge entries (weighted by
//! success rate) and a fixed table of generic fallbacks, so a classified
//! issue always has at least one option.

use crate::ids::IdFactory;
use crate::store::RepairStore;
use crate::types::{FixKind, HealthReport, Issue, MetricCategory, OptionSource, RepairOption};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Issues ordered most urgent first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub classified: bool,
    pub primary_issue: Option<Issue>,
    pub all_issues: Vec<Issue>,
}

impl Classification {
    pub fn unclassified() -> Self {
        Self {
            classified: false,
            primary_issue: None,
            all_issues: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub classification: Classification,
    pub options: Vec<RepairOption>,
    pub recommended_action: Option<RepairOption>,
}

impl Diagnosis {
    /// Knowledge key of the primary issue, "unknown" when unclassified
    pub fn issue_type(&self) -> String {
        self.classification
            .primary_issue
            .as_ref()
            .map(Issue::issue_type)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Generic fallback fixes per category: (fix, description, confidence)
fn generic_fixes(category: MetricCategory) -> &'static [(FixKind, &'static str, f64)] {
    match category {
        MetricCategory::Memory => &[
            (FixKind::ReclaimMemory, "Reclaim memory (release pools, compact heaps)", 0.4),
            (FixKind::ClearCaches, "Drop in-process caches", 0.3),
            (FixKind::RestartComponent, "Restart the leaking component", 0.2),
        ],
        MetricCategory::Latency => &[
            (FixKind::ShedLoad, "Shed load until latency recovers", 0.4),
            (FixKind::ClearCaches, "Clear stale response caches", 0.3),
            (FixKind::RestartComponent, "Restart the slow component", 0.2),
        ],
        MetricCategory::ErrorRate => &[
            (
                FixKind::EnableCircuitBreaker,
                "Open the circuit breaker on failing dependencies",
                0.4,
            ),
            (FixKind::RestartComponent, "Restart the failing component", 0.3),
        ],
        MetricCategory::Connections => &[
            (FixKind::ResetConnectionPool, "Reset the connection pool", 0.4),
            (FixKind::RestartComponent, "Restart the component holding connections", 0.2),
        ],
        MetricCategory::Cpu => &[
            (FixKind::ThrottleWorkload, "Throttle background workload", 0.4),
            (FixKind::ShedLoad, "Shed incoming load", 0.3),
        ],
    }
}

fn urgency(a: &Issue, b: &Issue) -> Ordering {
    b.analysis
        .severity
        .weight()
        .total_cmp(&a.analysis.severity.weight())
        .then_with(|| b.analysis.confidence.total_cmp(&a.analysis.confidence))
}

pub struct Diagnoser {
    store: Arc<dyn RepairStore>,
    ids: Arc<dyn IdFactory>,
}

impl Diagnoser {
    pub fn new(store: Arc<dyn RepairStore>, ids: Arc<dyn IdFactory>) -> Self {
        Self { store, ids }
    }

    /// Merge report issues with an optional reported issue, most urgent first
    pub fn classify_issue(&self, report: &HealthReport, extra: Option<Issue>) -> Classification {
        let mut all_issues: Vec<Issue> = report.issues.clone();
        all_issues.extend(extra);
        all_issues.sort_by(urgency);

        let primary_issue = all_issues.first().cloned();
        Classification {
            classified: primary_issue.is_some(),
            primary_issue,
            all_issues,
        }
    }

    /// Candidate fixes for the primary issue, highest confidence first.
    ///
    /// Lookup failures drop that source and keep going.
    pub fn rank_repair_options(&self, classification: &Classification) -> Vec<RepairOption> {
        let primary = classification
            .primary_issue
            .as_ref()
            .filter(|_| classification.classified);
        let Some(primary) = primary else {
            return vec![RepairOption::observation()];
        };
        let category = primary.category;
        let mut options = Vec::new();

        match self.store.patterns_for_category(category) {
            Ok(patterns) => {
                for pattern in patterns.into_iter().filter(|p| !p.resolution.trim().is_empty()) {
                    options.push(RepairOption {
                        fix: FixKind::infer(&pattern.resolution, category),
                        description: pattern.resolution,
                        confidence: pattern.confidence.clamp(0.0, 1.0),
                        category: Some(category),
                        source: OptionSource::Pattern { id: pattern.id },
                    });
                }
            }
            Err(e) => warn!("[DIAGNOSIS] Pattern lookup for {} failed: {}", category, e),
        }

        match self.store.knowledge_for_category(category) {
            Ok(entries) => {
                for entry in entries {
                    options.push(RepairOption {
                        fix: FixKind::infer(&entry.fix_description, category),
                        confidence: entry.success_rate(),
                        description: entry.fix_description,
                        category: Some(category),
                        source: OptionSource::Knowledge { id: entry.id },
                    });
                }
            }
            Err(e) => warn!("[DIAGNOSIS] Knowledge lookup for {} failed: {}", category, e),
        }

        for (fix, description, confidence) in generic_fixes(category) {
            options.push(RepairOption {
                fix: *fix,
                description: description.to_string(),
                confidence: *confidence,
                category: Some(category),
                source: OptionSource::Generic,
            });
        }

        // Stable: ties keep pattern > knowledge > generic order
        options.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        for option in &options {
            debug!(
                "[DIAGNOSIS] option {} ({:.2}): {}",
                option.fix, option.confidence, option.description
            );
        }
        options
    }

    pub fn diagnose(&self, report: &HealthReport, extra: Option<Issue>) -> Diagnosis {
        let classification = self.classify_issue(report, extra);
        let options = self.rank_repair_options(&classification);
        let recommended_action = options.first().cloned();

        let diagnosis = Diagnosis {
            id: self.ids.next_id("diag"),
            timestamp: Utc::now(),
            classification,
            options,
            recommended_action,
        };

        if diagnosis.classification.classified {
            info!(
                "[DIAGNOSIS] {} -> {} ({} options)",
                diagnosis.issue_type(),
                diagnosis
                    .recommended_action
                    .as_ref()
                    .map(|o| o.fix.as_str())
                    .unwrap_or("none"),
                diagnosis.options.len()
            );
        } else {
            debug!("[DIAGNOSIS] No actionable issue");
        }
        diagnosis
    }
}
