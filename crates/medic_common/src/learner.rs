//! Learner - knowledge base updates from completed repairs
//!
//! Every attempted repair bumps the success or failure counter of the
//! knowledge entry for its issue type (creating the entry on first sight).
//! The average repair time is a running mean over successful repairs only.
//!
//! Also hosts the operator-facing knowledge operations: manual pattern
//! submission, the compaction audit and aggregate statistics.

use crate::diagnosis::Diagnosis;
use crate::error::MedicResult;
use crate::executor::RepairResult;
use crate::ids::IdFactory;
use crate::store::RepairStore;
use crate::types::{KnowledgeEntry, MetricCategory, RepairPattern, Severity};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Operator-curated pattern with its resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSubmission {
    pub category: MetricCategory,
    pub subcategory: String,
    pub name: String,
    pub symptoms: Vec<String>,
    pub resolution: String,
    pub severity: Severity,
    pub confidence: f64,
    #[serde(default)]
    pub source_ref: Option<String>,
}

/// Outcome of the compaction audit. Nothing is deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionReport {
    pub total_entries: usize,
    pub issue_types: usize,
    /// Issue types with more than one entry
    pub duplicate_groups: usize,
    /// Non-canonical entries that a merge would remove
    pub compressible: usize,
    /// issue_type -> id of the entry with the highest success_count
    pub canonical: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairStats {
    pub patterns: u64,
    pub repairs_total: u64,
    pub repairs_successful: u64,
    pub repairs_failed: u64,
    pub success_rate: f64,
    pub avg_repair_time_ms: f64,
    pub predictions_total: u64,
    pub predictions_active: u64,
    pub knowledge_entries: u64,
}

pub struct Learner {
    store: Arc<dyn RepairStore>,
    ids: Arc<dyn IdFactory>,
}

impl Learner {
    pub fn new(store: Arc<dyn RepairStore>, ids: Arc<dyn IdFactory>) -> Self {
        Self { store, ids }
    }

    /// Fold one repair into the knowledge base.
    ///
    /// Returns the entry as written, or None when nothing was learned
    /// (unattempted repair, unclassified diagnosis, store failure).
    pub fn learn_from_repair(
        &self,
        result: &RepairResult,
        diagnosis: &Diagnosis,
    ) -> Option<KnowledgeEntry> {
        if !result.attempted {
            debug!("[LEARNER] Skipping unattempted repair");
            return None;
        }
        let category = diagnosis.classification.primary_issue.as_ref()?.category;
        let issue_type = diagnosis.issue_type();

        let existing = match self.store.knowledge_for_issue(&issue_type) {
            Ok(entries) => entries.into_iter().next(),
            Err(e) => {
                warn!("[LEARNER] Knowledge lookup for {} failed: {}", issue_type, e);
                return None;
            }
        };

        let written = match existing {
            Some(mut entry) => {
                if result.success {
                    let old = entry.success_count as f64;
                    entry.success_count += 1;
                    let total = entry.avg_repair_time_ms * old + result.repair_time_ms as f64;
                    entry.avg_repair_time_ms = total / entry.success_count as f64;
                } else {
                    entry.failure_count += 1;
                }
                entry.last_used_at = Utc::now();
                self.store.update_knowledge(&entry).map(|_| entry)
            }
            None => {
                let entry = self.seed_entry(category, issue_type.clone(), result, diagnosis);
                self.store.insert_knowledge(&entry).map(|_| entry)
            }
        };

        match written {
            Ok(entry) => {
                info!(
                    "[LEARNER] {}: {} ok / {} failed, avg {:.0}ms",
                    entry.issue_type,
                    entry.success_count,
                    entry.failure_count,
                    entry.avg_repair_time_ms
                );
                Some(entry)
            }
            Err(e) => {
                warn!("[LEARNER] Failed to record knowledge for {}: {}", issue_type, e);
                None
            }
        }
    }

    fn seed_entry(
        &self,
        category: MetricCategory,
        issue_type: String,
        result: &RepairResult,
        diagnosis: &Diagnosis,
    ) -> KnowledgeEntry {
        let fix_description = result
            .option
            .as_ref()
            .map(|o| o.fix.to_string())
            .unwrap_or_else(|| category.primary_fix().to_string());
        let symptoms = diagnosis
            .classification
            .all_issues
            .iter()
            .map(|i| format!("{} {}", i.category, i.analysis.pattern))
            .collect();

        KnowledgeEntry {
            id: self.ids.next_id("kn"),
            category,
            issue_type,
            symptoms,
            fix_description,
            success_count: u64::from(result.success),
            failure_count: u64::from(!result.success),
            avg_repair_time_ms: if result.success { result.repair_time_ms as f64 } else { 0.0 },
            last_used_at: Utc::now(),
        }
    }

    /// Group knowledge by issue type and count what a merge would collapse
    pub fn compress_repair_knowledge(&self) -> CompressionReport {
        let entries = match self.store.all_knowledge() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("[LEARNER] Compaction audit could not read knowledge: {}", e);
                return CompressionReport::default();
            }
        };

        let mut groups: BTreeMap<String, Vec<KnowledgeEntry>> = BTreeMap::new();
        for entry in entries.iter() {
            groups.entry(entry.issue_type.clone()).or_default().push(entry.clone());
        }

        let mut report = CompressionReport {
            total_entries: entries.len(),
            issue_types: groups.len(),
            ..Default::default()
        };

        for (issue_type, group) in groups {
            // First entry wins ties
            let canonical = group
                .iter()
                .fold(None::<&KnowledgeEntry>, |best, e| match best {
                    Some(b) if b.success_count >= e.success_count => Some(b),
                    _ => Some(e),
                });
            if let Some(c) = canonical {
                report.canonical.insert(issue_type, c.id.clone());
            }
            if group.len() > 1 {
                report.duplicate_groups += 1;
                report.compressible += group.len() - 1;
            }
        }

        info!(
            "[LEARNER] Compaction audit: {} entries, {} issue types, {} compressible",
            report.total_entries, report.issue_types, report.compressible
        );
        report
    }

    /// Aggregate counts. Each read that fails counts as 0.
    pub fn get_repair_stats(&self) -> RepairStats {
        fn or_zero<T: Default>(what: &str, r: MedicResult<T>) -> T {
            r.unwrap_or_else(|e| {
                warn!("[LEARNER] Stats read '{}' failed: {}", what, e);
                T::default()
            })
        }

        let totals = or_zero("repairs", self.store.repair_totals());
        let knowledge_entries =
            or_zero("knowledge", self.store.all_knowledge().map(|k| k.len() as u64));
        let success_rate = if totals.total == 0 {
            0.0
        } else {
            totals.successful as f64 / totals.total as f64
        };

        RepairStats {
            patterns: or_zero("patterns", self.store.count_patterns()),
            repairs_total: totals.total,
            repairs_successful: totals.successful,
            repairs_failed: totals.total.saturating_sub(totals.successful),
            success_rate,
            avg_repair_time_ms: totals.avg_repair_time_ms,
            predictions_total: or_zero("predictions", self.store.count_predictions(false)),
            predictions_active: or_zero("active predictions", self.store.count_predictions(true)),
            knowledge_entries,
        }
    }

    /// Store an operator pattern plus a seed knowledge entry for it
    pub fn submit_error_pattern(
        &self,
        submission: PatternSubmission,
    ) -> MedicResult<(RepairPattern, KnowledgeEntry)> {
        let now = Utc::now();
        let pattern = RepairPattern {
            id: self.ids.next_id("pat"),
            category: submission.category,
            subcategory: submission.subcategory.clone(),
            name: submission.name.clone(),
            signature: submission.symptoms.join("; "),
            is_healthy: false,
            resolution: submission.resolution.clone(),
            severity: submission.severity,
            confidence: submission.confidence.clamp(0.0, 1.0),
            source_ref: submission.source_ref.clone(),
            created_at: now,
        };
        self.store.insert_pattern(&pattern)?;

        let knowledge = KnowledgeEntry {
            id: self.ids.next_id("kn"),
            category: submission.category,
            issue_type: format!("{}:{}", submission.category, submission.subcategory),
            symptoms: submission.symptoms,
            fix_description: submission.resolution,
            success_count: 1,
            failure_count: 0,
            avg_repair_time_ms: 0.0,
            last_used_at: now,
        };
        self.store.insert_knowledge(&knowledge)?;

        info!("[LEARNER] Submitted pattern '{}' ({})", pattern.name, knowledge.issue_type);
        Ok((pattern, knowledge))
    }
}
