//! Metric Store - SQLite persistence for repair knowledge
//!
//! Holds the five tables the healing loop reads and writes:
//! - system_metrics_history: append-only metric samples
//! - repair_patterns: curated signatures and resolutions (immutable)
//! - repair_history: one row per repair attempt
//! - repair_predictions: precursor predictions and their outcome
//! - repair_knowledge: learned success/failure counters per issue type
//!
//! The core only talks to the `RepairStore` trait; `SqliteStore` is the
//! implementation the daemon and CLI use. All statements are parameterized.

use crate::error::{MedicResult, RepairError};
use crate::types::{
    KnowledgeEntry, MetricCategory, Prediction, RepairHistoryRecord, RepairOption, RepairPattern,
    Severity,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Default database path
pub const STORE_DB_PATH: &str = "/var/lib/medic/medic.db";

pub const SCHEMA_VERSION: i32 = 1;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS system_metrics_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    metric_name TEXT NOT NULL,
    value REAL NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_metrics_name_time ON system_metrics_history(metric_name, timestamp);

CREATE TABLE IF NOT EXISTS repair_patterns (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    subcategory TEXT NOT NULL,
    name TEXT NOT NULL,
    signature TEXT NOT NULL,
    is_healthy BOOLEAN NOT NULL DEFAULT 0,
    resolution TEXT NOT NULL DEFAULT '',
    severity TEXT NOT NULL,
    confidence REAL NOT NULL,
    source_ref TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patterns_category ON repair_patterns(category);

CREATE TABLE IF NOT EXISTS repair_history (
    id TEXT PRIMARY KEY,
    issue_type TEXT NOT NULL,
    symptoms TEXT NOT NULL,         -- JSON array
    severity TEXT NOT NULL,
    diagnosis TEXT NOT NULL,        -- JSON snapshot
    repair_option TEXT,             -- JSON option, null if none chosen
    fix_description TEXT NOT NULL,
    success BOOLEAN NOT NULL,
    repair_time_ms INTEGER NOT NULL,
    rollback_needed BOOLEAN NOT NULL DEFAULT 0,
    verified BOOLEAN NOT NULL DEFAULT 0,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_time ON repair_history(timestamp);

CREATE TABLE IF NOT EXISTS repair_predictions (
    id TEXT PRIMARY KEY,
    predicted_issue TEXT NOT NULL,
    category TEXT NOT NULL,
    severity TEXT NOT NULL,
    confidence REAL NOT NULL,
    time_to_impact TEXT NOT NULL,
    preventive_action TEXT NOT NULL,
    applied BOOLEAN NOT NULL DEFAULT 0,
    outcome TEXT,
    source_pattern TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repair_knowledge (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    issue_type TEXT NOT NULL,       -- not unique: duplicates are audited by compaction
    symptoms TEXT NOT NULL,         -- JSON array
    fix_description TEXT NOT NULL,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    avg_repair_time_ms REAL NOT NULL DEFAULT 0,
    last_used_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_knowledge_issue ON repair_knowledge(issue_type);
CREATE INDEX IF NOT EXISTS idx_knowledge_category ON repair_knowledge(category);
"#;

/// Aggregate repair counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairTotals {
    pub total: u64,
    pub successful: u64,
    pub avg_repair_time_ms: f64,
}

/// Parameterized access to the repair tables.
///
/// Implementations must be safe to share between the heartbeat task and
/// concurrent metric producers.
pub trait RepairStore: Send + Sync {
    fn record_metric_sample(&self, name: &str, value: f64, at: DateTime<Utc>) -> MedicResult<()>;
    fn prune_metric_history(&self, older_than: DateTime<Utc>) -> MedicResult<u64>;

    fn insert_pattern(&self, pattern: &RepairPattern) -> MedicResult<()>;
    fn patterns_for_category(&self, category: MetricCategory) -> MedicResult<Vec<RepairPattern>>;
    fn count_patterns(&self) -> MedicResult<u64>;

    fn insert_repair(&self, record: &RepairHistoryRecord) -> MedicResult<()>;
    fn get_repair(&self, id: &str) -> MedicResult<Option<RepairHistoryRecord>>;
    fn recent_repairs(&self, limit: usize) -> MedicResult<Vec<RepairHistoryRecord>>;
    /// Returns false when no repair has this id
    fn set_repair_verified(&self, id: &str, verified: bool) -> MedicResult<bool>;
    fn repair_totals(&self) -> MedicResult<RepairTotals>;

    fn insert_prediction(&self, prediction: &Prediction) -> MedicResult<()>;
    fn get_prediction(&self, id: &str) -> MedicResult<Option<Prediction>>;
    fn active_predictions(&self) -> MedicResult<Vec<Prediction>>;
    /// Returns false when no prediction has this id
    /// Applied is a one-way transition: false if unknown or already applied
    fn mark_prediction_applied(&self, id: &str, outcome: &str) -> MedicResult<bool>;
    fn count_predictions(&self, active_only: bool) -> MedicResult<u64>;

    fn insert_knowledge(&self, entry: &KnowledgeEntry) -> MedicResult<()>;
    fn update_knowledge(&self, entry: &KnowledgeEntry) -> MedicResult<()>;
    /// Entries for an issue type, highest success_count first
    fn knowledge_for_issue(&self, issue_type: &str) -> MedicResult<Vec<KnowledgeEntry>>;
    fn knowledge_for_category(&self, category: MetricCategory) -> MedicResult<Vec<KnowledgeEntry>>;
    fn all_knowledge(&self) -> MedicResult<Vec<KnowledgeEntry>>;
}

/// SQLite-backed store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the default path
    pub fn open() -> MedicResult<Self> {
        Self::open_at(STORE_DB_PATH)
    }

    /// Open at a specific path (daemon config or tests)
    pub fn open_at<P: AsRef<Path>>(path: P) -> MedicResult<Self> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RepairError::Config(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open(path_ref)?;
        // WAL lets medicctl read while the daemon writes
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = Self::init(conn)?;
        info!("[STORE] Opened repair store at {}", path_ref.display());
        Ok(store)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> MedicResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> MedicResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;

        let version_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
                [SCHEMA_VERSION],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !version_exists {
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![SCHEMA_VERSION, Utc::now().to_rfc3339()],
            )?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MedicResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepairError::StorePoisoned)
    }

    fn count(&self, sql: &str) -> MedicResult<u64> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn conversion_error(e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_time(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(conversion_error)
}

fn parse_json<T: serde::de::DeserializeOwned>(s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s).map_err(conversion_error)
}

fn parse_category(s: &str) -> rusqlite::Result<MetricCategory> {
    MetricCategory::from_name(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown category '{}'", s).into(),
        )
    })
}

fn parse_severity(s: &str) -> rusqlite::Result<Severity> {
    Severity::parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown severity '{}'", s).into(),
        )
    })
}

const PATTERN_COLUMNS: &str = "id, category, subcategory, name, signature, is_healthy, \
    resolution, severity, confidence, source_ref, created_at";

fn pattern_from_row(row: &Row<'_>) -> rusqlite::Result<RepairPattern> {
    Ok(RepairPattern {
        id: row.get(0)?,
        category: parse_category(&row.get::<_, String>(1)?)?,
        subcategory: row.get(2)?,
        name: row.get(3)?,
        signature: row.get(4)?,
        is_healthy: row.get(5)?,
        resolution: row.get(6)?,
        severity: parse_severity(&row.get::<_, String>(7)?)?,
        confidence: row.get(8)?,
        source_ref: row.get(9)?,
        created_at: parse_time(&row.get::<_, String>(10)?)?,
    })
}

const REPAIR_COLUMNS: &str = "id, issue_type, symptoms, severity, diagnosis, repair_option, \
    fix_description, success, repair_time_ms, rollback_needed, verified, timestamp";

fn repair_from_row(row: &Row<'_>) -> rusqlite::Result<RepairHistoryRecord> {
    let option: Option<String> = row.get(5)?;
    let repair_option: Option<RepairOption> =
        option.as_deref().map(parse_json::<RepairOption>).transpose()?;
    Ok(RepairHistoryRecord {
        id: row.get(0)?,
        issue_type: row.get(1)?,
        symptoms: parse_json(&row.get::<_, String>(2)?)?,
        severity: parse_severity(&row.get::<_, String>(3)?)?,
        diagnosis: parse_json(&row.get::<_, String>(4)?)?,
        repair_option,
        fix_description: row.get(6)?,
        success: row.get(7)?,
        repair_time_ms: row.get::<_, i64>(8)? as u64,
        rollback_needed: row.get(9)?,
        verified: row.get(10)?,
        timestamp: parse_time(&row.get::<_, String>(11)?)?,
    })
}

const PREDICTION_COLUMNS: &str = "id, predicted_issue, category, severity, confidence, \
    time_to_impact, preventive_action, applied, outcome, source_pattern, timestamp";

fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<Prediction> {
    Ok(Prediction {
        id: row.get(0)?,
        predicted_issue: row.get(1)?,
        category: parse_category(&row.get::<_, String>(2)?)?,
        severity: parse_severity(&row.get::<_, String>(3)?)?,
        confidence: row.get(4)?,
        time_to_impact: row.get(5)?,
        preventive_action: row.get(6)?,
        applied: row.get(7)?,
        outcome: row.get(8)?,
        source_pattern: row.get(9)?,
        timestamp: parse_time(&row.get::<_, String>(10)?)?,
    })
}

const KNOWLEDGE_COLUMNS: &str = "id, category, issue_type, symptoms, fix_description, \
    success_count, failure_count, avg_repair_time_ms, last_used_at";

fn knowledge_from_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeEntry> {
    Ok(KnowledgeEntry {
        id: row.get(0)?,
        category: parse_category(&row.get::<_, String>(1)?)?,
        issue_type: row.get(2)?,
        symptoms: parse_json(&row.get::<_, String>(3)?)?,
        fix_description: row.get(4)?,
        success_count: row.get::<_, i64>(5)? as u64,
        failure_count: row.get::<_, i64>(6)? as u64,
        avg_repair_time_ms: row.get(7)?,
        last_used_at: parse_time(&row.get::<_, String>(8)?)?,
    })
}

// ============================================================================
// RepairStore implementation
// ============================================================================

impl RepairStore for SqliteStore {
    fn record_metric_sample(&self, name: &str, value: f64, at: DateTime<Utc>) -> MedicResult<()> {
        self.conn()?.execute(
            "INSERT INTO system_metrics_history (metric_name, value, timestamp)
             VALUES (?1, ?2, ?3)",
            params![name, value, at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn prune_metric_history(&self, older_than: DateTime<Utc>) -> MedicResult<u64> {
        let deleted = self.conn()?.execute(
            "DELETE FROM system_metrics_history WHERE timestamp < ?1",
            params![older_than.to_rfc3339()],
        )?;
        Ok(deleted as u64)
    }

    fn insert_pattern(&self, pattern: &RepairPattern) -> MedicResult<()> {
        self.conn()?.execute(
            &format!(
                "INSERT INTO repair_patterns ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                PATTERN_COLUMNS
            ),
            params![
                pattern.id,
                pattern.category.as_str(),
                pattern.subcategory,
                pattern.name,
                pattern.signature,
                pattern.is_healthy,
                pattern.resolution,
                pattern.severity.as_str(),
                pattern.confidence,
                pattern.source_ref,
                pattern.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn patterns_for_category(&self, category: MetricCategory) -> MedicResult<Vec<RepairPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repair_patterns WHERE category = ?1 ORDER BY confidence DESC",
            PATTERN_COLUMNS
        ))?;
        let rows = stmt.query_map(params![category.as_str()], pattern_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn count_patterns(&self) -> MedicResult<u64> {
        self.count("SELECT COUNT(*) FROM repair_patterns")
    }

    fn insert_repair(&self, record: &RepairHistoryRecord) -> MedicResult<()> {
        let symptoms = serde_json::to_string(&record.symptoms)?;
        let diagnosis = serde_json::to_string(&record.diagnosis)?;
        let option = record
            .repair_option
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn()?.execute(
            &format!(
                "INSERT INTO repair_history ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                REPAIR_COLUMNS
            ),
            params![
                record.id,
                record.issue_type,
                symptoms,
                record.severity.as_str(),
                diagnosis,
                option,
                record.fix_description,
                record.success,
                record.repair_time_ms as i64,
                record.rollback_needed,
                record.verified,
                record.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_repair(&self, id: &str) -> MedicResult<Option<RepairHistoryRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM repair_history WHERE id = ?1", REPAIR_COLUMNS),
                params![id],
                repair_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn recent_repairs(&self, limit: usize) -> MedicResult<Vec<RepairHistoryRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repair_history ORDER BY timestamp DESC LIMIT ?1",
            REPAIR_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], repair_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn set_repair_verified(&self, id: &str, verified: bool) -> MedicResult<bool> {
        let changed = self.conn()?.execute(
            "UPDATE repair_history SET verified = ?2 WHERE id = ?1",
            params![id, verified],
        )?;
        Ok(changed > 0)
    }

    fn repair_totals(&self) -> MedicResult<RepairTotals> {
        let conn = self.conn()?;
        let totals = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN success THEN 1 ELSE 0 END), 0),
                    COALESCE(AVG(repair_time_ms), 0)
             FROM repair_history",
            [],
            |row| {
                Ok(RepairTotals {
                    total: row.get::<_, i64>(0)? as u64,
                    successful: row.get::<_, i64>(1)? as u64,
                    avg_repair_time_ms: row.get::<_, f64>(2)?,
                })
            },
        )?;
        Ok(totals)
    }

    fn insert_prediction(&self, prediction: &Prediction) -> MedicResult<()> {
        self.conn()?.execute(
            &format!(
                "INSERT INTO repair_predictions ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                PREDICTION_COLUMNS
            ),
            params![
                prediction.id,
                prediction.predicted_issue,
                prediction.category.as_str(),
                prediction.severity.as_str(),
                prediction.confidence,
                prediction.time_to_impact,
                prediction.preventive_action,
                prediction.applied,
                prediction.outcome,
                prediction.source_pattern,
                prediction.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_prediction(&self, id: &str) -> MedicResult<Option<Prediction>> {
        let conn = self.conn()?;
        let prediction = conn
            .query_row(
                &format!("SELECT {} FROM repair_predictions WHERE id = ?1", PREDICTION_COLUMNS),
                params![id],
                prediction_from_row,
            )
            .optional()?;
        Ok(prediction)
    }

    fn active_predictions(&self) -> MedicResult<Vec<Prediction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repair_predictions WHERE applied = 0 ORDER BY timestamp DESC",
            PREDICTION_COLUMNS
        ))?;
        let rows = stmt.query_map([], prediction_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn mark_prediction_applied(&self, id: &str, outcome: &str) -> MedicResult<bool> {
        let changed = self.conn()?.execute(
            "UPDATE repair_predictions SET applied = 1, outcome = ?2 WHERE id = ?1 AND applied = 0",
            params![id, outcome],
        )?;
        Ok(changed > 0)
    }

    fn count_predictions(&self, active_only: bool) -> MedicResult<u64> {
        if active_only {
            self.count("SELECT COUNT(*) FROM repair_predictions WHERE applied = 0")
        } else {
            self.count("SELECT COUNT(*) FROM repair_predictions")
        }
    }

    fn insert_knowledge(&self, entry: &KnowledgeEntry) -> MedicResult<()> {
        let symptoms = serde_json::to_string(&entry.symptoms)?;
        self.conn()?.execute(
            &format!(
                "INSERT INTO repair_knowledge ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                KNOWLEDGE_COLUMNS
            ),
            params![
                entry.id,
                entry.category.as_str(),
                entry.issue_type,
                symptoms,
                entry.fix_description,
                entry.success_count as i64,
                entry.failure_count as i64,
                entry.avg_repair_time_ms,
                entry.last_used_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update_knowledge(&self, entry: &KnowledgeEntry) -> MedicResult<()> {
        let symptoms = serde_json::to_string(&entry.symptoms)?;
        let changed = self.conn()?.execute(
            "UPDATE repair_knowledge
             SET symptoms = ?2, fix_description = ?3, success_count = ?4, failure_count = ?5,
                 avg_repair_time_ms = ?6, last_used_at = ?7
             WHERE id = ?1",
            params![
                entry.id,
                symptoms,
                entry.fix_description,
                entry.success_count as i64,
                entry.failure_count as i64,
                entry.avg_repair_time_ms,
                entry.last_used_at.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(RepairError::NotFound(format!("knowledge entry {}", entry.id)));
        }
        Ok(())
    }

    fn knowledge_for_issue(&self, issue_type: &str) -> MedicResult<Vec<KnowledgeEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repair_knowledge WHERE issue_type = ?1
             ORDER BY success_count DESC, last_used_at DESC",
            KNOWLEDGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![issue_type], knowledge_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn knowledge_for_category(&self, category: MetricCategory) -> MedicResult<Vec<KnowledgeEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repair_knowledge WHERE category = ?1 ORDER BY success_count DESC",
            KNOWLEDGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![category.as_str()], knowledge_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn all_knowledge(&self) -> MedicResult<Vec<KnowledgeEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repair_knowledge ORDER BY issue_type, success_count DESC",
            KNOWLEDGE_COLUMNS
        ))?;
        let rows = stmt.query_map([], knowledge_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FixKind, OptionSource};
    use tempfile::NamedTempFile;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn knowledge(id: &str, issue_type: &str, success: u64) -> KnowledgeEntry {
        KnowledgeEntry {
            id: id.to_string(),
            category: MetricCategory::Memory,
            issue_type: issue_type.to_string(),
            symptoms: vec!["rss climbing".to_string()],
            fix_description: "reclaim_memory".to_string(),
            success_count: success,
            failure_count: 0,
            avg_repair_time_ms: 40.0,
            last_used_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_at_path_is_reopenable() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let store = SqliteStore::open_at(tmp.path()).unwrap();
            store.record_metric_sample("memory", 120.0, Utc::now()).unwrap();
        }
        let store = SqliteStore::open_at(tmp.path()).unwrap();
        assert_eq!(store.count_patterns().unwrap(), 0);
    }

    #[test]
    fn test_pattern_round_trip_by_category() {
        let store = test_store();
        let pattern = RepairPattern {
            id: "p1".into(),
            category: MetricCategory::Latency,
            subcategory: "gradual_degradation".into(),
            name: "slow upstream".into(),
            signature: "latency rising with stable load".into(),
            is_healthy: false,
            resolution: "clear response cache".into(),
            severity: Severity::Medium,
            confidence: 0.7,
            source_ref: Some("runbook/latency".into()),
            created_at: Utc::now(),
        };
        store.insert_pattern(&pattern).unwrap();

        let found = store.patterns_for_category(MetricCategory::Latency).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "slow upstream");
        assert_eq!(found[0].severity, Severity::Medium);
        assert!(store.patterns_for_category(MetricCategory::Cpu).unwrap().is_empty());
    }

    #[test]
    fn test_repair_history_and_verification() {
        let store = test_store();
        let record = RepairHistoryRecord {
            id: "r1".into(),
            issue_type: "memory:linear_growth".into(),
            symptoms: vec!["memory linear_growth".into()],
            severity: Severity::High,
            diagnosis: serde_json::json!({"id": "d1"}),
            repair_option: Some(RepairOption {
                fix: FixKind::ReclaimMemory,
                description: "reclaim".into(),
                confidence: 0.4,
                category: Some(MetricCategory::Memory),
                source: OptionSource::Generic,
            }),
            fix_description: "reclaimed".into(),
            success: true,
            repair_time_ms: 25,
            rollback_needed: false,
            verified: false,
            timestamp: Utc::now(),
        };
        store.insert_repair(&record).unwrap();

        assert!(store.set_repair_verified("r1", true).unwrap());
        assert!(!store.set_repair_verified("missing", true).unwrap());

        let loaded = store.get_repair("r1").unwrap().unwrap();
        assert!(loaded.verified);
        assert_eq!(loaded.repair_option, record.repair_option);
        assert_eq!(loaded.symptoms, record.symptoms);

        let totals = store.repair_totals().unwrap();
        assert_eq!(totals.total, 1);
        assert_eq!(totals.successful, 1);
        assert_eq!(totals.avg_repair_time_ms, 25.0);
    }

    #[test]
    fn test_prediction_lifecycle() {
        let store = test_store();
        let prediction = Prediction {
            id: "pred1".into(),
            predicted_issue: "memory exhaustion".into(),
            category: MetricCategory::Memory,
            severity: Severity::High,
            confidence: 0.5,
            time_to_impact: "~8 minutes".into(),
            preventive_action: "reclaim_memory".into(),
            applied: false,
            outcome: None,
            source_pattern: "memory:linear_growth".into(),
            timestamp: Utc::now(),
        };
        store.insert_prediction(&prediction).unwrap();
        assert_eq!(store.count_predictions(true).unwrap(), 1);

        assert!(store.mark_prediction_applied("pred1", "cache flushed").unwrap());
        assert!(!store.mark_prediction_applied("nope", "x").unwrap());
        assert!(!store.mark_prediction_applied("pred1", "second").unwrap());

        let loaded = store.get_prediction("pred1").unwrap().unwrap();
        assert!(loaded.applied);
        assert_eq!(loaded.outcome.as_deref(), Some("cache flushed"));
        assert_eq!(store.count_predictions(true).unwrap(), 0);
        assert_eq!(store.count_predictions(false).unwrap(), 1);
        assert!(store.active_predictions().unwrap().is_empty());
    }

    #[test]
    fn test_knowledge_ordering_and_update() {
        let store = test_store();
        store.insert_knowledge(&knowledge("k1", "memory:spike", 1)).unwrap();
        store.insert_knowledge(&knowledge("k2", "memory:spike", 5)).unwrap();

        let entries = store.knowledge_for_issue("memory:spike").unwrap();
        assert_eq!(entries[0].id, "k2");

        let mut updated = entries[1].clone();
        updated.failure_count = 2;
        store.update_knowledge(&updated).unwrap();
        let entries = store.knowledge_for_category(MetricCategory::Memory).unwrap();
        assert_eq!(entries.iter().find(|e| e.id == "k1").unwrap().failure_count, 2);

        let missing = knowledge("k9", "memory:spike", 0);
        assert!(matches!(store.update_knowledge(&missing), Err(RepairError::NotFound(_))));
    }

    #[test]
    fn test_prune_metric_history() {
        let store = test_store();
        let old = Utc::now() - chrono::Duration::days(40);
        store.record_metric_sample("cpu", 10.0, old).unwrap();
        store.record_metric_sample("cpu", 12.0, Utc::now()).unwrap();

        let deleted = store
            .prune_metric_history(Utc::now() - chrono::Duration::days(30))
            .unwrap();
        assert_eq!(deleted, 1);
    }
}
