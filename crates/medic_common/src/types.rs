//! Core data types for Medic
//!
//! Metric categories, severities, detected patterns and the records that
//! flow between the monitor, diagnosis, executor, predictor and learner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Metric categories
// ============================================================================

/// Category of a tracked runtime metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Memory,
    Latency,
    ErrorRate,
    Connections,
    Cpu,
}

impl MetricCategory {
    pub const ALL: [MetricCategory; 5] = [
        MetricCategory::Memory,
        MetricCategory::Latency,
        MetricCategory::ErrorRate,
        MetricCategory::Connections,
        MetricCategory::Cpu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Memory => "memory",
            MetricCategory::Latency => "latency",
            MetricCategory::ErrorRate => "error_rate",
            MetricCategory::Connections => "connections",
            MetricCategory::Cpu => "cpu",
        }
    }

    /// Map a reported metric name to its category.
    ///
    /// Accepts the canonical names plus the aliases hosts commonly report.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "memory" | "mem" | "heap_used" | "heap_used_mb" | "rss" | "rss_mb" => {
                Some(MetricCategory::Memory)
            }
            "latency" | "latency_ms" | "response_time" | "response_time_ms" => {
                Some(MetricCategory::Latency)
            }
            "error_rate" | "errorrate" | "errors" => Some(MetricCategory::ErrorRate),
            "connections" | "active_connections" | "conns" => Some(MetricCategory::Connections),
            "cpu" | "cpu_percent" | "cpu_usage" => Some(MetricCategory::Cpu),
            _ => None,
        }
    }

    /// Fix kind tried first when nothing more specific is known
    pub fn primary_fix(&self) -> FixKind {
        match self {
            MetricCategory::Memory => FixKind::ReclaimMemory,
            MetricCategory::Latency => FixKind::ShedLoad,
            MetricCategory::ErrorRate => FixKind::EnableCircuitBreaker,
            MetricCategory::Connections => FixKind::ResetConnectionPool,
            MetricCategory::Cpu => FixKind::ThrottleWorkload,
        }
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Ordered severity: info < low < medium < high < critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Ranking weight used when ordering issues
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Critical => 1.0,
            Severity::High => 0.75,
            Severity::Medium => 0.5,
            Severity::Low => 0.25,
            Severity::Info => 0.1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" => Some(Severity::Info),
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// Statistical pattern recognized in a metric window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    // Memory
    Spike,
    Sawtooth,
    Fragmentation,
    LinearGrowth,
    // Latency
    SuddenJump,
    PeriodicSpikes,
    GradualDegradation,
    // Error rate
    #[serde(rename = "none")]
    NoErrors,
    Burst,
    Cascading,
    SteadyElevated,
    Isolated,
    // Connections
    Leak,
    Thrashing,
    Saturation,
    // CPU
    SustainedHigh,
    GradualIncrease,
    // Baselines
    Stable,
    Normal,
}

impl Pattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Spike => "spike",
            Pattern::Sawtooth => "sawtooth",
            Pattern::Fragmentation => "fragmentation",
            Pattern::LinearGrowth => "linear_growth",
            Pattern::SuddenJump => "sudden_jump",
            Pattern::PeriodicSpikes => "periodic_spikes",
            Pattern::GradualDegradation => "gradual_degradation",
            Pattern::NoErrors => "none",
            Pattern::Burst => "burst",
            Pattern::Cascading => "cascading",
            Pattern::SteadyElevated => "steady_elevated",
            Pattern::Isolated => "isolated",
            Pattern::Leak => "leak",
            Pattern::Thrashing => "thrashing",
            Pattern::Saturation => "saturation",
            Pattern::SustainedHigh => "sustained_high",
            Pattern::GradualIncrease => "gradual_increase",
            Pattern::Stable => "stable",
            Pattern::Normal => "normal",
        }
    }

    /// True for the "nothing detected" pattern of each category
    pub fn is_baseline(&self) -> bool {
        matches!(self, Pattern::Stable | Pattern::Normal | Pattern::NoErrors)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics behind a pattern classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternDetails {
    pub sample_count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub relative_std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub direction_changes: usize,
    pub direction_change_ratio: f64,
    /// Mean of the window excluding the latest sample
    pub baseline_mean: f64,
    /// Standard deviation of the window excluding the latest sample
    pub baseline_std_dev: f64,
    pub insufficient_data: bool,
}

/// Result of running a category analyzer over one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub pattern: Pattern,
    /// Certainty in [0, 1]
    pub confidence: f64,
    pub severity: Severity,
    pub details: PatternDetails,
}

impl PatternAnalysis {
    pub fn new(
        pattern: Pattern,
        confidence: f64,
        severity: Severity,
        details: PatternDetails,
    ) -> Self {
        Self {
            pattern,
            confidence: confidence.clamp(0.0, 1.0),
            severity,
            details,
        }
    }
}

/// A non-info analysis attached to its category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub category: MetricCategory,
    pub analysis: PatternAnalysis,
    /// Supplied by an operator or host rather than detected by the monitor
    #[serde(default)]
    pub reported: bool,
}

impl Issue {
    pub fn detected(category: MetricCategory, analysis: PatternAnalysis) -> Self {
        Self {
            category,
            analysis,
            reported: false,
        }
    }

    /// Manually reported context issue
    pub fn reported(
        category: MetricCategory,
        pattern: Pattern,
        severity: Severity,
        confidence: f64,
    ) -> Self {
        Self {
            category,
            analysis: PatternAnalysis::new(
                pattern,
                confidence,
                severity,
                PatternDetails::default(),
            ),
            reported: true,
        }
    }

    /// Knowledge key for this issue, e.g. "memory:linear_growth"
    pub fn issue_type(&self) -> String {
        format!("{}:{}", self.category, self.analysis.pattern)
    }
}

/// Output of one monitor pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Time of the newest sample the report was computed from
    pub timestamp: DateTime<Utc>,
    /// No issue of medium or higher severity in any category
    pub healthy: bool,
    pub analyses: BTreeMap<MetricCategory, PatternAnalysis>,
    /// Analyses with severity above info
    pub issues: Vec<Issue>,
}

// ============================================================================
// Fix kinds and repair options
// ============================================================================

/// Closed set of corrective actions a host can implement.
///
/// `Observe` is the no-op default: continue monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
    Observe,
    ReclaimMemory,
    ClearCaches,
    RestartComponent,
    ShedLoad,
    EnableCircuitBreaker,
    ResetConnectionPool,
    ThrottleWorkload,
}

impl FixKind {
    pub const ALL: [FixKind; 8] = [
        FixKind::Observe,
        FixKind::ReclaimMemory,
        FixKind::ClearCaches,
        FixKind::RestartComponent,
        FixKind::ShedLoad,
        FixKind::EnableCircuitBreaker,
        FixKind::ResetConnectionPool,
        FixKind::ThrottleWorkload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FixKind::Observe => "observe",
            FixKind::ReclaimMemory => "reclaim_memory",
            FixKind::ClearCaches => "clear_caches",
            FixKind::RestartComponent => "restart_component",
            FixKind::ShedLoad => "shed_load",
            FixKind::EnableCircuitBreaker => "enable_circuit_breaker",
            FixKind::ResetConnectionPool => "reset_connection_pool",
            FixKind::ThrottleWorkload => "throttle_workload",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Map a free-text resolution to a fix kind by keyword.
    ///
    /// Falls back to the category's primary fix.
    pub fn infer(text: &str, category: MetricCategory) -> Self {
        let t = text.to_lowercase();
        if let Some(kind) = Self::parse(&t) {
            return kind;
        }
        if t.contains("cache") {
            FixKind::ClearCaches
        } else if t.contains("restart") || t.contains("reload") {
            FixKind::RestartComponent
        } else if t.contains("pool") || t.contains("connection") {
            FixKind::ResetConnectionPool
        } else if t.contains("circuit") || t.contains("breaker") {
            FixKind::EnableCircuitBreaker
        } else if t.contains("throttle") || t.contains("nice") {
            FixKind::ThrottleWorkload
        } else if t.contains("shed") || t.contains("rate limit") || t.contains("backpressure") {
            FixKind::ShedLoad
        } else if ["gc", "garbage", "reclaim", "free"].iter().any(|k| t.contains(k)) {
            FixKind::ReclaimMemory
        } else {
            category.primary_fix()
        }
    }
}

impl fmt::Display for FixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a ranked option came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptionSource {
    Observation,
    Pattern { id: String },
    Knowledge { id: String },
    Generic,
}

/// A candidate corrective action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOption {
    pub fix: FixKind,
    pub description: String,
    pub confidence: f64,
    pub category: Option<MetricCategory>,
    pub source: OptionSource,
}

impl RepairOption {
    /// The single option offered when nothing is wrong
    pub fn observation() -> Self {
        Self {
            fix: FixKind::Observe,
            description: "No actionable issue detected; continue monitoring".to_string(),
            confidence: 1.0,
            category: None,
            source: OptionSource::Observation,
        }
    }

    pub fn is_observation(&self) -> bool {
        self.fix == FixKind::Observe
    }
}

// ============================================================================
// Persisted records
// ============================================================================

/// Curated or learned signature with its resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPattern {
    pub id: String,
    pub category: MetricCategory,
    pub subcategory: String,
    pub name: String,
    pub signature: String,
    pub is_healthy: bool,
    pub resolution: String,
    pub severity: Severity,
    pub confidence: f64,
    pub source_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One repair attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairHistoryRecord {
    pub id: String,
    pub issue_type: String,
    pub symptoms: Vec<String>,
    pub severity: Severity,
    /// Full diagnosis snapshot as JSON
    pub diagnosis: serde_json::Value,
    pub repair_option: Option<RepairOption>,
    pub fix_description: String,
    pub success: bool,
    pub repair_time_ms: u64,
    pub rollback_needed: bool,
    pub verified: bool,
    pub timestamp: DateTime<Utc>,
}

/// Early warning emitted from a precursor signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub predicted_issue: String,
    pub category: MetricCategory,
    pub severity: Severity,
    pub confidence: f64,
    /// Human-readable estimate, e.g. "~30 minutes"
    pub time_to_impact: String,
    pub preventive_action: String,
    pub applied: bool,
    pub outcome: Option<String>,
    /// Precursor that fired, e.g. "memory:linear_growth"
    pub source_pattern: String,
    pub timestamp: DateTime<Utc>,
}

/// Success/failure weighted record of a fix for an issue type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub category: MetricCategory,
    pub issue_type: String,
    pub symptoms: Vec<String>,
    pub fix_description: String,
    pub success_count: u64,
    pub failure_count: u64,
    /// Mean repair time over successful repairs
    pub avg_repair_time_ms: f64,
    pub last_used_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    /// success / (success + failure), 0 when never used
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.0
        } else {
            self.success_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names_and_aliases() {
        for category in MetricCategory::ALL {
            assert_eq!(MetricCategory::from_name(category.as_str()), Some(category));
        }
        assert_eq!(MetricCategory::from_name("heap_used"), Some(MetricCategory::Memory));
        assert_eq!(MetricCategory::from_name("Response-Time-MS"), Some(MetricCategory::Latency));
        assert_eq!(MetricCategory::from_name("disk_io"), None);
    }

    #[test]
    fn test_severity_ordering_and_weights() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(Severity::Critical.weight(), 1.0);
        assert_eq!(Severity::Info.weight(), 0.1);
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
    }

    #[test]
    fn test_pattern_serializes_snake_case() {
        let json = serde_json::to_string(&Pattern::LinearGrowth).unwrap();
        assert_eq!(json, "\"linear_growth\"");
        let json = serde_json::to_string(&Pattern::NoErrors).unwrap();
        assert_eq!(json, "\"none\"");
    }

    #[test]
    fn test_fix_inference() {
        assert_eq!(
            FixKind::infer("Clear the response cache", MetricCategory::Latency),
            FixKind::ClearCaches
        );
        assert_eq!(
            FixKind::infer("restart_component", MetricCategory::Memory),
            FixKind::RestartComponent
        );
        assert_eq!(
            FixKind::infer("investigate manually", MetricCategory::Connections),
            FixKind::ResetConnectionPool
        );
    }

    #[test]
    fn test_knowledge_success_rate() {
        let entry = KnowledgeEntry {
            id: "k1".into(),
            category: MetricCategory::Cpu,
            issue_type: "cpu:spike".into(),
            symptoms: vec![],
            fix_description: "throttle".into(),
            success_count: 3,
            failure_count: 1,
            avg_repair_time_ms: 12.0,
            last_used_at: Utc::now(),
        };
        assert_eq!(entry.success_rate(), 0.75);
    }
}
