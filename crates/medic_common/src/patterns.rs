//! Pattern Analyzers - per-category classification of metric windows
//!
//! Each analyzer is a pure function of the window contents: the same samples
//! always produce the same analysis. Rules are checked in priority order and
//! the first match wins.
//!
//! Spike rule (shared): the latest sample exceeds the mean of the preceding
//! samples by more than 3 standard deviations of those samples. The standard
//! deviation is floored at 2% of that mean so a perfectly flat history does
//! not turn every small uptick into a spike.

use crate::stats;
use crate::types::{MetricCategory, Pattern, PatternAnalysis, PatternDetails, Severity};

/// Windows shorter than this are reported as "insufficient data"
pub const MIN_SAMPLES: usize = 5;

const SPIKE_SIGMAS: f64 = 3.0;
const SIGMA_FLOOR_RATIO: f64 = 0.02;

const INSUFFICIENT_CONFIDENCE: f64 = 0.1;
const BASELINE_CONFIDENCE: f64 = 0.8;

/// Run the analyzer for `category` over `values`
pub fn analyze(category: MetricCategory, values: &[f64]) -> PatternAnalysis {
    match category {
        MetricCategory::Memory => analyze_memory_pattern(values),
        MetricCategory::Latency => analyze_latency_pattern(values),
        MetricCategory::ErrorRate => analyze_error_pattern(values),
        MetricCategory::Connections => analyze_connection_pattern(values),
        MetricCategory::Cpu => analyze_cpu_pattern(values),
    }
}

/// Compute every statistic the analyzers look at
pub fn describe(values: &[f64]) -> PatternDetails {
    if values.is_empty() {
        return PatternDetails {
            insufficient_data: true,
            ..Default::default()
        };
    }

    let (min, max) = stats::min_max(values);
    let fit = stats::linear_regression(values);
    let baseline = &values[..values.len() - 1];

    PatternDetails {
        sample_count: values.len(),
        mean: stats::mean(values),
        std_dev: stats::std_dev(values),
        relative_std_dev: stats::relative_std_dev(values),
        min,
        max,
        latest: values[values.len() - 1],
        slope: fit.slope,
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        direction_changes: stats::direction_changes(values),
        direction_change_ratio: stats::direction_change_ratio(values),
        baseline_mean: stats::mean(baseline),
        baseline_std_dev: stats::std_dev(baseline),
        insufficient_data: values.len() < MIN_SAMPLES,
    }
}

fn spike_sigma(d: &PatternDetails) -> f64 {
    d.baseline_std_dev.max(d.baseline_mean.abs() * SIGMA_FLOOR_RATIO)
}

fn is_spike(d: &PatternDetails) -> bool {
    d.sample_count >= 2 && d.latest > d.baseline_mean + SPIKE_SIGMAS * spike_sigma(d)
}

/// Confidence grows with the z-score past the 3 sigma threshold
fn spike_confidence(d: &PatternDetails) -> f64 {
    let sigma = spike_sigma(d);
    if sigma == 0.0 {
        return 0.95;
    }
    let z = (d.latest - d.baseline_mean) / sigma;
    (0.6 + (z - SPIKE_SIGMAS) * 0.05).clamp(0.6, 0.95)
}

fn insufficient(pattern: Pattern, details: PatternDetails) -> PatternAnalysis {
    PatternAnalysis::new(pattern, INSUFFICIENT_CONFIDENCE, Severity::Info, details)
}

fn baseline(pattern: Pattern, details: PatternDetails) -> PatternAnalysis {
    PatternAnalysis::new(pattern, BASELINE_CONFIDENCE, Severity::Info, details)
}

/// Severity for a positive trend: above `high` is high, above `medium` is medium
fn slope_severity(slope: f64, medium: f64, high: f64) -> Severity {
    if slope > high {
        Severity::High
    } else if slope > medium {
        Severity::Medium
    } else {
        Severity::Low
    }
}

// ============================================================================
// Memory
// ============================================================================

pub fn analyze_memory_pattern(values: &[f64]) -> PatternAnalysis {
    let d = describe(values);
    if d.insufficient_data {
        return insufficient(Pattern::Stable, d);
    }

    if is_spike(&d) {
        let ratio = if d.baseline_mean > 0.0 {
            d.latest / d.baseline_mean
        } else {
            f64::INFINITY
        };
        let severity = if ratio >= 2.0 {
            Severity::Critical
        } else {
            Severity::High
        };
        let confidence = spike_confidence(&d);
        return PatternAnalysis::new(Pattern::Spike, confidence, severity, d);
    }

    if d.direction_change_ratio > 0.4 && (d.max - d.min) > 0.1 * d.mean {
        let confidence = d.direction_change_ratio.min(0.9);
        return PatternAnalysis::new(Pattern::Sawtooth, confidence, Severity::Medium, d);
    }

    if d.relative_std_dev > 0.2 && d.r_squared < 0.5 {
        let confidence = (0.5 + d.relative_std_dev / 2.0).min(0.85);
        return PatternAnalysis::new(Pattern::Fragmentation, confidence, Severity::Medium, d);
    }

    if d.slope > 0.5 && d.r_squared > 0.6 {
        let severity = slope_severity(d.slope, 2.0, 5.0);
        let confidence = d.r_squared;
        return PatternAnalysis::new(Pattern::LinearGrowth, confidence, severity, d);
    }

    baseline(Pattern::Stable, d)
}

// ============================================================================
// Latency
// ============================================================================

pub fn analyze_latency_pattern(values: &[f64]) -> PatternAnalysis {
    let d = describe(values);
    if d.insufficient_data {
        return insufficient(Pattern::Stable, d);
    }

    if is_spike(&d) {
        let confidence = spike_confidence(&d);
        return PatternAnalysis::new(Pattern::SuddenJump, confidence, Severity::High, d);
    }

    if d.direction_change_ratio > 0.35 && d.max > 1.5 * d.mean {
        let confidence = d.direction_change_ratio.min(0.9);
        return PatternAnalysis::new(Pattern::PeriodicSpikes, confidence, Severity::Medium, d);
    }

    if d.slope > 0.3 && d.r_squared > 0.5 {
        let severity = if d.slope > 2.0 {
            Severity::High
        } else {
            Severity::Medium
        };
        let confidence = d.r_squared;
        return PatternAnalysis::new(Pattern::GradualDegradation, confidence, severity, d);
    }

    baseline(Pattern::Stable, d)
}

// ============================================================================
// Error rate
// ============================================================================

pub fn analyze_error_pattern(values: &[f64]) -> PatternAnalysis {
    let d = describe(values);
    if d.insufficient_data {
        return insufficient(Pattern::NoErrors, d);
    }

    if d.mean < 0.001 && d.max < 0.005 {
        return PatternAnalysis::new(Pattern::NoErrors, 0.95, Severity::Info, d);
    }

    if is_spike(&d) && d.latest > 0.05 {
        let confidence = spike_confidence(&d);
        return PatternAnalysis::new(Pattern::Burst, confidence, Severity::Critical, d);
    }

    if d.slope > 0.0 && d.r_squared > 0.5 && d.mean > 0.01 {
        let confidence = d.r_squared;
        return PatternAnalysis::new(Pattern::Cascading, confidence, Severity::High, d);
    }

    if d.mean > 0.005 && d.relative_std_dev < 0.5 {
        return PatternAnalysis::new(Pattern::SteadyElevated, 0.7, Severity::Medium, d);
    }

    if d.mean > 0.0 {
        return PatternAnalysis::new(Pattern::Isolated, 0.5, Severity::Low, d);
    }

    baseline(Pattern::NoErrors, d)
}

// ============================================================================
// Connections
// ============================================================================

pub fn analyze_connection_pattern(values: &[f64]) -> PatternAnalysis {
    let d = describe(values);
    if d.insufficient_data {
        return insufficient(Pattern::Stable, d);
    }

    if is_spike(&d) {
        let confidence = spike_confidence(&d);
        return PatternAnalysis::new(Pattern::Spike, confidence, Severity::High, d);
    }

    if d.slope > 0.3 && d.r_squared > 0.6 {
        let severity = if d.slope > 2.0 {
            Severity::High
        } else {
            Severity::Medium
        };
        let confidence = d.r_squared;
        return PatternAnalysis::new(Pattern::Leak, confidence, severity, d);
    }

    if d.direction_change_ratio > 0.4 && d.relative_std_dev > 0.3 {
        let confidence = d.direction_change_ratio.min(0.9);
        return PatternAnalysis::new(Pattern::Thrashing, confidence, Severity::Medium, d);
    }

    if d.mean > 100.0 && d.relative_std_dev < 0.2 {
        return PatternAnalysis::new(Pattern::Saturation, 0.7, Severity::High, d);
    }

    baseline(Pattern::Stable, d)
}

// ============================================================================
// CPU
// ============================================================================

pub fn analyze_cpu_pattern(values: &[f64]) -> PatternAnalysis {
    let d = describe(values);
    if d.insufficient_data {
        return insufficient(Pattern::Normal, d);
    }

    if is_spike(&d) && d.latest > 80.0 {
        let confidence = spike_confidence(&d);
        return PatternAnalysis::new(Pattern::Spike, confidence, Severity::High, d);
    }

    if d.mean > 80.0 && d.relative_std_dev < 0.15 {
        return PatternAnalysis::new(Pattern::SustainedHigh, 0.8, Severity::High, d);
    }

    if d.slope > 0.2 && d.r_squared > 0.5 {
        let severity = if d.slope > 2.0 {
            Severity::High
        } else {
            Severity::Medium
        };
        let confidence = d.r_squared;
        return PatternAnalysis::new(Pattern::GradualIncrease, confidence, severity, d);
    }

    baseline(Pattern::Normal, d)
}
