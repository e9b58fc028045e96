//! Error types for Medic.
//!
//! Every fallible operation in the library returns `Result<T, RepairError>`.
//! Components that must never fail their caller (monitor, executor, learner)
//! log these and fall back to a degraded value at the call site.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    StorePoisoned,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("Metric '{name}' has non-finite value {value}")]
    InvalidSample { name: String, value: f64 },

    #[error("Unknown record: {0}")]
    NotFound(String),

    #[error("Previous fix for {0} is still running")]
    FixInFlight(String),

    #[error("Action handler failed: {0}")]
    Handler(String),

    #[error("Fix timed out after {0} ms")]
    Timeout(u64),

    #[error("Action handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl RepairError {
    /// Short machine-readable kind, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            RepairError::Store(_) | RepairError::StorePoisoned => "store",
            RepairError::Json(_) => "json",
            RepairError::UnknownMetric(_) | RepairError::InvalidSample { .. } => "metric",
            RepairError::NotFound(_) => "not_found",
            RepairError::FixInFlight(_) => "busy",
            RepairError::Handler(_) | RepairError::HandlerPanicked(_) => "handler",
            RepairError::Timeout(_) => "timeout",
            RepairError::Config(_) => "config",
        }
    }
}

pub type MedicResult<T> = std::result::Result<T, RepairError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RepairError::UnknownMetric("disk".into()).kind(), "metric");
        assert_eq!(RepairError::Timeout(50).kind(), "timeout");
        assert_eq!(RepairError::FixInFlight("shed_load".into()).kind(), "busy");
        assert_eq!(
            RepairError::Store(rusqlite::Error::QueryReturnedNoRows).kind(),
            "store"
        );
    }

    #[test]
    fn test_error_messages() {
        let err = RepairError::InvalidSample {
            name: "cpu".into(),
            value: f64::NAN,
        };
        assert!(err.to_string().contains("cpu"));
        assert_eq!(
            RepairError::Timeout(250).to_string(),
            "Fix timed out after 250 ms"
        );
    }
}
