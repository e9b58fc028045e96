//! Medic Common - self-healing runtime monitor
//!
//! Sliding metric windows, statistical pattern analysis, repair diagnosis,
//! guarded fix execution, precursor predictions and a learned knowledge base,
//! all persisted through a single SQLite store.

pub mod config;
pub mod diagnosis;
pub mod engine;
pub mod error;
pub mod executor;
pub mod ids;
pub mod learner;
pub mod monitor;
pub mod patterns;
pub mod predictor;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod types;

pub use config::MedicConfig;
pub use diagnosis::{Classification, Diagnoser, Diagnosis};
pub use engine::{CycleReport, EngineBuilder, HealingEngine};
pub use error::{MedicResult, RepairError};
pub use executor::{
    ActionOutcome, ActionRegistry, CyclePhase, Executor, FixResult, RepairAction, RepairResult,
    Verification, VerifyStrategy,
};
pub use ids::{IdFactory, UuidIdFactory};
pub use learner::{CompressionReport, Learner, PatternSubmission, RepairStats};
pub use monitor::Monitor;
pub use predictor::Predictor;
pub use snapshot::{Snapshot, SnapshotSource, SystemSnapshots};
pub use store::{RepairStore, SqliteStore};
pub use types::*;
