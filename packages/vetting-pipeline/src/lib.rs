//! Operator vetting pipeline.
//!
//! Moves a conservation travel operator candidate from "discovered" to
//! "scored": tiered dispatch to a delayed-queue service, a retry-bounded
//! task state machine, a deterministic scoring engine, and the orchestrator
//! that sequences them around the evidence store.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod scoring;
pub mod storage;
pub mod tasks;
pub mod traits;
pub mod types;

// Re-exports for clean API
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use orchestrator::Pipeline;
pub use queue::{HttpTaskQueue, InMemoryTaskQueue};
pub use scoring::{ScoringEngine, ScoringRules};
pub use storage::{InMemoryEvidenceStore, PostgresEvidenceStore};
pub use tasks::TaskMachine;
pub use traits::{EvidenceStore, TaskQueue};
pub use types::*;
