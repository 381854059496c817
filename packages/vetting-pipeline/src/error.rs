//! Typed errors for the vetting pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so the HTTP boundary
//! can map each failure class to a status code.

use thiserror::Error;

use crate::types::{TaskId, TaskStatus};

/// Errors that can occur in the pipeline core.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or malformed input; never retried automatically
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced task does not exist
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Referenced operator does not exist
    #[error("operator not found: {0}")]
    OperatorNotFound(String),

    /// State-machine move not permitted from the current status
    #[error("invalid transition for task {task_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// Queue service rejected or failed the submission
    #[error("queue submission failed: {0}")]
    Queue(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Evidence store I/O failed
    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Analysis was persisted but the operator summary update failed
    #[error("partial completion for operator {operator_id}: {detail}")]
    PartialCompletion { operator_id: String, detail: String },

    /// Submission rejected by the boundary rate limiter; retryable
    #[error("rate limited")]
    RateLimited,
}

impl PipelineError {
    pub fn store(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Store(err.into())
    }

    pub fn queue(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Queue(err.into())
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
