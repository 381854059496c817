use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::*;

// ============================================================================
// EVIDENCE STORE: Persistence (external collaborator)
// ============================================================================

/// Fields the state machine may change on a task in one atomic move.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub result_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

impl TaskUpdate {
    pub fn to_status(status: TaskStatus) -> Self {
        Self {
            status,
            result_data: None,
            error_message: None,
        }
    }
}

/// Summary fields the orchestrator writes onto an operator after analysis.
#[derive(Debug, Clone)]
pub struct OperatorSummaryUpdate {
    pub trust_score: f32,
    pub sustainability_rating: f32,
    pub risk_level: RiskLevel,
    pub verification_status: VerificationStatus,
    pub certifications: Vec<String>,
    pub last_analyzed: DateTime<Utc>,
}

/// One row of the per-tier/per-status task count query.
#[derive(Debug, Clone, Copy)]
pub struct TaskStatusCount {
    pub tier: Tier,
    pub status: TaskStatus,
    pub count: u64,
}

/// Document store holding Operator, Task, and AnalysisResult records.
///
/// Implementations must make single-document updates atomic:
/// `update_task_if` is a compare-and-set against the expected current
/// status, so a retry race and a late status callback cannot both win.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    // Tasks
    async fn create_task(&self, task: &Task) -> Result<()>;

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>>;

    /// Atomically apply `update` if the task's current status equals
    /// `expected`. Returns the updated task, or `None` if the guard failed.
    async fn update_task_if(
        &self,
        id: TaskId,
        expected: TaskStatus,
        update: TaskUpdate,
    ) -> Result<Option<Task>>;

    /// Tasks eligible for retry: `status = failed AND retry_count < max`.
    async fn find_failed_tasks(&self, max_retries: i32) -> Result<Vec<Task>>;

    async fn task_status_counts(&self) -> Result<Vec<TaskStatusCount>>;

    /// Most recent completed task's result payload for an operator, if any.
    async fn latest_completed_evidence(
        &self,
        operator_id: OperatorId,
    ) -> Result<Option<serde_json::Value>>;

    // Operators
    async fn get_operator(&self, id: OperatorId) -> Result<Option<Operator>>;

    /// Bulk discovery insert; atomic per batch.
    async fn insert_operators(&self, operators: &[Operator]) -> Result<()>;

    async fn update_operator_summary(
        &self,
        id: OperatorId,
        update: OperatorSummaryUpdate,
    ) -> Result<()>;

    // Analysis results (keyed by operator id, overwrite on re-analysis)
    async fn upsert_analysis(&self, result: &AnalysisResult) -> Result<()>;

    async fn get_analysis(&self, operator_id: OperatorId) -> Result<Option<AnalysisResult>>;
}

// ============================================================================
// TASK QUEUE: Managed delayed-queue service (external collaborator)
// ============================================================================

/// Client for the managed delayed-queue service. The dispatcher computes
/// queue name and delay; the queue only has to accept the submission.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn submit(&self, queue_name: &str, task: &Task, delay_seconds: u64) -> Result<()>;
}
