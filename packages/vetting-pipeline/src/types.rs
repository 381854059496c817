use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Unique identifier for an operator candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub Uuid);

impl OperatorId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for OperatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for one scrape+analyze attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// ENUMS (type-safe states)
// ============================================================================

/// Coarse operator partition: tier1 = premium/certification-heavy,
/// tier2 = grassroots/affordable. Changes both the scoring category set
/// and the queue/delay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Tier1,
    Tier2,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tier1" => Ok(Tier::Tier1),
            "tier2" => Ok(Tier::Tier2),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
    NeedsReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Task lifecycle. `Completed`, `Retried`, and `Failed` at max retries are
/// terminal; `Failed` below max retries may only move to `Retried`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Retried,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Retried => "retried",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "retried" => Ok(TaskStatus::Retried),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

// ============================================================================
// CORE RECORDS
// ============================================================================

/// An operator candidate in the directory. Created by discovery; summary
/// fields are mutated only by the orchestrator after a task completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub tier: Tier,
    pub url: String,
    pub verification_status: VerificationStatus,
    pub risk_level: RiskLevel,
    pub trust_score: f32,
    pub sustainability_rating: f32,
    pub certifications: Vec<String>,
    pub last_analyzed: Option<DateTime<Utc>>,
}

impl Operator {
    pub fn candidate(tier: Tier, url: String) -> Self {
        Self {
            id: OperatorId::new(),
            tier,
            url,
            verification_status: VerificationStatus::Pending,
            risk_level: RiskLevel::Medium,
            trust_score: 0.0,
            sustainability_rating: 0.0,
            certifications: Vec::new(),
            last_analyzed: None,
        }
    }
}

/// One unit of scrape-then-analyze work for a single operator attempt.
/// A retried task is a new record linked via `predecessor_task_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub operator_id: OperatorId,
    pub operator_url: String,
    pub tier: Tier,
    pub priority: i32,
    pub status: TaskStatus,
    pub retry_count: i32,
    pub result_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub predecessor_task_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(operator_id: OperatorId, operator_url: String, tier: Tier, priority: i32) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            operator_id,
            operator_url,
            tier,
            priority,
            status: TaskStatus::Queued,
            retry_count: 0,
            result_data: None,
            error_message: None,
            predecessor_task_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the successor task in a retry chain.
    pub fn retry_successor(&self) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            operator_id: self.operator_id,
            operator_url: self.operator_url.clone(),
            tier: self.tier,
            priority: self.priority,
            status: TaskStatus::Queued,
            retry_count: self.retry_count + 1,
            result_data: None,
            error_message: None,
            predecessor_task_id: Some(self.id),
            created_at: now,
            updated_at: now,
        }
    }
}

/// The outcome of scoring one operator's evidence. Upserted keyed by
/// operator id; subsequent analyses overwrite, never merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub operator_id: OperatorId,
    pub overall_score: f32,
    pub category_scores: BTreeMap<String, f32>,
    pub red_flags: Vec<String>,
    pub confidence_level: f32,
    pub tier_classification: String,
    pub analyzed_at: DateTime<Utc>,
}

/// Evidence payload a completed scrape reports back. The scraper side is
/// free to attach extra fields; only these are interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidencePayload {
    #[serde(default)]
    pub evidence_text: String,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub partnerships: Vec<String>,
}

impl EvidencePayload {
    /// Fold the structured fields into one scoring input string.
    pub fn combined_text(&self) -> String {
        let mut text = self.evidence_text.clone();
        for extra in self.certifications.iter().chain(self.partnerships.iter()) {
            text.push(' ');
            text.push_str(extra);
        }
        text
    }
}

// ============================================================================
// DISPATCH & STATS
// ============================================================================

/// Where a task was placed and how long it waits before the scraper
/// picks it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePlacement {
    pub queue_name: String,
    pub delay_seconds: u64,
}

/// Receipt returned to the caller after a task is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReceipt {
    pub task_id: TaskId,
    pub queue_name: String,
    pub scheduled_time: DateTime<Utc>,
}

/// Per-tier status breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierStats {
    pub total: u64,
    pub by_status: HashMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStatsSummary {
    pub total_tasks: u64,
    pub by_status: HashMap<String, u64>,
    pub by_tier: HashMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub tier1: TierStats,
    pub tier2: TierStats,
    pub summary: QueueStatsSummary,
}

/// Outcome of a retry sweep over failed tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySweep {
    pub retried_count: u64,
    pub retried_operator_ids: Vec<OperatorId>,
}

/// Per-item outcome of a batch scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemOutcome {
    pub operator_id: OperatorId,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchScoreReport {
    pub processed_count: u64,
    pub results: Vec<BatchItemOutcome>,
}
