//! HTTP handlers for the pipeline operations.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use vetting_pipeline::{
    AnalysisResult, BatchScoreReport, HttpTaskQueue, OperatorId, Pipeline, PipelineError,
    PostgresEvidenceStore, QueueStats, RetrySweep, TaskId, TaskReceipt, TaskStatus, Tier,
};

pub type AppPipeline = Pipeline<PostgresEvidenceStore, HttpTaskQueue>;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AppPipeline>,
    pub db_pool: PgPool,
}

/// Wrapper so pipeline errors map onto the HTTP taxonomy.
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::TaskNotFound(_) | PipelineError::OperatorNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            PipelineError::InvalidTransition { .. } => StatusCode::CONFLICT,
            PipelineError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            PipelineError::Queue(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Store(_) | PipelineError::PartialCompletion { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

fn parse_tier(tier: Option<&str>) -> Result<Tier, ApiError> {
    tier.ok_or_else(|| PipelineError::Validation("tier is required".to_string()).into())
        .and_then(|t| {
            t.parse::<Tier>()
                .map_err(|e| PipelineError::Validation(e).into())
        })
}

// ============================================================================
// createTask
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub operator_id: Option<Uuid>,
    pub operator_url: Option<String>,
    pub tier: Option<String>,
    pub priority: Option<i32>,
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<TaskReceipt>, ApiError> {
    let operator_id = req
        .operator_id
        .ok_or_else(|| PipelineError::Validation("operator_id is required".to_string()))?;
    let operator_url = req
        .operator_url
        .ok_or_else(|| PipelineError::Validation("operator_url is required".to_string()))?;
    let tier = parse_tier(req.tier.as_deref())?;
    let priority = req
        .priority
        .ok_or_else(|| PipelineError::Validation("priority is required".to_string()))?;

    let receipt = state
        .pipeline
        .create_task(OperatorId(operator_id), operator_url, tier, priority)
        .await?;
    Ok(Json(receipt))
}

// ============================================================================
// updateTaskStatus
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateTaskStatusRequest {
    pub status: Option<String>,
    pub result_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateTaskStatusResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

pub async fn update_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskStatusRequest>,
) -> Result<Json<UpdateTaskStatusResponse>, ApiError> {
    let status = req
        .status
        .ok_or_else(|| PipelineError::Validation("status is required".to_string()))?
        .parse::<TaskStatus>()
        .map_err(PipelineError::Validation)?;

    let task = state
        .pipeline
        .update_task_status(TaskId(task_id), status, req.result_data, req.error_message)
        .await?;

    Ok(Json(UpdateTaskStatusResponse {
        task_id: task.id,
        status: task.status,
    }))
}

// ============================================================================
// getQueueStats
// ============================================================================

pub async fn queue_stats(State(state): State<AppState>) -> Result<Json<QueueStats>, ApiError> {
    Ok(Json(state.pipeline.queue_stats().await?))
}

// ============================================================================
// retryFailedTasks
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RetryFailedRequest {
    pub max_retries: Option<i32>,
}

pub async fn retry_failed_tasks(
    State(state): State<AppState>,
    req: Option<Json<RetryFailedRequest>>,
) -> Result<Json<RetrySweep>, ApiError> {
    let max_retries = req.and_then(|Json(r)| r.max_retries);
    Ok(Json(state.pipeline.retry_failed_tasks(max_retries).await?))
}

// ============================================================================
// scoreOperator
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ScoreOperatorRequest {
    pub tier: Option<String>,
    pub evidence_text: Option<String>,
}

pub async fn score_operator(
    State(state): State<AppState>,
    Path(operator_id): Path<Uuid>,
    Json(req): Json<ScoreOperatorRequest>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let tier = parse_tier(req.tier.as_deref())?;
    let evidence_text = req
        .evidence_text
        .ok_or_else(|| PipelineError::Validation("evidence_text is required".to_string()))?;

    let result = state
        .pipeline
        .score_operator(OperatorId(operator_id), tier, &evidence_text)
        .await?;
    Ok(Json(result))
}

// ============================================================================
// batchScoreOperators
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BatchScoreRequest {
    pub operator_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub force_rescore: bool,
}

pub async fn batch_score_operators(
    State(state): State<AppState>,
    Json(req): Json<BatchScoreRequest>,
) -> Result<Json<BatchScoreReport>, ApiError> {
    let operator_ids: Vec<OperatorId> = req
        .operator_ids
        .ok_or_else(|| PipelineError::Validation("operator_ids is required".to_string()))?
        .into_iter()
        .map(OperatorId)
        .collect();

    let report = state
        .pipeline
        .batch_score_operators(&operator_ids, req.force_rescore)
        .await?;
    Ok(Json(report))
}

// ============================================================================
// health
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_error: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        sqlx::query("SELECT 1").execute(&state.db_pool),
    )
    .await;

    match db_result {
        Ok(Ok(_)) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                database_error: None,
            }),
        ),
        Ok(Err(e)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy".to_string(),
                database_error: Some(e.to_string()),
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy".to_string(),
                database_error: Some("query timeout (>5s)".to_string()),
            }),
        ),
    }
}
