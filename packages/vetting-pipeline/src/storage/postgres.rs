//! Postgres evidence store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::traits::{EvidenceStore, OperatorSummaryUpdate, TaskStatusCount, TaskUpdate};
use crate::types::*;

pub struct PostgresEvidenceStore {
    pool: PgPool,
}

impl PostgresEvidenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the base schema if it does not exist yet.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS operators (
                id UUID PRIMARY KEY,
                tier TEXT NOT NULL,
                url TEXT NOT NULL,
                verification_status TEXT NOT NULL,
                risk_level TEXT NOT NULL,
                trust_score REAL NOT NULL DEFAULT 0,
                sustainability_rating REAL NOT NULL DEFAULT 0,
                certifications JSONB NOT NULL DEFAULT '[]',
                last_analyzed TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create operators table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id UUID PRIMARY KEY,
                operator_id UUID NOT NULL,
                operator_url TEXT NOT NULL,
                tier TEXT NOT NULL,
                priority INT NOT NULL,
                status TEXT NOT NULL,
                retry_count INT NOT NULL DEFAULT 0,
                result_data JSONB,
                error_message TEXT,
                predecessor_task_id UUID,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create tasks table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tasks_status_retry ON tasks(status, retry_count)",
        )
        .execute(&self.pool)
        .await
        .ok();

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_operator_id ON tasks(operator_id)")
            .execute(&self.pool)
            .await
            .ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analysis_results (
                operator_id UUID PRIMARY KEY,
                overall_score REAL NOT NULL,
                category_scores JSONB NOT NULL,
                red_flags JSONB NOT NULL,
                confidence_level REAL NOT NULL,
                tier_classification TEXT NOT NULL,
                analyzed_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create analysis_results table")?;

        Ok(())
    }
}

fn task_from_row(row: &sqlx::postgres::PgRow) -> Result<Task> {
    Ok(Task {
        id: TaskId(row.get("id")),
        operator_id: OperatorId(row.get("operator_id")),
        operator_url: row.get("operator_url"),
        tier: row
            .get::<String, _>("tier")
            .parse()
            .map_err(anyhow::Error::msg)?,
        priority: row.get("priority"),
        status: row
            .get::<String, _>("status")
            .parse()
            .map_err(anyhow::Error::msg)?,
        retry_count: row.get("retry_count"),
        result_data: row.get("result_data"),
        error_message: row.get("error_message"),
        predecessor_task_id: row
            .get::<Option<uuid::Uuid>, _>("predecessor_task_id")
            .map(TaskId),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn operator_from_row(row: &sqlx::postgres::PgRow) -> Result<Operator> {
    Ok(Operator {
        id: OperatorId(row.get("id")),
        tier: row
            .get::<String, _>("tier")
            .parse()
            .map_err(anyhow::Error::msg)?,
        url: row.get("url"),
        verification_status: serde_json::from_value(serde_json::Value::String(
            row.get::<String, _>("verification_status"),
        ))?,
        risk_level: serde_json::from_value(serde_json::Value::String(
            row.get::<String, _>("risk_level"),
        ))?,
        trust_score: row.get("trust_score"),
        sustainability_rating: row.get("sustainability_rating"),
        certifications: serde_json::from_value(row.get("certifications")).unwrap_or_default(),
        last_analyzed: row.get("last_analyzed"),
    })
}

const TASK_COLUMNS: &str = "id, operator_id, operator_url, tier, priority, status, retry_count, \
                            result_data, error_message, predecessor_task_id, created_at, updated_at";

#[async_trait]
impl EvidenceStore for PostgresEvidenceStore {
    async fn create_task(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, operator_id, operator_url, tier, priority, status, retry_count,
                result_data, error_message, predecessor_task_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(task.id.0)
        .bind(task.operator_id.0)
        .bind(&task.operator_url)
        .bind(task.tier.as_str())
        .bind(task.priority)
        .bind(task.status.as_str())
        .bind(task.retry_count)
        .bind(&task.result_data)
        .bind(&task.error_message)
        .bind(task.predecessor_task_id.map(|id| id.0))
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to create task")?;
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get task")?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn update_task_if(
        &self,
        id: TaskId,
        expected: TaskStatus,
        update: TaskUpdate,
    ) -> Result<Option<Task>> {
        // Guarded single-row update: the WHERE clause is the compare-and-set.
        let row = sqlx::query(&format!(
            r#"
            UPDATE tasks
            SET status = $3,
                result_data = COALESCE($4, result_data),
                error_message = COALESCE($5, error_message),
                updated_at = now()
            WHERE id = $1 AND status = $2
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id.0)
        .bind(expected.as_str())
        .bind(update.status.as_str())
        .bind(&update.result_data)
        .bind(&update.error_message)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update task")?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn find_failed_tasks(&self, max_retries: i32) -> Result<Vec<Task>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks
            WHERE status = 'failed' AND retry_count < $1
            ORDER BY created_at
            "#
        ))
        .bind(max_retries)
        .fetch_all(&self.pool)
        .await
        .context("Failed to find failed tasks")?;

        rows.iter().map(task_from_row).collect()
    }

    async fn task_status_counts(&self) -> Result<Vec<TaskStatusCount>> {
        let rows = sqlx::query(
            "SELECT tier, status, COUNT(*) AS count FROM tasks GROUP BY tier, status",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to count tasks")?;

        rows.iter()
            .map(|row| {
                Ok(TaskStatusCount {
                    tier: row
                        .get::<String, _>("tier")
                        .parse()
                        .map_err(anyhow::Error::msg)?,
                    status: row
                        .get::<String, _>("status")
                        .parse()
                        .map_err(anyhow::Error::msg)?,
                    count: row.get::<i64, _>("count") as u64,
                })
            })
            .collect()
    }

    async fn latest_completed_evidence(
        &self,
        operator_id: OperatorId,
    ) -> Result<Option<serde_json::Value>> {
        let row = sqlx::query(
            r#"
            SELECT result_data
            FROM tasks
            WHERE operator_id = $1 AND status = 'completed' AND result_data IS NOT NULL
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(operator_id.0)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load latest evidence")?;

        Ok(row.and_then(|r| r.get("result_data")))
    }

    async fn get_operator(&self, id: OperatorId) -> Result<Option<Operator>> {
        let row = sqlx::query(
            r#"
            SELECT id, tier, url, verification_status, risk_level, trust_score,
                   sustainability_rating, certifications, last_analyzed
            FROM operators
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get operator")?;

        row.as_ref().map(operator_from_row).transpose()
    }

    async fn insert_operators(&self, operators: &[Operator]) -> Result<()> {
        // Atomic per batch: one transaction for the whole discovery insert.
        let mut tx = self.pool.begin().await.context("Failed to begin batch")?;

        for operator in operators {
            sqlx::query(
                r#"
                INSERT INTO operators (
                    id, tier, url, verification_status, risk_level, trust_score,
                    sustainability_rating, certifications, last_analyzed
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(operator.id.0)
            .bind(operator.tier.as_str())
            .bind(&operator.url)
            .bind(status_str(operator.verification_status))
            .bind(operator.risk_level.as_str())
            .bind(operator.trust_score)
            .bind(operator.sustainability_rating)
            .bind(serde_json::to_value(&operator.certifications)?)
            .bind(operator.last_analyzed)
            .execute(&mut *tx)
            .await
            .context("Failed to insert operator")?;
        }

        tx.commit().await.context("Failed to commit batch")?;
        Ok(())
    }

    async fn update_operator_summary(
        &self,
        id: OperatorId,
        update: OperatorSummaryUpdate,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE operators
            SET trust_score = $2,
                sustainability_rating = $3,
                risk_level = $4,
                verification_status = $5,
                certifications = $6,
                last_analyzed = $7
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(update.trust_score)
        .bind(update.sustainability_rating)
        .bind(update.risk_level.as_str())
        .bind(status_str(update.verification_status))
        .bind(serde_json::to_value(&update.certifications)?)
        .bind(update.last_analyzed)
        .execute(&self.pool)
        .await
        .context("Failed to update operator summary")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("operator not found: {id}");
        }
        Ok(())
    }

    async fn upsert_analysis(&self, result: &AnalysisResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analysis_results (
                operator_id, overall_score, category_scores, red_flags,
                confidence_level, tier_classification, analyzed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (operator_id) DO UPDATE SET
                overall_score = EXCLUDED.overall_score,
                category_scores = EXCLUDED.category_scores,
                red_flags = EXCLUDED.red_flags,
                confidence_level = EXCLUDED.confidence_level,
                tier_classification = EXCLUDED.tier_classification,
                analyzed_at = EXCLUDED.analyzed_at
            "#,
        )
        .bind(result.operator_id.0)
        .bind(result.overall_score)
        .bind(serde_json::to_value(&result.category_scores)?)
        .bind(serde_json::to_value(&result.red_flags)?)
        .bind(result.confidence_level)
        .bind(&result.tier_classification)
        .bind(result.analyzed_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert analysis result")?;
        Ok(())
    }

    async fn get_analysis(&self, operator_id: OperatorId) -> Result<Option<AnalysisResult>> {
        let row = sqlx::query(
            r#"
            SELECT operator_id, overall_score, category_scores, red_flags,
                   confidence_level, tier_classification, analyzed_at
            FROM analysis_results
            WHERE operator_id = $1
            "#,
        )
        .bind(operator_id.0)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get analysis result")?;

        row.map(|r| {
            Ok(AnalysisResult {
                operator_id: OperatorId(r.get("operator_id")),
                overall_score: r.get("overall_score"),
                category_scores: serde_json::from_value(r.get("category_scores"))?,
                red_flags: serde_json::from_value(r.get("red_flags"))?,
                confidence_level: r.get("confidence_level"),
                tier_classification: r.get("tier_classification"),
                analyzed_at: r.get("analyzed_at"),
            })
        })
        .transpose()
    }
}

fn status_str(status: VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::Pending => "pending",
        VerificationStatus::Verified => "verified",
        VerificationStatus::Rejected => "rejected",
        VerificationStatus::NeedsReview => "needs_review",
    }
}
