//! Pipeline orchestrator.
//!
//! Owns the sequencing between stages: candidate ingestion, task dispatch,
//! status callbacks from the external scraper, scoring, and the post-analysis
//! evidence-store writes. Stages are triggered independently by external
//! calls; every method is safe to invoke concurrently per task id.

use chrono::{Duration, Utc};

use crate::config::PipelineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{PipelineError, Result};
use crate::scoring::{ScoreResult, ScoringEngine, ScoringRules};
use crate::tasks::TaskMachine;
use crate::traits::{EvidenceStore, OperatorSummaryUpdate, TaskQueue, TaskUpdate};
use crate::types::*;

pub struct Pipeline<S, Q> {
    config: PipelineConfig,
    store: S,
    queue: Q,
    engine: ScoringEngine,
}

impl<S, Q> Pipeline<S, Q>
where
    S: EvidenceStore,
    Q: TaskQueue,
{
    pub fn new(config: PipelineConfig, store: S, queue: Q, engine: ScoringEngine) -> Self {
        Self {
            config,
            store,
            queue,
            engine,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn dispatcher(&self) -> Dispatcher<'_, S, Q> {
        Dispatcher::new(&self.config, &self.store, &self.queue)
    }

    fn machine(&self) -> TaskMachine<'_, S> {
        TaskMachine::new(&self.store, self.config.max_retries)
    }

    // ========================================================================
    // Discovery → Dispatch
    // ========================================================================

    /// Register discovered operator candidates (atomic per batch) and
    /// dispatch one task per candidate. Per-candidate dispatch failures are
    /// logged and skipped; the candidate stays `pending` for a later sweep.
    pub async fn ingest_candidates(
        &self,
        candidates: Vec<Operator>,
        priority: i32,
    ) -> Result<Vec<TaskReceipt>> {
        self.store
            .insert_operators(&candidates)
            .await
            .map_err(PipelineError::store)?;

        let mut receipts = Vec::new();
        for operator in &candidates {
            match self
                .create_task(operator.id, operator.url.clone(), operator.tier, priority)
                .await
            {
                Ok(receipt) => receipts.push(receipt),
                Err(e) => {
                    tracing::warn!(
                        operator_id = %operator.id,
                        error = %e,
                        "Candidate dispatch failed; left for retry sweep"
                    );
                }
            }
        }
        Ok(receipts)
    }

    /// Create and dispatch one scrape+analyze task.
    pub async fn create_task(
        &self,
        operator_id: OperatorId,
        operator_url: String,
        tier: Tier,
        priority: i32,
    ) -> Result<TaskReceipt> {
        if operator_url.trim().is_empty() {
            return Err(PipelineError::Validation(
                "operator_url must not be empty".to_string(),
            ));
        }

        let task = Task::new(operator_id, operator_url, tier, priority);
        let placement = self.dispatcher().dispatch(&task).await?;

        Ok(TaskReceipt {
            task_id: task.id,
            queue_name: placement.queue_name,
            scheduled_time: Utc::now() + Duration::seconds(placement.delay_seconds as i64),
        })
    }

    // ========================================================================
    // Status callbacks from the external scraper
    // ========================================================================

    /// Apply a status update reported by the scraper. Completion with a
    /// result payload triggers scoring and the operator update as a side
    /// effect.
    pub async fn update_task_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        result_data: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> Result<Task> {
        match status {
            TaskStatus::Processing => self.machine().start(task_id).await,
            TaskStatus::Completed => {
                let result_data = result_data.ok_or_else(|| {
                    PipelineError::Validation(
                        "completed status requires result_data".to_string(),
                    )
                })?;
                // Reject a garbage payload before the task reaches a
                // terminal state, so the scraper can resubmit.
                let payload = parse_evidence(&result_data)?;
                let task = self.machine().complete(task_id, result_data).await?;
                self.persist_scored(
                    task.operator_id,
                    task.tier,
                    &payload.combined_text(),
                    payload.certifications,
                )
                .await?;
                Ok(task)
            }
            TaskStatus::Failed => {
                let error_message = error_message.ok_or_else(|| {
                    PipelineError::Validation(
                        "failed status requires an error_message".to_string(),
                    )
                })?;
                self.machine().fail(task_id, error_message).await
            }
            other => Err(PipelineError::Validation(format!(
                "status {:?} cannot be set by a callback",
                other
            ))),
        }
    }

    // ========================================================================
    // Analysis → Store
    // ========================================================================

    /// The scoring engine entry point: score evidence for one operator and
    /// persist the outcome.
    pub async fn score_operator(
        &self,
        operator_id: OperatorId,
        tier: Tier,
        evidence_text: &str,
    ) -> Result<AnalysisResult> {
        let operator = self
            .store
            .get_operator(operator_id)
            .await
            .map_err(PipelineError::store)?
            .ok_or_else(|| PipelineError::OperatorNotFound(operator_id.to_string()))?;

        self.persist_scored(operator.id, tier, evidence_text, operator.certifications)
            .await
    }

    /// Score the evidence and perform the two post-analysis writes:
    /// (a) upsert the analysis result, (b) update the operator summary.
    /// If (a) succeeds but (b) fails this surfaces as a distinct
    /// partial-completion error; the source of truth is not rolled back.
    async fn persist_scored(
        &self,
        operator_id: OperatorId,
        tier: Tier,
        evidence_text: &str,
        certifications: Vec<String>,
    ) -> Result<AnalysisResult> {
        let scored = self.engine.score(evidence_text, tier);

        let analysis = AnalysisResult {
            operator_id,
            overall_score: scored.overall_score,
            category_scores: scored.category_scores.clone(),
            red_flags: scored.red_flags.clone(),
            confidence_level: scored.confidence_level,
            tier_classification: scored.tier_classification.clone(),
            analyzed_at: Utc::now(),
        };

        self.store
            .upsert_analysis(&analysis)
            .await
            .map_err(PipelineError::store)?;

        let summary = self.operator_summary(&scored, certifications);
        if let Err(e) = self.store.update_operator_summary(operator_id, summary).await {
            tracing::error!(
                operator_id = %operator_id,
                error = %e,
                "Analysis stored but operator summary update failed"
            );
            return Err(PipelineError::PartialCompletion {
                operator_id: operator_id.to_string(),
                detail: e.to_string(),
            });
        }

        tracing::info!(
            operator_id = %operator_id,
            overall_score = analysis.overall_score,
            red_flags = analysis.red_flags.len(),
            classification = %analysis.tier_classification,
            "Operator analysis persisted"
        );

        Ok(analysis)
    }

    fn operator_summary(
        &self,
        scored: &ScoreResult,
        certifications: Vec<String>,
    ) -> OperatorSummaryUpdate {
        let needs_review = scored.overall_score < 60.0 || !scored.red_flags.is_empty();

        OperatorSummaryUpdate {
            trust_score: scored.overall_score / 10.0,
            sustainability_rating: scored.overall_score / 20.0,
            risk_level: derive_risk(self.engine.rules(), scored),
            verification_status: if needs_review {
                VerificationStatus::NeedsReview
            } else {
                VerificationStatus::Verified
            },
            certifications,
            last_analyzed: Utc::now(),
        }
    }

    // ========================================================================
    // Batch scoring
    // ========================================================================

    /// Score a list of operators sequentially, with a fixed inter-item delay
    /// to respect the AI service's rate limits. A per-item failure is
    /// recorded and never aborts the batch. With `force_rescore = false`,
    /// operators that already have an analysis are returned as-is.
    pub async fn batch_score_operators(
        &self,
        operator_ids: &[OperatorId],
        force_rescore: bool,
    ) -> Result<BatchScoreReport> {
        let mut report = BatchScoreReport::default();

        for (index, &operator_id) in operator_ids.iter().enumerate() {
            if index > 0 && self.config.batch_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(
                    self.config.batch_delay_ms,
                ))
                .await;
            }

            match self.score_one_for_batch(operator_id, force_rescore).await {
                Ok((result, freshly_scored)) => {
                    if freshly_scored {
                        report.processed_count += 1;
                    }
                    report.results.push(BatchItemOutcome {
                        operator_id,
                        result: Some(result),
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(operator_id = %operator_id, error = %e, "Batch item failed");
                    report.results.push(BatchItemOutcome {
                        operator_id,
                        result: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn score_one_for_batch(
        &self,
        operator_id: OperatorId,
        force_rescore: bool,
    ) -> Result<(AnalysisResult, bool)> {
        if !force_rescore {
            if let Some(existing) = self
                .store
                .get_analysis(operator_id)
                .await
                .map_err(PipelineError::store)?
            {
                return Ok((existing, false));
            }
        }

        let operator = self
            .store
            .get_operator(operator_id)
            .await
            .map_err(PipelineError::store)?
            .ok_or_else(|| PipelineError::OperatorNotFound(operator_id.to_string()))?;

        let evidence = self
            .store
            .latest_completed_evidence(operator_id)
            .await
            .map_err(PipelineError::store)?
            .ok_or_else(|| {
                PipelineError::Validation(format!(
                    "no completed evidence for operator {operator_id}"
                ))
            })?;

        let payload = parse_evidence(&evidence)?;
        let result = self
            .persist_scored(
                operator.id,
                operator.tier,
                &payload.combined_text(),
                payload.certifications,
            )
            .await?;
        Ok((result, true))
    }

    // ========================================================================
    // Retry sweep
    // ========================================================================

    /// Retry every failed task below the retry budget. Each hit is claimed
    /// (marked `retried`), and a successor task is dispatched. If the
    /// dispatch fails the claim is reverted to `failed` so a later sweep
    /// still sees the task. A per-task failure is logged and skipped; it
    /// never aborts the sweep.
    pub async fn retry_failed_tasks(&self, max_retries: Option<i32>) -> Result<RetrySweep> {
        let max_retries = max_retries.unwrap_or(self.config.max_retries);
        let failed = self
            .store
            .find_failed_tasks(max_retries)
            .await
            .map_err(PipelineError::store)?;

        let machine = TaskMachine::new(&self.store, max_retries);
        let mut sweep = RetrySweep::default();

        for task in failed {
            // Claim before dispatch so two concurrent sweeps cannot both
            // re-queue the same task.
            let successor = match machine.claim_for_retry(task.id).await {
                Ok(successor) => successor,
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "Retry claim failed");
                    continue;
                }
            };

            match self.dispatcher().dispatch(&successor).await {
                Ok(_) => {
                    sweep.retried_count += 1;
                    sweep.retried_operator_ids.push(task.operator_id);
                }
                Err(e) => {
                    tracing::error!(
                        task_id = %task.id,
                        successor_id = %successor.id,
                        error = %e,
                        "Retry dispatch failed after claim; reverting claim"
                    );
                    // Put the task back in `failed` so the chain is not lost.
                    match self
                        .store
                        .update_task_if(
                            task.id,
                            TaskStatus::Retried,
                            TaskUpdate::to_status(TaskStatus::Failed),
                        )
                        .await
                    {
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            tracing::error!(task_id = %task.id, "Retry claim revert lost a race");
                        }
                        Err(revert_err) => {
                            tracing::error!(
                                task_id = %task.id,
                                error = %revert_err,
                                "Retry claim revert failed"
                            );
                        }
                    }
                }
            }
        }

        tracing::info!(retried = sweep.retried_count, "Retry sweep finished");
        Ok(sweep)
    }

    // ========================================================================
    // Stats
    // ========================================================================

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let counts = self
            .store
            .task_status_counts()
            .await
            .map_err(PipelineError::store)?;

        let mut stats = QueueStats::default();
        for row in counts {
            let tier_stats = match row.tier {
                Tier::Tier1 => &mut stats.tier1,
                Tier::Tier2 => &mut stats.tier2,
            };
            tier_stats.total += row.count;
            *tier_stats
                .by_status
                .entry(row.status.as_str().to_string())
                .or_default() += row.count;

            stats.summary.total_tasks += row.count;
            *stats
                .summary
                .by_status
                .entry(row.status.as_str().to_string())
                .or_default() += row.count;
            *stats
                .summary
                .by_tier
                .entry(row.tier.as_str().to_string())
                .or_default() += row.count;
        }

        Ok(stats)
    }
}

/// Interpret a stored result payload as evidence. The scraper may attach
/// extra fields, but the payload itself must be a JSON object.
fn parse_evidence(result_data: &serde_json::Value) -> Result<EvidencePayload> {
    serde_json::from_value(result_data.clone())
        .map_err(|e| PipelineError::Validation(format!("malformed result_data: {e}")))
}

/// Risk from the analysis outcome: any heavy red flag (penalty >= 20) or a
/// very low score is high risk; any red flag or a sub-60 score is medium.
fn derive_risk(rules: &ScoringRules, scored: &ScoreResult) -> RiskLevel {
    let heavy_flag = scored.red_flags.iter().any(|flag| {
        rules
            .red_flags
            .iter()
            .any(|rule| rule.penalty >= 20.0 && flag.starts_with(rule.category.as_str()))
    });

    if heavy_flag || scored.overall_score < 20.0 {
        RiskLevel::High
    } else if !scored.red_flags.is_empty() || scored.overall_score < 60.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryTaskQueue;
    use crate::storage::InMemoryEvidenceStore;

    fn pipeline() -> Pipeline<InMemoryEvidenceStore, InMemoryTaskQueue> {
        Pipeline::new(
            PipelineConfig::default().with_batch_delay_ms(0),
            InMemoryEvidenceStore::new(),
            InMemoryTaskQueue::new(),
            ScoringEngine::new(ScoringRules::v1()),
        )
    }

    async fn seed_operator(pipeline: &Pipeline<InMemoryEvidenceStore, InMemoryTaskQueue>, tier: Tier) -> Operator {
        let operator = Operator::candidate(tier, "https://eco.example".to_string());
        pipeline.store().seed_operator(operator.clone()).await;
        operator
    }

    fn strong_evidence() -> serde_json::Value {
        serde_json::json!({
            "evidence_text": "certified b-corporation, official wwf partnership, \
                              animal welfare policy verified, habitat restoration partnership, \
                              local employment partnership, audited impact report certified",
            "certifications": ["B Corporation"],
            "partnerships": ["WWF"]
        })
    }

    #[tokio::test]
    async fn test_create_task_returns_receipt() {
        let pipeline = pipeline();
        let operator = seed_operator(&pipeline, Tier::Tier1).await;

        let receipt = pipeline
            .create_task(operator.id, operator.url.clone(), Tier::Tier1, 9)
            .await
            .unwrap();

        assert_eq!(receipt.queue_name, "vetting-high-priority");
        let task = pipeline.store().get_task(receipt.task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn test_create_task_rejects_bad_priority() {
        let pipeline = pipeline();
        let operator = seed_operator(&pipeline, Tier::Tier1).await;

        let result = pipeline
            .create_task(operator.id, operator.url, Tier::Tier1, 11)
            .await;
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_task_rejects_empty_url() {
        let pipeline = pipeline();
        let result = pipeline
            .create_task(OperatorId::new(), "  ".to_string(), Tier::Tier2, 5)
            .await;
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_completion_triggers_analysis_and_operator_update() {
        let pipeline = pipeline();
        let operator = seed_operator(&pipeline, Tier::Tier1).await;
        let receipt = pipeline
            .create_task(operator.id, operator.url.clone(), Tier::Tier1, 9)
            .await
            .unwrap();

        pipeline
            .update_task_status(receipt.task_id, TaskStatus::Processing, None, None)
            .await
            .unwrap();
        pipeline
            .update_task_status(
                receipt.task_id,
                TaskStatus::Completed,
                Some(strong_evidence()),
                None,
            )
            .await
            .unwrap();

        let analysis = pipeline
            .store()
            .get_analysis(operator.id)
            .await
            .unwrap()
            .expect("analysis persisted");
        assert!(analysis.overall_score > 60.0);
        assert!(analysis.red_flags.is_empty());

        let updated = pipeline
            .store()
            .get_operator(operator.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.verification_status, VerificationStatus::Verified);
        assert_eq!(updated.risk_level, RiskLevel::Low);
        assert!(updated.trust_score > 6.0);
        assert!(updated.last_analyzed.is_some());
        assert_eq!(updated.certifications, vec!["B Corporation".to_string()]);
    }

    #[tokio::test]
    async fn test_red_flag_evidence_needs_review() {
        let pipeline = pipeline();
        let operator = seed_operator(&pipeline, Tier::Tier2).await;
        let receipt = pipeline
            .create_task(operator.id, operator.url.clone(), Tier::Tier2, 5)
            .await
            .unwrap();

        pipeline
            .update_task_status(receipt.task_id, TaskStatus::Processing, None, None)
            .await
            .unwrap();
        pipeline
            .update_task_status(
                receipt.task_id,
                TaskStatus::Completed,
                Some(serde_json::json!({
                    "evidence_text": "community-owned cooperative offering an elephant ride"
                })),
                None,
            )
            .await
            .unwrap();

        let updated = pipeline
            .store()
            .get_operator(operator.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.verification_status, VerificationStatus::NeedsReview);
        assert_eq!(updated.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_completed_without_result_data_rejected() {
        let pipeline = pipeline();
        let operator = seed_operator(&pipeline, Tier::Tier1).await;
        let receipt = pipeline
            .create_task(operator.id, operator.url, Tier::Tier1, 9)
            .await
            .unwrap();

        let result = pipeline
            .update_task_status(receipt.task_id, TaskStatus::Completed, None, None)
            .await;
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_operator_surfaces_partial_completion() {
        let pipeline = pipeline();
        // Task exists but the operator record was never created.
        let receipt = pipeline
            .create_task(
                OperatorId::new(),
                "https://ghost.example".to_string(),
                Tier::Tier1,
                9,
            )
            .await
            .unwrap();

        pipeline
            .update_task_status(receipt.task_id, TaskStatus::Processing, None, None)
            .await
            .unwrap();
        let result = pipeline
            .update_task_status(
                receipt.task_id,
                TaskStatus::Completed,
                Some(strong_evidence()),
                None,
            )
            .await;

        assert!(matches!(result, Err(PipelineError::PartialCompletion { .. })));
        // The task itself still completed; the analysis write landed.
        let task = pipeline.store().get_task(receipt.task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_retry_sweep_requeues_and_excludes_exhausted() {
        let pipeline = pipeline();
        let operator = seed_operator(&pipeline, Tier::Tier2).await;

        // One retryable failure.
        let receipt = pipeline
            .create_task(operator.id, operator.url.clone(), Tier::Tier2, 5)
            .await
            .unwrap();
        pipeline
            .update_task_status(receipt.task_id, TaskStatus::Processing, None, None)
            .await
            .unwrap();
        pipeline
            .update_task_status(
                receipt.task_id,
                TaskStatus::Failed,
                None,
                Some("scraper timeout".to_string()),
            )
            .await
            .unwrap();

        // One exhausted failure.
        let mut exhausted = Task::new(operator.id, operator.url.clone(), Tier::Tier2, 5);
        exhausted.status = TaskStatus::Failed;
        exhausted.retry_count = 3;
        pipeline.store().create_task(&exhausted).await.unwrap();

        let sweep = pipeline.retry_failed_tasks(None).await.unwrap();
        assert_eq!(sweep.retried_count, 1);
        assert_eq!(sweep.retried_operator_ids, vec![operator.id]);

        let old = pipeline.store().get_task(receipt.task_id).await.unwrap().unwrap();
        assert_eq!(old.status, TaskStatus::Retried);
        let untouched = pipeline.store().get_task(exhausted.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_retry_sweep_reverts_claim_when_dispatch_fails() {
        let pipeline = Pipeline::new(
            PipelineConfig::default().with_batch_delay_ms(0),
            InMemoryEvidenceStore::new(),
            InMemoryTaskQueue::failing(),
            ScoringEngine::new(ScoringRules::v1()),
        );

        let mut task = Task::new(
            OperatorId::new(),
            "https://eco.example".to_string(),
            Tier::Tier2,
            5,
        );
        task.status = TaskStatus::Failed;
        pipeline.store().create_task(&task).await.unwrap();

        let sweep = pipeline.retry_failed_tasks(None).await.unwrap();
        assert_eq!(sweep.retried_count, 0);

        // The claim was rolled back, so a later sweep still sees the task.
        let current = pipeline.store().get_task(task.id).await.unwrap().unwrap();
        assert_eq!(current.status, TaskStatus::Failed);
        let eligible = pipeline.store().find_failed_tasks(3).await.unwrap();
        assert_eq!(eligible.len(), 1);
    }

    #[tokio::test]
    async fn test_completed_with_malformed_result_data_rejected() {
        let pipeline = pipeline();
        let operator = seed_operator(&pipeline, Tier::Tier1).await;
        let receipt = pipeline
            .create_task(operator.id, operator.url, Tier::Tier1, 9)
            .await
            .unwrap();

        pipeline
            .update_task_status(receipt.task_id, TaskStatus::Processing, None, None)
            .await
            .unwrap();
        let result = pipeline
            .update_task_status(
                receipt.task_id,
                TaskStatus::Completed,
                Some(serde_json::json!("not an evidence object")),
                None,
            )
            .await;

        assert!(matches!(result, Err(PipelineError::Validation(_))));
        // The task never left processing, so a corrected callback can land.
        let task = pipeline.store().get_task(receipt.task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(pipeline.store().get_analysis(operator.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_scoring_records_per_item_failures() {
        let pipeline = pipeline();
        let scored = seed_operator(&pipeline, Tier::Tier1).await;
        let unscored = seed_operator(&pipeline, Tier::Tier2).await;

        // Give the first operator completed evidence.
        let receipt = pipeline
            .create_task(scored.id, scored.url.clone(), Tier::Tier1, 9)
            .await
            .unwrap();
        pipeline
            .update_task_status(receipt.task_id, TaskStatus::Processing, None, None)
            .await
            .unwrap();
        pipeline
            .update_task_status(
                receipt.task_id,
                TaskStatus::Completed,
                Some(strong_evidence()),
                None,
            )
            .await
            .unwrap();

        let report = pipeline
            .batch_score_operators(&[scored.id, unscored.id], true)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.processed_count, 1);
        assert!(report.results[0].result.is_some());
        assert!(report.results[1].error.is_some());
    }

    #[tokio::test]
    async fn test_batch_scoring_skips_already_scored_unless_forced() {
        let pipeline = pipeline();
        let operator = seed_operator(&pipeline, Tier::Tier1).await;
        pipeline
            .score_operator(operator.id, Tier::Tier1, "habitat restoration certified")
            .await
            .unwrap();

        let report = pipeline
            .batch_score_operators(&[operator.id], false)
            .await
            .unwrap();

        // Existing analysis returned, nothing re-processed.
        assert_eq!(report.processed_count, 0);
        assert!(report.results[0].result.is_some());
    }

    #[tokio::test]
    async fn test_score_operator_unknown_id() {
        let pipeline = pipeline();
        let result = pipeline
            .score_operator(OperatorId::new(), Tier::Tier1, "whatever")
            .await;
        assert!(matches!(result, Err(PipelineError::OperatorNotFound(_))));
    }

    #[tokio::test]
    async fn test_ingest_candidates_dispatches_each() {
        let pipeline = pipeline();
        let candidates = vec![
            Operator::candidate(Tier::Tier1, "https://a.example".to_string()),
            Operator::candidate(Tier::Tier2, "https://b.example".to_string()),
        ];

        let receipts = pipeline.ingest_candidates(candidates, 5).await.unwrap();
        assert_eq!(receipts.len(), 2);

        let stats = pipeline.queue_stats().await.unwrap();
        assert_eq!(stats.summary.total_tasks, 2);
        assert_eq!(stats.tier1.total, 1);
        assert_eq!(stats.tier2.total, 1);
        assert_eq!(stats.summary.by_status["queued"], 2);
    }
}
