//! In-memory evidence store, used by tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::traits::{EvidenceStore, OperatorSummaryUpdate, TaskStatusCount, TaskUpdate};
use crate::types::*;

#[derive(Default)]
struct Inner {
    tasks: HashMap<TaskId, Task>,
    operators: HashMap<OperatorId, Operator>,
    analyses: HashMap<OperatorId, AnalysisResult>,
}

#[derive(Default)]
pub struct InMemoryEvidenceStore {
    inner: Mutex<Inner>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an operator directly (discovery stand-in for tests).
    pub async fn seed_operator(&self, operator: Operator) {
        self.inner
            .lock()
            .unwrap()
            .operators
            .insert(operator.id, operator);
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn create_task(&self, task: &Task) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.tasks.contains_key(&task.id) {
            anyhow::bail!("task already exists: {}", task.id);
        }
        inner.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.inner.lock().unwrap().tasks.get(&id).cloned())
    }

    async fn update_task_if(
        &self,
        id: TaskId,
        expected: TaskStatus,
        update: TaskUpdate,
    ) -> Result<Option<Task>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(task) = inner.tasks.get_mut(&id) else {
            return Ok(None);
        };
        if task.status != expected {
            return Ok(None);
        }
        task.status = update.status;
        if update.result_data.is_some() {
            task.result_data = update.result_data;
        }
        if update.error_message.is_some() {
            task.error_message = update.error_message;
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn find_failed_tasks(&self, max_retries: i32) -> Result<Vec<Task>> {
        let inner = self.inner.lock().unwrap();
        let mut failed: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Failed && t.retry_count < max_retries)
            .cloned()
            .collect();
        failed.sort_by_key(|t| t.created_at);
        Ok(failed)
    }

    async fn task_status_counts(&self) -> Result<Vec<TaskStatusCount>> {
        let inner = self.inner.lock().unwrap();
        let mut counts: HashMap<(Tier, TaskStatus), u64> = HashMap::new();
        for task in inner.tasks.values() {
            *counts.entry((task.tier, task.status)).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((tier, status), count)| TaskStatusCount {
                tier,
                status,
                count,
            })
            .collect())
    }

    async fn latest_completed_evidence(
        &self,
        operator_id: OperatorId,
    ) -> Result<Option<serde_json::Value>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.operator_id == operator_id && t.status == TaskStatus::Completed)
            .max_by_key(|t| t.updated_at)
            .and_then(|t| t.result_data.clone()))
    }

    async fn get_operator(&self, id: OperatorId) -> Result<Option<Operator>> {
        Ok(self.inner.lock().unwrap().operators.get(&id).cloned())
    }

    async fn insert_operators(&self, operators: &[Operator]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for operator in operators {
            if inner.operators.contains_key(&operator.id) {
                anyhow::bail!("operator already exists: {}", operator.id);
            }
        }
        for operator in operators {
            inner.operators.insert(operator.id, operator.clone());
        }
        Ok(())
    }

    async fn update_operator_summary(
        &self,
        id: OperatorId,
        update: OperatorSummaryUpdate,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let operator = inner
            .operators
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("operator not found: {id}"))?;
        operator.trust_score = update.trust_score;
        operator.sustainability_rating = update.sustainability_rating;
        operator.risk_level = update.risk_level;
        operator.verification_status = update.verification_status;
        operator.certifications = update.certifications;
        operator.last_analyzed = Some(update.last_analyzed);
        Ok(())
    }

    async fn upsert_analysis(&self, result: &AnalysisResult) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .analyses
            .insert(result.operator_id, result.clone());
        Ok(())
    }

    async fn get_analysis(&self, operator_id: OperatorId) -> Result<Option<AnalysisResult>> {
        Ok(self.inner.lock().unwrap().analyses.get(&operator_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_task(store: &InMemoryEvidenceStore, tier: Tier, status: TaskStatus) {
        let mut task = Task::new(
            OperatorId::new(),
            "https://example.org".to_string(),
            tier,
            5,
        );
        task.status = status;
        store.create_task(&task).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_counts_group_by_tier_and_status() {
        let store = InMemoryEvidenceStore::new();
        seeded_task(&store, Tier::Tier1, TaskStatus::Queued).await;
        seeded_task(&store, Tier::Tier1, TaskStatus::Queued).await;
        seeded_task(&store, Tier::Tier1, TaskStatus::Failed).await;
        seeded_task(&store, Tier::Tier2, TaskStatus::Queued).await;

        let counts = store.task_status_counts().await.unwrap();
        assert_eq!(counts.len(), 3);

        let tier1_queued = counts
            .iter()
            .find(|c| c.tier == Tier::Tier1 && c.status == TaskStatus::Queued)
            .unwrap();
        assert_eq!(tier1_queued.count, 2);
        let tier2_queued = counts
            .iter()
            .find(|c| c.tier == Tier::Tier2 && c.status == TaskStatus::Queued)
            .unwrap();
        assert_eq!(tier2_queued.count, 1);
    }
}
