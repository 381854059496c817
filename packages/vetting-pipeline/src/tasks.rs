//! Task state machine.
//!
//! `queued → processing → {completed | failed}`; a failed task below the
//! retry budget may be claimed for retry, which marks it `retried` and
//! yields a successor task. All moves are compare-and-set against the
//! expected current status, so concurrent callbacks cannot double-apply.

use crate::error::{PipelineError, Result};
use crate::traits::{EvidenceStore, TaskUpdate};
use crate::types::{Task, TaskId, TaskStatus};

pub struct TaskMachine<'a, S> {
    store: &'a S,
    max_retries: i32,
}

impl<'a, S> TaskMachine<'a, S>
where
    S: EvidenceStore,
{
    pub fn new(store: &'a S, max_retries: i32) -> Self {
        Self { store, max_retries }
    }

    async fn fetch(&self, id: TaskId) -> Result<Task> {
        self.store
            .get_task(id)
            .await
            .map_err(PipelineError::store)?
            .ok_or(PipelineError::TaskNotFound(id))
    }

    /// `queued → processing`. Idempotent: a duplicate start signal on a
    /// task already in `processing` is a no-op, not an error.
    pub async fn start(&self, id: TaskId) -> Result<Task> {
        let task = self.fetch(id).await?;

        match task.status {
            TaskStatus::Processing => {
                tracing::debug!(task_id = %id, "Duplicate start signal ignored");
                Ok(task)
            }
            TaskStatus::Queued => {
                let updated = self
                    .store
                    .update_task_if(id, TaskStatus::Queued, TaskUpdate::to_status(TaskStatus::Processing))
                    .await
                    .map_err(PipelineError::store)?;

                match updated {
                    Some(task) => {
                        tracing::info!(task_id = %id, "Task processing started");
                        Ok(task)
                    }
                    // Lost the race; a concurrent start already moved it.
                    None => {
                        let current = self.fetch(id).await?;
                        if current.status == TaskStatus::Processing {
                            Ok(current)
                        } else {
                            Err(PipelineError::InvalidTransition {
                                task_id: id,
                                from: current.status,
                                to: TaskStatus::Processing,
                            })
                        }
                    }
                }
            }
            from => Err(PipelineError::InvalidTransition {
                task_id: id,
                from,
                to: TaskStatus::Processing,
            }),
        }
    }

    /// `processing → completed`. Requires a non-null result payload.
    pub async fn complete(&self, id: TaskId, result_data: serde_json::Value) -> Result<Task> {
        if result_data.is_null() {
            return Err(PipelineError::Validation(
                "completed status requires result_data".to_string(),
            ));
        }

        let task = self.fetch(id).await?;
        if task.status != TaskStatus::Processing {
            return Err(PipelineError::InvalidTransition {
                task_id: id,
                from: task.status,
                to: TaskStatus::Completed,
            });
        }

        let update = TaskUpdate {
            status: TaskStatus::Completed,
            result_data: Some(result_data),
            error_message: None,
        };

        let updated = self
            .store
            .update_task_if(id, TaskStatus::Processing, update)
            .await
            .map_err(PipelineError::store)?;

        match updated {
            Some(task) => {
                tracing::info!(task_id = %id, operator_id = %task.operator_id, "Task completed");
                Ok(task)
            }
            None => {
                let current = self.fetch(id).await?;
                Err(PipelineError::InvalidTransition {
                    task_id: id,
                    from: current.status,
                    to: TaskStatus::Completed,
                })
            }
        }
    }

    /// `processing → failed`. Requires an error message. The failure does
    /// not touch `retry_count`; only the retry itself increments it.
    pub async fn fail(&self, id: TaskId, error_message: String) -> Result<Task> {
        if error_message.trim().is_empty() {
            return Err(PipelineError::Validation(
                "failed status requires an error_message".to_string(),
            ));
        }

        let task = self.fetch(id).await?;
        if task.status != TaskStatus::Processing {
            return Err(PipelineError::InvalidTransition {
                task_id: id,
                from: task.status,
                to: TaskStatus::Failed,
            });
        }

        let update = TaskUpdate {
            status: TaskStatus::Failed,
            result_data: None,
            error_message: Some(error_message.clone()),
        };

        let updated = self
            .store
            .update_task_if(id, TaskStatus::Processing, update)
            .await
            .map_err(PipelineError::store)?;

        match updated {
            Some(task) => {
                tracing::warn!(
                    task_id = %id,
                    operator_id = %task.operator_id,
                    retry_count = task.retry_count,
                    error = %error_message,
                    "Task failed"
                );
                Ok(task)
            }
            None => {
                let current = self.fetch(id).await?;
                Err(PipelineError::InvalidTransition {
                    task_id: id,
                    from: current.status,
                    to: TaskStatus::Failed,
                })
            }
        }
    }

    /// `failed → retried`. Claims the failed task (CAS, so two sweeps
    /// cannot both retry it) and returns the successor task, which the
    /// caller is responsible for dispatching. A task at the retry budget
    /// is terminal and is rejected.
    pub async fn claim_for_retry(&self, id: TaskId) -> Result<Task> {
        let task = self.fetch(id).await?;

        if task.status != TaskStatus::Failed {
            return Err(PipelineError::InvalidTransition {
                task_id: id,
                from: task.status,
                to: TaskStatus::Retried,
            });
        }
        if task.retry_count >= self.max_retries {
            return Err(PipelineError::InvalidTransition {
                task_id: id,
                from: TaskStatus::Failed,
                to: TaskStatus::Retried,
            });
        }

        let claimed = self
            .store
            .update_task_if(id, TaskStatus::Failed, TaskUpdate::to_status(TaskStatus::Retried))
            .await
            .map_err(PipelineError::store)?;

        if claimed.is_none() {
            let current = self.fetch(id).await?;
            return Err(PipelineError::InvalidTransition {
                task_id: id,
                from: current.status,
                to: TaskStatus::Retried,
            });
        }

        let successor = task.retry_successor();
        tracing::info!(
            task_id = %id,
            successor_id = %successor.id,
            retry_count = successor.retry_count,
            "Task claimed for retry"
        );

        Ok(successor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryEvidenceStore;
    use crate::types::{OperatorId, Tier};

    async fn seeded_task(store: &InMemoryEvidenceStore, status: TaskStatus) -> Task {
        let mut task = Task::new(
            OperatorId::new(),
            "https://example.org".to_string(),
            Tier::Tier1,
            5,
        );
        task.status = status;
        store.create_task(&task).await.unwrap();
        task
    }

    #[tokio::test]
    async fn test_start_moves_queued_to_processing() {
        let store = InMemoryEvidenceStore::new();
        let task = seeded_task(&store, TaskStatus::Queued).await;
        let machine = TaskMachine::new(&store, 3);

        let updated = machine.start(task.id).await.unwrap();
        assert_eq!(updated.status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let store = InMemoryEvidenceStore::new();
        let task = seeded_task(&store, TaskStatus::Queued).await;
        let machine = TaskMachine::new(&store, 3);

        machine.start(task.id).await.unwrap();
        let second = machine.start(task.id).await.unwrap();
        assert_eq!(second.status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn test_start_unknown_task_is_not_found() {
        let store = InMemoryEvidenceStore::new();
        let machine = TaskMachine::new(&store, 3);

        let result = machine.start(TaskId::new()).await;
        assert!(matches!(result, Err(PipelineError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_complete_requires_processing() {
        let store = InMemoryEvidenceStore::new();
        let task = seeded_task(&store, TaskStatus::Queued).await;
        let machine = TaskMachine::new(&store, 3);

        let result = machine
            .complete(task.id, serde_json::json!({"evidence_text": "x"}))
            .await;
        assert!(matches!(result, Err(PipelineError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_complete_rejects_null_result_data() {
        let store = InMemoryEvidenceStore::new();
        let task = seeded_task(&store, TaskStatus::Processing).await;
        let machine = TaskMachine::new(&store, 3);

        let result = machine.complete(task.id, serde_json::Value::Null).await;
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_terminal_states_are_immutable() {
        let store = InMemoryEvidenceStore::new();
        let machine = TaskMachine::new(&store, 3);

        for terminal in [TaskStatus::Completed, TaskStatus::Retried] {
            let task = seeded_task(&store, terminal).await;
            assert!(matches!(
                machine.start(task.id).await,
                Err(PipelineError::InvalidTransition { .. })
            ));
            assert!(matches!(
                machine.fail(task.id, "late failure".to_string()).await,
                Err(PipelineError::InvalidTransition { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_retry_increments_count_and_links_predecessor() {
        let store = InMemoryEvidenceStore::new();
        let task = seeded_task(&store, TaskStatus::Failed).await;
        let machine = TaskMachine::new(&store, 3);

        let successor = machine.claim_for_retry(task.id).await.unwrap();
        assert_eq!(successor.retry_count, task.retry_count + 1);
        assert_eq!(successor.predecessor_task_id, Some(task.id));
        assert_eq!(successor.operator_id, task.operator_id);
        assert_eq!(successor.priority, task.priority);

        let old = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(old.status, TaskStatus::Retried);
    }

    #[tokio::test]
    async fn test_retry_exhausted_task_is_terminal() {
        let store = InMemoryEvidenceStore::new();
        let mut task = Task::new(
            OperatorId::new(),
            "https://example.org".to_string(),
            Tier::Tier2,
            3,
        );
        task.status = TaskStatus::Failed;
        task.retry_count = 3;
        store.create_task(&task).await.unwrap();
        let machine = TaskMachine::new(&store, 3);

        let result = machine.claim_for_retry(task.id).await;
        assert!(matches!(result, Err(PipelineError::InvalidTransition { .. })));

        let unchanged = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_retry_cannot_be_claimed_twice() {
        let store = InMemoryEvidenceStore::new();
        let task = seeded_task(&store, TaskStatus::Failed).await;
        let machine = TaskMachine::new(&store, 3);

        machine.claim_for_retry(task.id).await.unwrap();
        let second = machine.claim_for_retry(task.id).await;
        assert!(matches!(second, Err(PipelineError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_fail_then_complete_rejected() {
        let store = InMemoryEvidenceStore::new();
        let task = seeded_task(&store, TaskStatus::Processing).await;
        let machine = TaskMachine::new(&store, 3);

        machine.fail(task.id, "scraper timeout".to_string()).await.unwrap();
        let result = machine
            .complete(task.id, serde_json::json!({"evidence_text": "late"}))
            .await;
        assert!(matches!(result, Err(PipelineError::InvalidTransition { .. })));
    }
}
