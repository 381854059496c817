//! Task dispatcher: queue selection and delay computation.
//!
//! Tier1 work goes to the high-priority queue and runs promptly; tier2 work
//! goes to the cost-managed queue with longer stagger to bound concurrent
//! scraping cost. A two-way partition, not priority levels inside one queue.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::traits::{EvidenceStore, TaskQueue};
use crate::types::{QueuePlacement, Task, Tier};

pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 10;

/// Stagger delay for a task. Urgent tier1 items (priority >= 8) run
/// immediately; everything else is spread out by inverse priority.
pub fn compute_delay_seconds(tier: Tier, priority: i32) -> u64 {
    match tier {
        Tier::Tier1 => {
            if priority >= 8 {
                0
            } else {
                (10 - priority) as u64 * 30
            }
        }
        Tier::Tier2 => (10 - priority) as u64 * 60,
    }
}

/// Compute queue placement for a task. Rejects priority outside [1, 10].
pub fn compute_placement(
    config: &PipelineConfig,
    tier: Tier,
    priority: i32,
) -> Result<QueuePlacement> {
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(PipelineError::Validation(format!(
            "priority must be in [{MIN_PRIORITY}, {MAX_PRIORITY}], got {priority}"
        )));
    }

    let queue_name = match tier {
        Tier::Tier1 => config.tier1_queue.clone(),
        Tier::Tier2 => config.tier2_queue.clone(),
    };

    Ok(QueuePlacement {
        queue_name,
        delay_seconds: compute_delay_seconds(tier, priority),
    })
}

/// Submits tasks to the delayed-queue service and records them in the
/// evidence store.
pub struct Dispatcher<'a, S, Q> {
    config: &'a PipelineConfig,
    store: &'a S,
    queue: &'a Q,
}

impl<'a, S, Q> Dispatcher<'a, S, Q>
where
    S: EvidenceStore,
    Q: TaskQueue,
{
    pub fn new(config: &'a PipelineConfig, store: &'a S, queue: &'a Q) -> Self {
        Self {
            config,
            store,
            queue,
        }
    }

    /// Submit a task: queue first, task record second. If the queue rejects
    /// the submission no record is created, so there is never an orphaned
    /// `queued` row. Queue failures are not retried here; the caller owns
    /// that decision.
    pub async fn dispatch(&self, task: &Task) -> Result<QueuePlacement> {
        let placement = compute_placement(self.config, task.tier, task.priority)?;

        self.queue
            .submit(&placement.queue_name, task, placement.delay_seconds)
            .await
            .map_err(PipelineError::queue)?;

        self.store
            .create_task(task)
            .await
            .map_err(PipelineError::store)?;

        tracing::info!(
            task_id = %task.id,
            operator_id = %task.operator_id,
            queue = %placement.queue_name,
            delay_seconds = placement.delay_seconds,
            priority = task.priority,
            "Task dispatched"
        );

        Ok(placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryTaskQueue;
    use crate::storage::InMemoryEvidenceStore;
    use crate::types::{OperatorId, TaskStatus};

    #[test]
    fn test_urgent_tier1_runs_immediately() {
        assert_eq!(compute_delay_seconds(Tier::Tier1, 9), 0);
        assert_eq!(compute_delay_seconds(Tier::Tier1, 8), 0);
    }

    #[test]
    fn test_tier1_stagger() {
        assert_eq!(compute_delay_seconds(Tier::Tier1, 7), 90);
        assert_eq!(compute_delay_seconds(Tier::Tier1, 1), 270);
    }

    #[test]
    fn test_tier2_stagger() {
        assert_eq!(compute_delay_seconds(Tier::Tier2, 1), 540);
        assert_eq!(compute_delay_seconds(Tier::Tier2, 10), 0);
    }

    #[test]
    fn test_tier1_never_slower_than_tier2_at_equal_priority() {
        for priority in MIN_PRIORITY..=MAX_PRIORITY {
            assert!(
                compute_delay_seconds(Tier::Tier1, priority)
                    <= compute_delay_seconds(Tier::Tier2, priority),
                "tier1 slower than tier2 at priority {priority}"
            );
        }
    }

    #[test]
    fn test_priority_out_of_range_rejected() {
        let config = PipelineConfig::default();
        for bad in [0, -1, 11, 100] {
            let result = compute_placement(&config, Tier::Tier1, bad);
            assert!(matches!(result, Err(PipelineError::Validation(_))));
        }
    }

    #[test]
    fn test_queue_partition_by_tier() {
        let config = PipelineConfig::default();
        let t1 = compute_placement(&config, Tier::Tier1, 5).unwrap();
        let t2 = compute_placement(&config, Tier::Tier2, 5).unwrap();
        assert_eq!(t1.queue_name, "vetting-high-priority");
        assert_eq!(t2.queue_name, "vetting-cost-managed");
    }

    #[tokio::test]
    async fn test_dispatch_writes_task_after_queue_accepts() {
        let config = PipelineConfig::default();
        let store = InMemoryEvidenceStore::new();
        let queue = InMemoryTaskQueue::new();
        let task = Task::new(
            OperatorId::new(),
            "https://example.org".to_string(),
            Tier::Tier1,
            9,
        );

        let dispatcher = Dispatcher::new(&config, &store, &queue);
        let placement = dispatcher.dispatch(&task).await.unwrap();

        assert_eq!(placement.delay_seconds, 0);
        assert_eq!(queue.submissions().len(), 1);
        let stored = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn test_dispatch_leaves_no_orphan_on_queue_failure() {
        let config = PipelineConfig::default();
        let store = InMemoryEvidenceStore::new();
        let queue = InMemoryTaskQueue::failing();
        let task = Task::new(
            OperatorId::new(),
            "https://example.org".to_string(),
            Tier::Tier2,
            5,
        );

        let dispatcher = Dispatcher::new(&config, &store, &queue);
        let result = dispatcher.dispatch(&task).await;

        assert!(matches!(result, Err(PipelineError::Queue(_))));
        assert!(store.get_task(task.id).await.unwrap().is_none());
    }
}
