//! Clients for the managed delayed-queue service.
//!
//! The service accepts a JSON submission naming the queue, the task payload,
//! and a delivery delay; it later invokes the scraper, which reports back
//! through the status-update endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;

use crate::traits::TaskQueue;
use crate::types::Task;

#[derive(Debug, Serialize)]
struct QueueSubmission<'a> {
    queue: &'a str,
    delay_seconds: u64,
    task: &'a Task,
}

/// HTTP client for the queue service.
pub struct HttpTaskQueue {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpTaskQueue {
    pub fn new(base_url: String, api_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_token,
        }
    }
}

#[async_trait]
impl TaskQueue for HttpTaskQueue {
    async fn submit(&self, queue_name: &str, task: &Task, delay_seconds: u64) -> Result<()> {
        let body = QueueSubmission {
            queue: queue_name,
            delay_seconds,
            task,
        };

        let mut request = self
            .client
            .post(format!("{}/v1/submissions", self.base_url))
            .json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach queue service")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("queue service rejected submission ({status}): {text}");
        }

        tracing::debug!(
            task_id = %task.id,
            queue = queue_name,
            delay_seconds,
            "Queue submission accepted"
        );
        Ok(())
    }
}

/// Recorded submission, for assertions in tests.
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    pub queue_name: String,
    pub task: Task,
    pub delay_seconds: u64,
}

/// In-memory queue fake for tests and local development.
#[derive(Default)]
pub struct InMemoryTaskQueue {
    submissions: Mutex<Vec<RecordedSubmission>>,
    fail: bool,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that rejects every submission.
    pub fn failing() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn submit(&self, queue_name: &str, task: &Task, delay_seconds: u64) -> Result<()> {
        if self.fail {
            anyhow::bail!("queue unavailable");
        }
        self.submissions.lock().unwrap().push(RecordedSubmission {
            queue_name: queue_name.to_string(),
            task: task.clone(),
            delay_seconds,
        });
        Ok(())
    }
}
