use serde::{Deserialize, Serialize};

/// Pipeline-wide policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Retry budget for one operator's task chain.
    pub max_retries: i32,
    /// Spacing between items in a batch scoring run, to respect the
    /// AI service's rate limits.
    pub batch_delay_ms: u64,
    /// Queue for tier1 (premium) operators.
    pub tier1_queue: String,
    /// Cost-managed queue for tier2 (grassroots) operators.
    pub tier2_queue: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            batch_delay_ms: 1_000,
            tier1_queue: "vetting-high-priority".to_string(),
            tier2_queue: "vetting-cost-managed".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_batch_delay_ms(mut self, delay_ms: u64) -> Self {
        self.batch_delay_ms = delay_ms;
        self
    }
}
