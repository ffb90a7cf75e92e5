use serde::{Deserialize, Serialize};

fn default_document_workers_limit() -> usize {
    1
}

fn default_cancel_wait_duration_ms() -> u64 {
    10_000
}

/// Bounds for the Task Pool. `document_workers_limit` defaults to `1`
/// because documents mutate host state — running two at once is a
/// correctness hazard, not a throughput knob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPoolConfig {
    #[serde(default = "default_document_workers_limit")]
    pub document_workers_limit: usize,
    #[serde(default = "default_cancel_wait_duration_ms")]
    pub cancel_wait_duration_ms: u64,
}

impl Default for TaskPoolConfig {
    fn default() -> Self {
        Self {
            document_workers_limit: default_document_workers_limit(),
            cancel_wait_duration_ms: default_cancel_wait_duration_ms(),
        }
    }
}

impl TaskPoolConfig {
    /// Clamp to a sane minimum; a `0` worker limit would make the Task Pool
    /// permanently unable to run anything.
    pub fn clamped(&self) -> Self {
        Self {
            document_workers_limit: self.document_workers_limit.max(1),
            cancel_wait_duration_ms: self.cancel_wait_duration_ms,
        }
    }
}
