use serde::Serialize;

/// Scheduler lifecycle: `Idle -> Running -> {Paused, Running} -> Idle | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    #[default]
    Idle,
    Running,
    Paused,
    Cancelled,
}

/// Progress of the file at the head of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemProgress {
    pub item_id: String,
    pub file_name: String,
    pub pages_done: usize,
    pub pages_total: usize,
    pub pages_skipped: usize,
}

/// Point-in-time view of the scheduler for UI consumers.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub state: QueueState,
    pub current: Option<ItemProgress>,
    /// Items waiting behind the current one.
    pub pending: usize,
    pub processed_pages: usize,
    pub skipped_pages: usize,
    /// Sum of the page counts of every item seen since the last reset.
    pub total_pages: usize,
    pub warnings: Vec<String>,
    /// The durable queue could not be written; the queue only lives in memory.
    pub persistence_degraded: bool,
}

impl QueueStatus {
    pub fn is_active(&self) -> bool {
        matches!(self.state, QueueState::Running | QueueState::Paused)
    }
}
