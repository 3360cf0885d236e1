//! Queue event broadcaster for live progress streaming to UI consumers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::status::QueueState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEventKind {
    StateChanged {
        state: QueueState,
    },
    ItemStarted {
        item_id: String,
        file_name: String,
        pages_total: usize,
    },
    PageCommitted {
        item_id: String,
        page_number: u32,
        is_error: bool,
        is_potential_duplicate: bool,
    },
    ItemFinished {
        item_id: String,
        pages_done: usize,
    },
    ItemSkipped {
        item_id: String,
        pages_skipped: usize,
    },
    Warning {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEvent {
    #[serde(flatten)]
    pub kind: QueueEventKind,
    pub timestamp: DateTime<Utc>,
}

impl QueueEvent {
    pub fn new(kind: QueueEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct QueueEventBroadcaster {
    sender: Arc<broadcast::Sender<QueueEvent>>,
}

impl QueueEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, kind: QueueEventKind) {
        // No subscribers is fine.
        let _ = self.sender.send(QueueEvent::new(kind));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for QueueEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
