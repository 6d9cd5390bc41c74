// src/events.rs

use serde::Serialize;
use tokio::sync::broadcast;

/// Published after a sync that completed an attempt, so the UI can offer
/// to open its review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptFinished {
    pub quiz_id: i64,
    pub attempt_id: i64,
    pub synced: bool,
}

/// Outbound quiz events.
#[derive(Clone)]
pub struct QuizEvents {
    tx: broadcast::Sender<AttemptFinished>,
}

impl QuizEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttemptFinished> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: AttemptFinished) {
        // No subscribers is fine; nobody is waiting for the review.
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!("No subscribers for {:?}", event);
        }
    }
}

impl Default for QuizEvents {
    fn default() -> Self {
        Self::new(64)
    }
}
