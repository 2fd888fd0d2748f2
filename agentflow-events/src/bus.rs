//! ABOUTME: Async pub/sub event bus: a typed channel with multiple subscribers, ordered per workflow
//! ABOUTME: A single-process, in-core broadcast -- no cross-process transport

use crate::event::WorkflowEvent;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no subscribers are currently listening")]
    NoSubscribers,
}

/// Each workflow owns exactly one executor, and the executor is the sole
/// publisher for that workflow's events; since `broadcast::Sender::send`
/// delivers to every receiver in call order, two events published by the
/// same workflow are observed by every subscriber in that same order.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Succeeds even with zero subscribers (the executor
    /// does not need a listener to make progress); returns
    /// `PublishError::NoSubscribers` only as an informational signal some
    /// callers may choose to log and ignore.
    pub fn publish(&self, event: WorkflowEvent) -> Result<(), PublishError> {
        debug!(event = event.name(), workflow_id = %event.workflow_id(), "publishing workflow event");
        match self.tx.send(event) {
            Ok(_subscriber_count) => Ok(()),
            Err(_) => {
                warn!("event published with no subscribers attached");
                Err(PublishError::NoSubscribers)
            }
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
