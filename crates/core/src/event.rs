//! Domain event system — decoupled observability for the turn lifecycle.
//!
//! Events are published when something interesting happens; subscribers
//! (CLI status line, log sinks, tests) react without coupling to the
//! orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The router produced a decision for an incoming message
    TurnRouted {
        conversation_id: String,
        next_action: String,
        requires_retrieval: bool,
        timestamp: DateTime<Utc>,
    },

    /// The executor applied (or rejected) a command
    CommandApplied {
        name: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// A generation call returned
    ResponseGenerated {
        conversation_id: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A full turn finished, including post-turn bookkeeping
    TurnCompleted {
        conversation_id: String,
        turn: u32,
        timestamp: DateTime<Utc>,
    },

    /// A document was chunked and indexed
    DocumentIngested {
        source_id: String,
        chunks: usize,
        timestamp: DateTime<Utc>,
    },

    /// An error was absorbed at a component boundary
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Publishing
/// with no subscribers is not an error.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
