//! Internal event system for live listeners
//!
//! The EventBus decouples store mutations from the listeners that push fresh
//! query results to subscribers. It uses `tokio::sync::broadcast`, so every
//! listener sees every event published after it subscribed.
//!
//! # Architecture
//!
//! ```text
//! create ──┐
//! update ──┼──▶ EventBus::publish() ──▶ broadcast channel ──▶ listener task ──▶ re-query ──▶ callback
//! delete ──┘                                               ──▶ listener task ──▶ re-query ──▶ callback
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let event_bus = EventBus::new(1024);
//! let mut rx = event_bus.subscribe();
//!
//! event_bus.publish(StoreEvent::Document(DocumentEvent::Created {
//!     collection: "invoices".to_string(),
//!     document_id: DocumentId::from("a1"),
//! }));
//!
//! if let Ok(envelope) = rx.recv().await {
//!     println!("Received: {:?}", envelope.event);
//! }
//! ```

use crate::core::stored::DocumentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A committed mutation of a single document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DocumentEvent {
    Created {
        collection: String,
        document_id: DocumentId,
    },
    Updated {
        collection: String,
        document_id: DocumentId,
    },
    Deleted {
        collection: String,
        document_id: DocumentId,
    },
}

impl DocumentEvent {
    pub fn collection(&self) -> &str {
        match self {
            DocumentEvent::Created { collection, .. }
            | DocumentEvent::Updated { collection, .. }
            | DocumentEvent::Deleted { collection, .. } => collection,
        }
    }

    pub fn document_id(&self) -> &DocumentId {
        match self {
            DocumentEvent::Created { document_id, .. }
            | DocumentEvent::Updated { document_id, .. }
            | DocumentEvent::Deleted { document_id, .. } => document_id,
        }
    }

    /// Get the action name (created, updated, deleted)
    pub fn action(&self) -> &str {
        match self {
            DocumentEvent::Created { .. } => "created",
            DocumentEvent::Updated { .. } => "updated",
            DocumentEvent::Deleted { .. } => "deleted",
        }
    }
}

/// Top-level store event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A document was written or removed
    Document(DocumentEvent),
    /// The store stopped serving; listeners must terminate
    Interrupted { reason: String },
}

impl StoreEvent {
    /// Whether this event concerns the given collection
    ///
    /// Interruptions concern every collection.
    pub fn affects(&self, collection: &str) -> bool {
        match self {
            StoreEvent::Document(event) => event.collection() == collection,
            StoreEvent::Interrupted { .. } => true,
        }
    }
}

/// Envelope wrapping a store event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
    pub event: StoreEvent,
}

impl EventEnvelope {
    pub fn new(event: StoreEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// Cheap to clone (the sender is reference counted) and shareable across
/// threads.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    ///
    /// The capacity determines how many events can be buffered before slow
    /// receivers start losing events (lagged). Must be greater than zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Never blocks and never fails. Without subscribers the event is dropped.
    /// Returns the number of receivers that will receive the event.
    pub fn publish(&self, event: StoreEvent) -> usize {
        let envelope = EventEnvelope::new(event);
        // send() returns Err only if there are no receivers
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the current number of active subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
