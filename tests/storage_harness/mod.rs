//! Shared test harness for document store testing
//!
//! Provides document builders, an inbox that turns listener callbacks into
//! awaitable channels, and the `document_store_tests!` conformance suite.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod document_store_tests;

use invoice_store::core::{
    Document, DocumentSnapshot, ErrorCallback, SnapshotCallback, StoreError, StoredValue,
    Timestamp,
};
use std::time::Duration;
use tokio::sync::mpsc;

/// Collection used by the conformance suite
pub const COLLECTION: &str = "harness_documents";

/// Field every harness document is ordered by
pub const ORDER_FIELD: &str = "createdAt";

/// How long an inbox waits for a delivery before failing the test
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Document builders
// ---------------------------------------------------------------------------

/// A document with a title, an amount and both server-managed timestamps
pub fn test_document(title: &str, amount: i64) -> Document {
    let mut doc = Document::new();
    doc.insert("title".into(), StoredValue::String(title.into()));
    doc.insert("amount".into(), StoredValue::Number(amount.into()));
    doc.insert("createdAt".into(), StoredValue::ServerTimestamp);
    doc.insert("updatedAt".into(), StoredValue::ServerTimestamp);
    doc
}

/// A patch touching only the title and refreshing `updatedAt`
pub fn title_patch(title: &str) -> Document {
    let mut doc = Document::new();
    doc.insert("title".into(), StoredValue::String(title.into()));
    doc.insert("updatedAt".into(), StoredValue::ServerTimestamp);
    doc
}

pub fn title_of(snapshot: &DocumentSnapshot) -> Option<&str> {
    snapshot.data.get("title").and_then(StoredValue::as_str)
}

pub fn titles(snapshots: &[DocumentSnapshot]) -> Vec<&str> {
    snapshots.iter().filter_map(title_of).collect()
}

/// Read a resolved timestamp field, failing the test if it is missing
pub fn timestamp_field(doc: &Document, field: &str) -> Timestamp {
    doc.get(field)
        .and_then(StoredValue::as_timestamp)
        .unwrap_or_else(|| panic!("Expected a resolved timestamp in '{}', got {:?}", field, doc.get(field)))
}

/// Pause long enough for a millisecond-precision clock to move on
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

// ---------------------------------------------------------------------------
// Listener inbox
// ---------------------------------------------------------------------------

/// Receives what a listener delivers
pub struct ListenerInbox {
    results: mpsc::UnboundedReceiver<Vec<DocumentSnapshot>>,
    errors: mpsc::UnboundedReceiver<StoreError>,
}

/// Build listener callbacks wired to an inbox
pub fn listener_inbox() -> (SnapshotCallback, ErrorCallback, ListenerInbox) {
    let (results_tx, results) = mpsc::unbounded_channel();
    let (errors_tx, errors) = mpsc::unbounded_channel();

    let on_change: SnapshotCallback = Box::new(move |snapshots| {
        let _ = results_tx.send(snapshots);
    });
    let on_error: ErrorCallback = Box::new(move |error| {
        let _ = errors_tx.send(error);
    });

    (on_change, on_error, ListenerInbox { results, errors })
}

impl ListenerInbox {
    /// Next delivered result set
    pub async fn next(&mut self) -> Vec<DocumentSnapshot> {
        tokio::time::timeout(DELIVERY_TIMEOUT, self.results.recv())
            .await
            .expect("Listener did not deliver in time")
            .expect("Listener callback was dropped")
    }

    /// Skip deliveries until one satisfies `predicate`
    pub async fn next_matching<F>(&mut self, predicate: F) -> Vec<DocumentSnapshot>
    where
        F: Fn(&[DocumentSnapshot]) -> bool,
    {
        loop {
            let snapshots = self.next().await;
            if predicate(&snapshots) {
                return snapshots;
            }
        }
    }

    /// Terminal error delivered to the error callback
    pub async fn error(&mut self) -> StoreError {
        tokio::time::timeout(DELIVERY_TIMEOUT, self.errors.recv())
            .await
            .expect("Listener did not report an error in time")
            .expect("Error callback was dropped")
    }

    /// Assert nothing is delivered during `window`
    pub async fn assert_quiet(&mut self, window: Duration) {
        if let Ok(Some(snapshots)) = tokio::time::timeout(window, self.results.recv()).await {
            panic!("Expected no delivery, got {} documents", snapshots.len());
        }
    }

    /// Drain deliveries already queued
    pub fn drain(&mut self) {
        while self.results.try_recv().is_ok() {}
    }
}
