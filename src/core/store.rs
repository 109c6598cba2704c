//! The document store seam
//!
//! [`DocumentStore`] is everything the repository needs from a managed document
//! database: generated ids, the server timestamp sentinel, merge updates,
//! queries ordered by one field, and live listeners that receive the full
//! ordered result set after every change.

use crate::core::error::StoreError;
use crate::core::stored::{Document, DocumentId, DocumentSnapshot, OrderBy};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

/// Receives the full ordered result set after every change
pub type SnapshotCallback = Box<dyn Fn(Vec<DocumentSnapshot>) + Send + Sync>;

/// Receives the error that terminated a listener; called at most once
pub type ErrorCallback = Box<dyn FnOnce(StoreError) + Send>;

/// Client of a document store
///
/// Implementations are agnostic to what the documents mean; collection names
/// and field names are plain strings.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name used in logs and errors
    fn backend_name(&self) -> &'static str;

    /// Insert a new document and return the id the store assigned
    ///
    /// Server timestamp sentinels are resolved to the commit time.
    async fn create(&self, collection: &str, document: Document) -> Result<DocumentId, StoreError>;

    /// Fetch one document
    async fn get(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<DocumentSnapshot>, StoreError>;

    /// Merge fields into an existing document
    ///
    /// Fields absent from `patch` are left untouched. Fails with
    /// [`StoreError::NotFound`] when the document does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Document,
    ) -> Result<(), StoreError>;

    /// Remove a document; removing a missing document succeeds
    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), StoreError>;

    /// Every document of the collection that carries the ordering field, sorted
    async fn query(
        &self,
        collection: &str,
        order: &OrderBy,
    ) -> Result<Vec<DocumentSnapshot>, StoreError>;

    /// Start a live listener on an ordered query
    ///
    /// `on_change` receives the current result set right away and again after
    /// every change to the collection. When the listener fails, `on_error` is
    /// called once and `on_change` is never called again. Must be called from
    /// within a tokio runtime.
    fn subscribe(
        &self,
        collection: &str,
        order: OrderBy,
        on_change: SnapshotCallback,
        on_error: ErrorCallback,
    ) -> ListenerRegistration;
}

/// Shared state telling a listener task whether it may still deliver
///
/// Deliveries go through [`deliver`](Self::deliver), which holds the
/// delivery gate for the whole callback. Releasing the registration takes the
/// same gate, so it waits for an in-flight delivery and no delivery starts
/// after it returns.
#[derive(Debug, Clone)]
pub struct ListenerState {
    active: Arc<AtomicBool>,
    gate: Arc<Mutex<()>>,
}

impl ListenerState {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Run `delivery` unless the listener was released
    ///
    /// Returns `false` without running it once the listener is released.
    pub fn deliver<F: FnOnce()>(&self, delivery: F) -> bool {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_active() {
            return false;
        }
        delivery();
        true
    }
}

/// Handle to a live listener
///
/// [`remove`](Self::remove) stops the listener: a delivery already running
/// finishes first, and no callback fires after it returns. Dropping the handle
/// has the same effect. Neither may happen from inside the listener's own
/// callback, which would wait on itself.
#[derive(Debug)]
pub struct ListenerRegistration {
    state: ListenerState,
    task: Option<JoinHandle<()>>,
}

impl ListenerRegistration {
    /// Spawn a listener task on the current tokio runtime
    ///
    /// The task receives a [`ListenerState`] and must run every callback
    /// through [`ListenerState::deliver`].
    pub fn spawn<F, Fut>(listener: F) -> Self
    where
        F: FnOnce(ListenerState) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let state = ListenerState {
            active: Arc::new(AtomicBool::new(true)),
            gate: Arc::new(Mutex::new(())),
        };
        let task = tokio::spawn(listener(state.clone()));
        Self {
            state,
            task: Some(task),
        }
    }

    /// A registration for a listener that never started
    pub fn inactive() -> Self {
        Self {
            state: ListenerState {
                active: Arc::new(AtomicBool::new(false)),
                gate: Arc::new(Mutex::new(())),
            },
            task: None,
        }
    }

    /// Whether the listener may still deliver results
    pub fn is_active(&self) -> bool {
        self.state.is_active()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the listener and release its resources
    pub fn remove(mut self) {
        self.release();
    }

    fn release(&mut self) {
        {
            let _gate = self.state.gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.state.active.store(false, Ordering::SeqCst);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.release();
    }
}
