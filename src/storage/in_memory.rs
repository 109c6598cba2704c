//! In-memory implementation of DocumentStore for testing and development
//!
//! Mirrors the observable behavior of a managed document store: ids are
//! generated on insert, server timestamp sentinels are resolved to a commit
//! clock that never goes backwards, updates merge, and live listeners receive
//! the full ordered result set after every change.

use crate::config::StoreConfig;
use crate::core::events::{DocumentEvent, EventBus, StoreEvent};
use crate::core::store::{DocumentStore, ErrorCallback, ListenerRegistration, SnapshotCallback};
use crate::core::stored::{
    Document, DocumentId, DocumentSnapshot, OrderBy, Timestamp, resolve_document_timestamps,
};
use crate::core::StoreError;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use uuid::Uuid;

const BACKEND: &str = "in-memory";

type Collection = IndexMap<DocumentId, Document>;

/// In-memory document store
///
/// Cheap to clone; clones share the same data, clock and event bus. Uses
/// RwLock for thread-safe access.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    clock: Arc<Mutex<Timestamp>>,
    events: EventBus,
    offline: Arc<AtomicBool>,
}

impl InMemoryDocumentStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::with_event_capacity(1024)
    }

    /// Create a store whose event bus buffers `capacity` events
    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(Mutex::new(Timestamp::new(0, 0))),
            events: EventBus::new(capacity),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_config(config: &StoreConfig) -> Self {
        Self::with_event_capacity(config.event_capacity)
    }

    /// Take the store offline or bring it back
    ///
    /// While offline every operation fails with [`StoreError::Unavailable`].
    /// Going offline terminates all live listeners through their error
    /// callback.
    pub fn set_offline(&self, offline: bool) {
        let was_offline = self.offline.swap(offline, Ordering::SeqCst);
        if offline && !was_offline {
            tracing::warn!(backend = BACKEND, "Document store going offline");
            self.events.publish(StoreEvent::Interrupted {
                reason: "store went offline".to_string(),
            });
        }
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> Result<usize, StoreError> {
        let collections = self.read()?;
        Ok(collections.get(collection).map_or(0, IndexMap::len))
    }

    /// Number of live listeners attached to the store
    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(BACKEND, "store is offline"));
        }
        Ok(())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections
            .read()
            .map_err(|e| StoreError::backend(BACKEND, format!("Failed to acquire read lock: {}", e)))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections
            .write()
            .map_err(|e| StoreError::backend(BACKEND, format!("Failed to acquire write lock: {}", e)))
    }

    /// Next commit time: wall clock, bumped past the previous commit if needed
    fn commit_time(&self) -> Result<Timestamp, StoreError> {
        let mut last = self
            .clock
            .lock()
            .map_err(|e| StoreError::backend(BACKEND, format!("Failed to acquire clock: {}", e)))?;

        let now = Timestamp::now();
        let commit = if now > *last { now } else { last.successor() };
        *last = commit;
        Ok(commit)
    }

    fn ordered(&self, collection: &str, order: &OrderBy) -> Result<Vec<DocumentSnapshot>, StoreError> {
        self.ensure_online()?;
        let collections = self.read()?;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matching: Vec<(&DocumentId, &Document)> = documents
            .iter()
            .filter(|(_, doc)| doc.contains_key(&order.field))
            .collect();
        // Stable sort: ties keep insertion order
        matching.sort_by(|(_, a), (_, b)| order.compare(a, b));

        Ok(matching
            .into_iter()
            .map(|(id, doc)| DocumentSnapshot::new(id.clone(), doc.clone()))
            .collect())
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn create(&self, collection: &str, mut document: Document) -> Result<DocumentId, StoreError> {
        self.ensure_online()?;
        let id = DocumentId::new(Uuid::new_v4().simple().to_string());

        {
            let mut collections = self.write()?;
            resolve_document_timestamps(&mut document, self.commit_time()?);
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.clone(), document);
        }

        self.events.publish(StoreEvent::Document(DocumentEvent::Created {
            collection: collection.to_string(),
            document_id: id.clone(),
        }));

        Ok(id)
    }

    async fn get(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<DocumentSnapshot>, StoreError> {
        self.ensure_online()?;
        let collections = self.read()?;

        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|doc| DocumentSnapshot::new(id.clone(), doc.clone())))
    }

    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        mut patch: Document,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;

        {
            let mut collections = self.write()?;
            let stored = collections
                .get_mut(collection)
                .and_then(|documents| documents.get_mut(id))
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.clone(),
                })?;

            resolve_document_timestamps(&mut patch, self.commit_time()?);
            stored.extend(patch);
        }

        self.events.publish(StoreEvent::Document(DocumentEvent::Updated {
            collection: collection.to_string(),
            document_id: id.clone(),
        }));

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), StoreError> {
        self.ensure_online()?;

        let removed = {
            let mut collections = self.write()?;
            collections
                .get_mut(collection)
                .and_then(|documents| documents.shift_remove(id))
                .is_some()
        };

        if removed {
            self.events.publish(StoreEvent::Document(DocumentEvent::Deleted {
                collection: collection.to_string(),
                document_id: id.clone(),
            }));
        }

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        order: &OrderBy,
    ) -> Result<Vec<DocumentSnapshot>, StoreError> {
        self.ordered(collection, order)
    }

    fn subscribe(
        &self,
        collection: &str,
        order: OrderBy,
        on_change: SnapshotCallback,
        on_error: ErrorCallback,
    ) -> ListenerRegistration {
        let store = self.clone();
        let collection = collection.to_string();
        // Subscribe before the first read so no change slips in between
        let receiver = self.events.subscribe();

        ListenerRegistration::spawn(move |state| async move {
            let mut events = BroadcastStream::new(receiver);

            match store.ordered(&collection, &order) {
                Ok(snapshots) => {
                    if !state.deliver(|| on_change(snapshots)) {
                        return;
                    }
                }
                Err(e) => {
                    on_error(e);
                    return;
                }
            }

            while let Some(item) = events.next().await {
                match item {
                    Ok(envelope) if !envelope.event.affects(&collection) => continue,
                    Ok(envelope) => match envelope.event {
                        StoreEvent::Interrupted { reason } => {
                            tracing::warn!(
                                collection = %collection,
                                event_id = %envelope.id,
                                published_at = %envelope.timestamp,
                                reason = %reason,
                                "Listener interrupted"
                            );
                            on_error(StoreError::unavailable(BACKEND, reason));
                            return;
                        }
                        StoreEvent::Document(event) => {
                            tracing::trace!(
                                collection = %collection,
                                event_id = %envelope.id,
                                action = event.action(),
                                document_id = %event.document_id(),
                                "Listener refreshing"
                            );
                        }
                    },
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        // Results are full sets, so one fresh read covers the gap
                        tracing::warn!(
                            collection = %collection,
                            skipped = skipped,
                            "Listener lagged behind the event bus"
                        );
                    }
                }

                if !state.is_active() {
                    return;
                }
                match store.ordered(&collection, &order) {
                    Ok(snapshots) => {
                        if !state.deliver(|| on_change(snapshots)) {
                            return;
                        }
                    }
                    Err(e) => {
                        on_error(e);
                        return;
                    }
                }
            }
        })
    }
}
