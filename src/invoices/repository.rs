//! CRUD facade over a document store for the invoices collection

use crate::config::StoreConfig;
use crate::core::error::{Operation, PersistenceError, StoreError};
use crate::core::normalize::Normalizer;
use crate::core::store::{DocumentStore, ErrorCallback, ListenerRegistration, SnapshotCallback};
use crate::core::stored::{Document, DocumentId, OrderBy, StoredValue};
use crate::core::value::Record;
use chrono::Utc;
use std::sync::Arc;

use super::model::{CreatedInvoice, Invoice, UpdatedInvoice};
use super::{CREATED_AT, ID, INVOICES_COLLECTION, UPDATED_AT};

/// Repository for invoices
///
/// Every write runs the caller's record through the normalizer and stamps the
/// store-managed timestamps with the server timestamp sentinel; every read
/// restores native dates. Failures are logged with operation context and
/// returned as [`PersistenceError`]; nothing is retried.
#[derive(Clone)]
pub struct InvoiceRepository {
    store: Arc<dyn DocumentStore>,
    normalizer: Normalizer,
}

impl InvoiceRepository {
    /// Create a repository over the given store, writing dates as native timestamps
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_normalizer(store, Normalizer::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: &StoreConfig) -> Self {
        Self::with_normalizer(store, config.normalizer())
    }

    pub fn with_normalizer(store: Arc<dyn DocumentStore>, normalizer: Normalizer) -> Self {
        Self { store, normalizer }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Persist a new invoice
    ///
    /// `createdAt` and `updatedAt` are set by the store at commit; values the
    /// caller put under those keys are overwritten and an `id` field is never
    /// stored. The returned record is the caller's input as given, with
    /// client-side estimates of both timestamps.
    pub async fn create(&self, data: Record) -> Result<CreatedInvoice, PersistenceError> {
        let mut document = self.normalizer.record_to_storage(&data);
        document.shift_remove(ID);
        document.insert(CREATED_AT.to_string(), StoredValue::ServerTimestamp);
        document.insert(UPDATED_AT.to_string(), StoredValue::ServerTimestamp);

        let id = self
            .store
            .create(INVOICES_COLLECTION, document)
            .await
            .map_err(|e| self.fail(Operation::Create, None, e))?;

        tracing::info!(
            operation = %Operation::Create,
            document_id = %id,
            backend = self.store.backend_name(),
            "Invoice added"
        );

        let now = Utc::now();
        Ok(CreatedInvoice {
            id,
            data,
            estimated_created_at: now,
            estimated_updated_at: now,
        })
    }

    /// Merge fields into an existing invoice
    ///
    /// Fields not in `data` keep their stored values. `createdAt` and `id` in
    /// the patch are ignored; `updatedAt` is refreshed by the store. Existence
    /// is not checked here: a missing invoice fails with the store's error.
    pub async fn update(
        &self,
        id: &DocumentId,
        data: Record,
    ) -> Result<UpdatedInvoice, PersistenceError> {
        let mut patch: Document = self.normalizer.record_to_storage(&data);
        patch.shift_remove(ID);
        patch.shift_remove(CREATED_AT);
        patch.insert(UPDATED_AT.to_string(), StoredValue::ServerTimestamp);

        self.store
            .update(INVOICES_COLLECTION, id, patch)
            .await
            .map_err(|e| self.fail(Operation::Update, Some(id), e))?;

        tracing::info!(operation = %Operation::Update, document_id = %id, "Invoice updated");

        Ok(UpdatedInvoice {
            id: id.clone(),
            data,
            estimated_updated_at: Utc::now(),
        })
    }

    /// Remove an invoice
    ///
    /// Does not check that the invoice existed. Returns `true` on success.
    pub async fn delete(&self, id: &DocumentId) -> Result<bool, PersistenceError> {
        self.store
            .delete(INVOICES_COLLECTION, id)
            .await
            .map_err(|e| self.fail(Operation::Delete, Some(id), e))?;

        tracing::info!(operation = %Operation::Delete, document_id = %id, "Invoice deleted");
        Ok(true)
    }

    /// Every invoice, newest first by `createdAt`
    pub async fn list_all(&self) -> Result<Vec<Invoice>, PersistenceError> {
        let snapshots = self
            .store
            .query(INVOICES_COLLECTION, &Self::newest_first())
            .await
            .map_err(|e| self.fail(Operation::ListAll, None, e))?;

        tracing::debug!(
            operation = %Operation::ListAll,
            count = snapshots.len(),
            "Invoices fetched"
        );

        Ok(snapshots
            .into_iter()
            .map(|snapshot| Invoice::from_snapshot(snapshot, &self.normalizer))
            .collect())
    }

    /// Live feed of all invoices, newest first by `createdAt`
    ///
    /// The callback receives the full current list right away and again after
    /// every change made by any client. If the feed fails, the error is logged
    /// and the callback stops firing; no error reaches the caller. Call
    /// [`InvoiceSubscription::unsubscribe`] to stop the feed.
    pub fn subscribe<F>(&self, on_invoices_changed: F) -> InvoiceSubscription
    where
        F: Fn(Vec<Invoice>) + Send + Sync + 'static,
    {
        let normalizer = self.normalizer;
        let on_change: SnapshotCallback = Box::new(move |snapshots| {
            let invoices = snapshots
                .into_iter()
                .map(|snapshot| Invoice::from_snapshot(snapshot, &normalizer))
                .collect();
            on_invoices_changed(invoices);
        });

        let backend = self.store.backend_name();
        let on_error: ErrorCallback = Box::new(move |error: StoreError| {
            // Log-only: the listener is finished and there is no caller to return to
            tracing::error!(
                operation = %Operation::Subscribe,
                collection = INVOICES_COLLECTION,
                backend = backend,
                error = %error,
                "Error listening to invoices"
            );
        });

        let registration =
            self.store
                .subscribe(INVOICES_COLLECTION, Self::newest_first(), on_change, on_error);

        tracing::debug!(operation = %Operation::Subscribe, "Invoice listener started");
        InvoiceSubscription { registration }
    }

    fn newest_first() -> OrderBy {
        OrderBy::desc(CREATED_AT)
    }

    fn fail(&self, operation: Operation, id: Option<&DocumentId>, error: StoreError) -> PersistenceError {
        tracing::error!(
            operation = %operation,
            document_id = id.map(DocumentId::as_str),
            backend = self.store.backend_name(),
            error = %error,
            "Invoice operation failed"
        );
        PersistenceError::new(operation, id.cloned(), error)
    }
}

/// Handle to a live invoice feed
///
/// Holding the handle keeps the feed running. [`unsubscribe`](Self::unsubscribe)
/// stops it and releases the underlying listener; dropping the handle does the
/// same.
#[derive(Debug)]
pub struct InvoiceSubscription {
    registration: ListenerRegistration,
}

impl InvoiceSubscription {
    /// Whether the feed may still deliver updates
    pub fn is_active(&self) -> bool {
        self.registration.is_active()
    }

    /// Stop the feed; the callback is not invoked after this returns
    ///
    /// Waits for a callback that is already running. Must not be called from
    /// inside the callback itself.
    pub fn unsubscribe(self) {
        self.registration.remove();
        tracing::debug!(operation = %Operation::Subscribe, "Invoice listener removed");
    }
}
