//! MongoDB storage backend using the official MongoDB async driver.
//!
//! Provides `MongoDocumentStore`, a `DocumentStore` backed by a MongoDB
//! database via `mongodb::Database`.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! invoice-store = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! Each store collection maps to the MongoDB collection of the same name. The
//! generated document id is stored as the string `_id`; it is never part of
//! the document fields.
//!
//! # Server timestamps
//!
//! Writes go through an update pipeline so that top-level
//! `StoredValue::ServerTimestamp` fields become `$$NOW`, the server's clock at
//! commit. That clock only has millisecond precision, so when the field
//! already holds a date the new value is at least one millisecond past it;
//! two writes within the same millisecond still yield increasing timestamps.
//! Every other value is wrapped in `$literal`. Sentinels nested below the top
//! level are resolved with the client clock.
//!
//! # Live listeners
//!
//! Listeners open a change stream on the collection and re-run the ordered
//! query after every change event. Change streams need a replica set or a
//! sharded cluster.

use crate::config::MongoConfig;
use crate::core::store::{DocumentStore, ErrorCallback, ListenerRegistration, SnapshotCallback};
use crate::core::stored::{Direction, Document, DocumentId, DocumentSnapshot, OrderBy, StoredValue, Timestamp};
use crate::core::StoreError;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, doc};
use mongodb::error::ErrorKind;
use mongodb::{Client, Collection, Database};
use serde_json::Number;
use uuid::Uuid;

const BACKEND: &str = "mongodb";

/// MongoDB error code for an unauthorized command
const UNAUTHORIZED: i32 = 13;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Convert a stored value into BSON
///
/// Timestamps are stored as BSON dates (millisecond precision). A sentinel
/// reaching this point is resolved with the client clock.
fn stored_to_bson(value: &StoredValue) -> Bson {
    match value {
        StoredValue::Null => Bson::Null,
        StoredValue::Bool(b) => Bson::Boolean(*b),
        StoredValue::Number(n) => number_to_bson(n),
        StoredValue::String(s) => Bson::String(s.clone()),
        StoredValue::Timestamp(ts) => Bson::DateTime(bson::DateTime::from_millis(ts.to_millis())),
        StoredValue::ServerTimestamp => {
            Bson::DateTime(bson::DateTime::from_millis(Timestamp::now().to_millis()))
        }
        StoredValue::Array(items) => Bson::Array(items.iter().map(stored_to_bson).collect()),
        StoredValue::Map(map) => Bson::Document(
            map.iter()
                .map(|(key, value)| (key.clone(), stored_to_bson(value)))
                .collect(),
        ),
    }
}

fn number_to_bson(n: &Number) -> Bson {
    if let Some(i) = n.as_i64() {
        Bson::Int64(i)
    } else {
        // u64 above i64::MAX and floats
        Bson::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Convert BSON read from MongoDB back into a stored value
///
/// BSON types without a storage counterpart (binary, regex, decimal, ...) are
/// carried as their string form.
fn bson_to_stored(value: Bson) -> StoredValue {
    match value {
        Bson::Null | Bson::Undefined => StoredValue::Null,
        Bson::Boolean(b) => StoredValue::Bool(b),
        Bson::Int32(i) => StoredValue::Number(Number::from(i)),
        Bson::Int64(i) => StoredValue::Number(Number::from(i)),
        Bson::Double(f) => Number::from_f64(f).map_or(StoredValue::Null, StoredValue::Number),
        Bson::String(s) => StoredValue::String(s),
        Bson::DateTime(dt) => StoredValue::Timestamp(Timestamp::from_millis(dt.timestamp_millis())),
        Bson::Timestamp(ts) => StoredValue::Timestamp(Timestamp::new(i64::from(ts.time), 0)),
        Bson::ObjectId(oid) => StoredValue::String(oid.to_hex()),
        Bson::Array(items) => StoredValue::Array(items.into_iter().map(bson_to_stored).collect()),
        Bson::Document(doc) => StoredValue::Map(
            doc.into_iter()
                .map(|(key, value)| (key, bson_to_stored(value)))
                .collect(),
        ),
        other => StoredValue::String(other.to_string()),
    }
}

/// Server clock for `field`, strictly past the date it currently holds
fn server_timestamp(field: &str) -> Bson {
    let current = format!("${}", field);
    Bson::Document(doc! {
        "$cond": [
            { "$eq": [{ "$type": current.as_str() }, "date"] },
            { "$max": ["$$NOW", { "$add": [current.as_str(), 1] }] },
            "$$NOW"
        ]
    })
}

/// Build the `$set` stage of a write pipeline
fn set_stage(document: &Document) -> bson::Document {
    document
        .iter()
        .map(|(key, value)| {
            let expression = match value {
                StoredValue::ServerTimestamp => server_timestamp(key),
                other => Bson::Document(doc! { "$literal": stored_to_bson(other) }),
            };
            (key.clone(), expression)
        })
        .collect()
}

/// Split a MongoDB document into its `_id` and fields
fn document_to_snapshot(mut doc: bson::Document) -> Result<DocumentSnapshot> {
    let id = match doc.remove("_id") {
        Some(Bson::String(id)) => id,
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(other) => return Err(anyhow!("Unsupported _id type: {:?}", other.element_type())),
        None => return Err(anyhow!("Document without _id")),
    };

    let data = doc
        .into_iter()
        .map(|(key, value)| (key, bson_to_stored(value)))
        .collect();

    Ok(DocumentSnapshot::new(DocumentId::new(id), data))
}

/// Map a driver error onto the store error categories
fn map_error(e: mongodb::error::Error) -> StoreError {
    match e.kind.as_ref() {
        ErrorKind::Authentication { message, .. } => StoreError::PermissionDenied(message.clone()),
        ErrorKind::Command(command) if command.code == UNAUTHORIZED => {
            StoreError::PermissionDenied(command.message.clone())
        }
        ErrorKind::ServerSelection { message, .. } => StoreError::unavailable(BACKEND, message.clone()),
        ErrorKind::InvalidArgument { message, .. } => StoreError::InvalidArgument(message.clone()),
        _ => StoreError::backend(BACKEND, e.to_string()),
    }
}

fn conversion_error(e: anyhow::Error) -> StoreError {
    StoreError::backend(BACKEND, format!("Failed to convert document: {}", e))
}

// ---------------------------------------------------------------------------
// MongoDocumentStore
// ---------------------------------------------------------------------------

/// Document store backed by MongoDB.
///
/// # Example
///
/// ```rust,ignore
/// use mongodb::Client;
/// use invoice_store::storage::MongoDocumentStore;
///
/// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
/// let store = MongoDocumentStore::new(client.database("billing"));
/// let repository = InvoiceRepository::new(Arc::new(store));
/// ```
#[derive(Clone, Debug)]
pub struct MongoDocumentStore {
    database: Database,
}

impl MongoDocumentStore {
    /// Create a new `MongoDocumentStore` with the given database handle.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Connect using the configured URI and database.
    pub async fn connect(config: &MongoConfig) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(&config.uri).await.map_err(map_error)?;
        tracing::info!(database = %config.database, "Connected to MongoDB");
        Ok(Self::new(client.database(&config.database)))
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, name: &str) -> Collection<bson::Document> {
        self.database.collection(name)
    }

    async fn ordered(
        &self,
        collection: &str,
        order: &OrderBy,
    ) -> Result<Vec<DocumentSnapshot>, StoreError> {
        let direction = match order.direction {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        };
        let field = order.field.as_str();

        let cursor = self
            .collection(collection)
            .find(doc! { field: { "$exists": true } })
            .sort(doc! { field: direction })
            .await
            .map_err(map_error)?;

        let docs: Vec<bson::Document> = cursor.try_collect().await.map_err(map_error)?;

        docs.into_iter()
            .map(|doc| document_to_snapshot(doc).map_err(conversion_error))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    /// Upsert under a fresh id through a `$set` pipeline.
    async fn create(&self, collection: &str, document: Document) -> Result<DocumentId, StoreError> {
        let id = DocumentId::new(Uuid::new_v4().simple().to_string());
        let filter = doc! { "_id": id.as_str() };

        if document.is_empty() {
            self.collection(collection)
                .insert_one(filter)
                .await
                .map_err(map_error)?;
        } else {
            self.collection(collection)
                .update_one(filter, vec![doc! { "$set": set_stage(&document) }])
                .upsert(true)
                .await
                .map_err(map_error)?;
        }

        Ok(id)
    }

    async fn get(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<DocumentSnapshot>, StoreError> {
        let doc = self
            .collection(collection)
            .find_one(doc! { "_id": id.as_str() })
            .await
            .map_err(map_error)?;

        doc.map(|d| document_to_snapshot(d).map_err(conversion_error))
            .transpose()
    }

    /// Merge fields through a `$set` pipeline.
    ///
    /// Returns `NotFound` if no document matched.
    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Document,
    ) -> Result<(), StoreError> {
        let filter = doc! { "_id": id.as_str() };
        let not_found = || StoreError::NotFound {
            collection: collection.to_string(),
            id: id.clone(),
        };

        if patch.is_empty() {
            return match self.get(collection, id).await? {
                Some(_) => Ok(()),
                None => Err(not_found()),
            };
        }

        let result = self
            .collection(collection)
            .update_one(filter, vec![doc! { "$set": set_stage(&patch) }])
            .await
            .map_err(map_error)?;

        if result.matched_count == 0 {
            return Err(not_found());
        }

        Ok(())
    }

    /// Delete by id; silently succeeds if the document does not exist.
    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), StoreError> {
        self.collection(collection)
            .delete_one(doc! { "_id": id.as_str() })
            .await
            .map_err(map_error)?;

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        order: &OrderBy,
    ) -> Result<Vec<DocumentSnapshot>, StoreError> {
        self.ordered(collection, order).await
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

        ListenerRegistration::spawn(move |state| async move {
            // Open the stream before the first read so no change slips in between
            let mut stream = match store.collection(&collection).watch().await {
                Ok(stream) => stream,
                Err(e) => {
                    on_error(map_error(e));
                    return;
                }
            };

            match store.ordered(&collection, &order).await {
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

            loop {
                match stream.try_next().await {
                    Ok(Some(_change)) => {}
                    Ok(None) => {
                        on_error(StoreError::unavailable(BACKEND, "change stream closed"));
                        return;
                    }
                    Err(e) => {
                        on_error(map_error(e));
                        return;
                    }
                }

                if !state.is_active() {
                    return;
                }
                match store.ordered(&collection, &order).await {
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
