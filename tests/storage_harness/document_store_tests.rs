//! Macro-generated test suite for `DocumentStore` contract validation.
//!
//! The `document_store_tests!` macro generates a test module that validates any
//! `DocumentStore` implementation against the full contract: id generation,
//! server timestamps, merge updates, ordered queries, live listeners and
//! concurrent access.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//! use invoice_store::storage::InMemoryDocumentStore;
//!
//! document_store_tests!(InMemoryDocumentStore::new());
//! ```
//!
//! # Generated Tests
//!
//! ## CRUD
//! - `test_create_and_get`: create then retrieve, verify fields and id
//! - `test_create_assigns_unique_ids`: ids are non-empty and distinct
//! - `test_get_nonexistent`: get with an unknown id returns None
//! - `test_update_merges_fields`: untouched fields survive a patch
//! - `test_update_refreshes_timestamp`: updatedAt moves forward, createdAt stays
//! - `test_back_to_back_updates_advance_timestamp`: no pause between writes
//! - `test_update_nonexistent`: update on an unknown id returns NotFound
//! - `test_delete_existing`: delete then get returns None
//! - `test_delete_nonexistent`: delete on an unknown id succeeds
//!
//! ## Queries
//! - `test_query_empty`: query on an empty collection returns empty vec
//! - `test_query_orders_by_field`: newest first / oldest first
//! - `test_query_skips_documents_without_field`
//! - `test_nested_values_preserved`: maps, arrays, nulls, timestamps
//!
//! ## Listeners
//! - `test_listener_delivers_initial_set`
//! - `test_listener_delivers_full_set_after_change`
//! - `test_removed_listener_stays_quiet`
//!
//! ## Edge Cases
//! - `test_concurrent_creates`: parallel creates from spawned tasks

/// Generate a full `DocumentStore` conformance test suite.
///
/// `$factory` must be an expression that evaluates to a fresh, empty store
/// implementing `DocumentStore + Clone + 'static`. It is re-evaluated for each
/// test to ensure isolation.
#[macro_export]
macro_rules! document_store_tests {
    ($factory:expr) => {
        mod document_store_contract_tests {
            use super::*;
            use invoice_store::core::{
                DocumentId, DocumentStore, OrderBy, StoreError, StoredValue, Timestamp,
            };
            use std::time::Duration;

            // ==================================================================
            // CRUD: Create & Get
            // ==================================================================

            #[tokio::test]
            async fn test_create_and_get() {
                let store = $factory;

                let id = store
                    .create(COLLECTION, test_document("Alice", 30))
                    .await
                    .unwrap();

                let snapshot = store.get(COLLECTION, &id).await.unwrap();
                assert!(snapshot.is_some(), "Document should exist after create");
                let snapshot = snapshot.unwrap();
                assert_eq!(snapshot.id, id);
                assert_eq!(title_of(&snapshot), Some("Alice"));
                assert_eq!(
                    snapshot.data.get("amount"),
                    Some(&StoredValue::Number(30.into()))
                );
                timestamp_field(&snapshot.data, "createdAt");
                timestamp_field(&snapshot.data, "updatedAt");
            }

            #[tokio::test]
            async fn test_create_assigns_unique_ids() {
                let store = $factory;

                let first = store.create(COLLECTION, test_document("A", 1)).await.unwrap();
                let second = store.create(COLLECTION, test_document("B", 2)).await.unwrap();

                assert!(!first.is_empty());
                assert!(!second.is_empty());
                assert_ne!(first, second);
            }

            #[tokio::test]
            async fn test_get_nonexistent() {
                let store = $factory;

                let result = store
                    .get(COLLECTION, &DocumentId::from("does-not-exist"))
                    .await
                    .unwrap();
                assert!(result.is_none(), "Unknown id should return None");
            }

            // ==================================================================
            // CRUD: Update
            // ==================================================================

            #[tokio::test]
            async fn test_update_merges_fields() {
                let store = $factory;
                let id = store.create(COLLECTION, test_document("A", 10)).await.unwrap();

                store.update(COLLECTION, &id, title_patch("B")).await.unwrap();

                let data = store.get(COLLECTION, &id).await.unwrap().unwrap().data;
                assert_eq!(data.get("title").and_then(StoredValue::as_str), Some("B"));
                assert_eq!(
                    data.get("amount"),
                    Some(&StoredValue::Number(10.into())),
                    "Fields absent from the patch must be left untouched"
                );
            }

            #[tokio::test]
            async fn test_update_refreshes_timestamp() {
                let store = $factory;
                let id = store.create(COLLECTION, test_document("A", 10)).await.unwrap();
                let before = store.get(COLLECTION, &id).await.unwrap().unwrap().data;

                tick().await;
                store.update(COLLECTION, &id, title_patch("B")).await.unwrap();

                let after = store.get(COLLECTION, &id).await.unwrap().unwrap().data;
                assert!(
                    timestamp_field(&after, "updatedAt") > timestamp_field(&before, "updatedAt"),
                    "updatedAt must move forward"
                );
                assert_eq!(
                    timestamp_field(&after, "createdAt"),
                    timestamp_field(&before, "createdAt")
                );
            }

            #[tokio::test]
            async fn test_back_to_back_updates_advance_timestamp() {
                let store = $factory;
                let id = store.create(COLLECTION, test_document("A", 10)).await.unwrap();
                let mut previous = timestamp_field(
                    &store.get(COLLECTION, &id).await.unwrap().unwrap().data,
                    "updatedAt",
                );

                for title in ["B", "C", "D"] {
                    store.update(COLLECTION, &id, title_patch(title)).await.unwrap();
                    let current = timestamp_field(
                        &store.get(COLLECTION, &id).await.unwrap().unwrap().data,
                        "updatedAt",
                    );
                    assert!(current > previous, "updatedAt must move forward without a pause");
                    previous = current;
                }
            }

            #[tokio::test]
            async fn test_update_nonexistent() {
                let store = $factory;

                let result = store
                    .update(COLLECTION, &DocumentId::from("ghost"), title_patch("B"))
                    .await;
                assert!(
                    matches!(result, Err(StoreError::NotFound { .. })),
                    "Updating an unknown id should fail with NotFound, got {:?}",
                    result
                );
            }

            // ==================================================================
            // CRUD: Delete
            // ==================================================================

            #[tokio::test]
            async fn test_delete_existing() {
                let store = $factory;
                let id = store.create(COLLECTION, test_document("A", 1)).await.unwrap();

                store.delete(COLLECTION, &id).await.unwrap();

                assert!(store.get(COLLECTION, &id).await.unwrap().is_none());
                let remaining = store
                    .query(COLLECTION, &OrderBy::desc(ORDER_FIELD))
                    .await
                    .unwrap();
                assert!(remaining.iter().all(|s| s.id != id));
            }

            #[tokio::test]
            async fn test_delete_nonexistent() {
                let store = $factory;

                let result = store.delete(COLLECTION, &DocumentId::from("ghost")).await;
                assert!(result.is_ok(), "Deleting an unknown id should succeed");
            }

            // ==================================================================
            // Queries
            // ==================================================================

            #[tokio::test]
            async fn test_query_empty() {
                let store = $factory;

                let all = store
                    .query(COLLECTION, &OrderBy::desc(ORDER_FIELD))
                    .await
                    .unwrap();
                assert!(all.is_empty());
            }

            #[tokio::test]
            async fn test_query_orders_by_field() {
                let store = $factory;
                for (i, title) in ["A", "B", "C"].into_iter().enumerate() {
                    store
                        .create(COLLECTION, test_document(title, i as i64))
                        .await
                        .unwrap();
                    tick().await;
                }

                let newest_first = store
                    .query(COLLECTION, &OrderBy::desc(ORDER_FIELD))
                    .await
                    .unwrap();
                assert_eq!(titles(&newest_first), vec!["C", "B", "A"]);

                let oldest_first = store
                    .query(COLLECTION, &OrderBy::asc(ORDER_FIELD))
                    .await
                    .unwrap();
                assert_eq!(titles(&oldest_first), vec!["A", "B", "C"]);
            }

            #[tokio::test]
            async fn test_query_skips_documents_without_field() {
                let store = $factory;
                store.create(COLLECTION, test_document("timed", 1)).await.unwrap();
                store.create(COLLECTION, title_patch("untimed")).await.unwrap();

                let all = store
                    .query(COLLECTION, &OrderBy::desc(ORDER_FIELD))
                    .await
                    .unwrap();
                assert_eq!(titles(&all), vec!["timed"]);
            }

            #[tokio::test]
            async fn test_nested_values_preserved() {
                let store = $factory;
                let due = Timestamp::from_millis(1_717_000_000_123);

                let mut client = invoice_store::core::Document::new();
                client.insert("name".into(), StoredValue::String("Acme".into()));
                client.insert("vat".into(), StoredValue::Null);

                let mut doc = test_document("nested", 1);
                doc.insert("client".into(), StoredValue::Map(client.clone()));
                doc.insert(
                    "lines".into(),
                    StoredValue::Array(vec![StoredValue::Bool(true), StoredValue::Null]),
                );
                doc.insert("due".into(), StoredValue::Timestamp(due));

                let id = store.create(COLLECTION, doc).await.unwrap();
                let data = store.get(COLLECTION, &id).await.unwrap().unwrap().data;

                assert_eq!(data.get("client"), Some(&StoredValue::Map(client)));
                assert_eq!(
                    data.get("lines"),
                    Some(&StoredValue::Array(vec![StoredValue::Bool(true), StoredValue::Null]))
                );
                assert_eq!(data.get("due"), Some(&StoredValue::Timestamp(due)));
            }

            // ==================================================================
            // Listeners
            // ==================================================================

            #[tokio::test]
            async fn test_listener_delivers_initial_set() {
                let store = $factory;
                store.create(COLLECTION, test_document("existing", 1)).await.unwrap();

                let (on_change, on_error, mut inbox) = listener_inbox();
                let registration =
                    store.subscribe(COLLECTION, OrderBy::desc(ORDER_FIELD), on_change, on_error);

                let initial = inbox.next().await;
                assert_eq!(titles(&initial), vec!["existing"]);
                registration.remove();
            }

            #[tokio::test]
            async fn test_listener_delivers_full_set_after_change() {
                let store = $factory;
                store.create(COLLECTION, test_document("A", 1)).await.unwrap();

                let (on_change, on_error, mut inbox) = listener_inbox();
                let registration =
                    store.subscribe(COLLECTION, OrderBy::desc(ORDER_FIELD), on_change, on_error);
                inbox.next().await;

                tick().await;
                let id = store.create(COLLECTION, test_document("B", 2)).await.unwrap();

                let after_create = inbox.next_matching(|s| s.len() == 2).await;
                assert_eq!(titles(&after_create), vec!["B", "A"]);

                store.delete(COLLECTION, &id).await.unwrap();
                let after_delete = inbox.next_matching(|s| s.len() == 1).await;
                assert_eq!(titles(&after_delete), vec!["A"]);

                registration.remove();
            }

            #[tokio::test]
            async fn test_removed_listener_stays_quiet() {
                let store = $factory;

                let (on_change, on_error, mut inbox) = listener_inbox();
                let registration =
                    store.subscribe(COLLECTION, OrderBy::desc(ORDER_FIELD), on_change, on_error);
                inbox.next().await;
                assert!(registration.is_active());

                registration.remove();
                inbox.drain();
                store.create(COLLECTION, test_document("late", 1)).await.unwrap();

                inbox.assert_quiet(Duration::from_millis(200)).await;
            }

            // ==================================================================
            // Edge Cases
            // ==================================================================

            #[tokio::test]
            async fn test_concurrent_creates() {
                let store = $factory;
                let mut handles = Vec::new();

                for i in 0..10 {
                    let store = store.clone();
                    handles.push(tokio::spawn(async move {
                        store
                            .create(COLLECTION, test_document(&format!("doc-{}", i), i))
                            .await
                            .unwrap()
                    }));
                }

                let mut ids = Vec::new();
                for handle in handles {
                    ids.push(handle.await.unwrap());
                }
                ids.sort();
                ids.dedup();
                assert_eq!(ids.len(), 10, "Every concurrent create gets its own id");

                let all = store
                    .query(COLLECTION, &OrderBy::desc(ORDER_FIELD))
                    .await
                    .unwrap();
                assert_eq!(all.len(), 10);
            }
        }
    };
}
