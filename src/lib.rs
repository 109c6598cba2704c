//! # Invoice Store
//!
//! A thin data-access layer for invoices kept in a document database.
//!
//! ## Features
//!
//! - **CRUD Repository**: create, merge-update, delete and list invoices
//! - **Value Normalization**: undefined fields never reach the store, native
//!   dates survive the round trip
//! - **Server Timestamps**: `createdAt` and `updatedAt` come from the store's
//!   clock, with client-side estimates returned for immediate use
//! - **Live Subscriptions**: the full ordered invoice list is pushed after
//!   every change, by any client
//! - **Pluggable Storage**: in-memory store built in, MongoDB behind the
//!   `mongodb_backend` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use invoice_store::prelude::*;
//!
//! let store = Arc::new(InMemoryDocumentStore::new());
//! let repository = InvoiceRepository::new(store);
//!
//! let created = repository
//!     .create(record! { "title" => "Consulting", "amount" => 1200 })
//!     .await?;
//!
//! let subscription = repository.subscribe(|invoices| {
//!     println!("{} invoices", invoices.len());
//! });
//!
//! repository.update(&created.id, record! { "amount" => 1500 }).await?;
//! subscription.unsubscribe();
//! ```

pub mod config;
pub mod core;
pub mod invoices;
pub mod storage;
pub mod telemetry;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        DateEncoding, Document, DocumentId, DocumentSnapshot, DocumentStore, ListenerRegistration,
        Normalizer, OrderBy, PersistenceError, Record, StoreError, StoredValue, Timestamp, Value,
        from_storage, to_storage,
    };

    // === Macros ===
    pub use crate::record;

    // === Invoices ===
    pub use crate::invoices::{
        CREATED_AT, CreatedInvoice, INVOICES_COLLECTION, Invoice, InvoiceRepository,
        InvoiceSubscription, UPDATED_AT, UpdatedInvoice,
    };

    // === Storage ===
    pub use crate::storage::InMemoryDocumentStore;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoDocumentStore;

    // === Config ===
    pub use crate::config::{MongoConfig, StoreConfig};
    pub use crate::telemetry::init_tracing;

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use std::sync::Arc;
}
