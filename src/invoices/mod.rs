//! Invoice data access
//!
//! [`InvoiceRepository`] is the only entry point: create, update, delete,
//! list and a live subscription, all on the fixed `invoices` collection.

pub mod model;
pub mod repository;

pub use model::{CreatedInvoice, Invoice, UpdatedInvoice};
pub use repository::{InvoiceRepository, InvoiceSubscription};

/// Collection holding every invoice
pub const INVOICES_COLLECTION: &str = "invoices";

/// Store-managed creation time, set once at first persistence
pub const CREATED_AT: &str = "createdAt";

/// Store-managed time of the last write
pub const UPDATED_AT: &str = "updatedAt";

/// Identity key; lives in the document key, never in stored fields
pub const ID: &str = "id";
