//! Invoice read and write result types

use crate::core::normalize::Normalizer;
use crate::core::stored::{DocumentId, DocumentSnapshot};
use crate::core::value::{Record, Value, record_to_json};
use chrono::{DateTime, Utc};

use super::{CREATED_AT, UPDATED_AT};

/// An invoice as read back from the store
///
/// `data` holds every stored field, timestamps included, restored to the
/// application value space. The timestamps here are authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: DocumentId,
    pub data: Record,
}

impl Invoice {
    pub(crate) fn from_snapshot(snapshot: DocumentSnapshot, normalizer: &Normalizer) -> Self {
        Self {
            data: normalizer.document_from_storage(&snapshot.data),
            id: snapshot.id,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Store-assigned creation time
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.get(CREATED_AT).and_then(Value::as_date)
    }

    /// Store-assigned time of the last write
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.get(UPDATED_AT).and_then(Value::as_date)
    }

    /// Flatten into one JSON object with the id as the `id` field
    pub fn to_json(&self) -> serde_json::Value {
        let mut json = record_to_json(&self.data);
        if let Some(object) = json.as_object_mut() {
            object.insert("id".to_string(), serde_json::Value::String(self.id.to_string()));
        }
        json
    }
}

/// Result of creating an invoice
///
/// `data` is the caller's input exactly as given, before normalization. The
/// timestamps are local clock readings taken when the write returned, for
/// rendering right away; the authoritative values only come back through
/// [`list_all`](super::InvoiceRepository::list_all) or a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedInvoice {
    pub id: DocumentId,
    pub data: Record,
    pub estimated_created_at: DateTime<Utc>,
    pub estimated_updated_at: DateTime<Utc>,
}

/// Result of updating an invoice
///
/// `data` is the caller's patch exactly as given. `estimated_updated_at` is a
/// local clock reading, not the store's commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedInvoice {
    pub id: DocumentId,
    pub data: Record,
    pub estimated_updated_at: DateTime<Utc>,
}
