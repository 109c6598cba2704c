//! Conversion between the application and storage value spaces
//!
//! [`Normalizer::to_storage`] prepares application values for a write: undefined
//! object fields are dropped, dates are encoded, everything else is copied as-is.
//! [`Normalizer::from_storage`] restores values read from a store: native
//! timestamps become dates, everything else is copied as-is.
//!
//! Round-trip law: for any value without undefined fields,
//! `from_storage(to_storage(v)) == v` under [`DateEncoding::Timestamp`].
//! Under [`DateEncoding::Iso8601`] dates read back as strings, since ISO strings
//! are never re-parsed.

use crate::core::stored::{Document, StoredValue, Timestamp};
use crate::core::value::{Record, Value};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

/// How dates are written to the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateEncoding {
    /// Native store timestamp, restored to a date on read
    #[default]
    Timestamp,
    /// RFC 3339 string with millisecond precision, read back as a string
    Iso8601,
}

/// Bidirectional value normalizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalizer {
    date_encoding: DateEncoding,
}

impl Normalizer {
    pub fn new(date_encoding: DateEncoding) -> Self {
        Self { date_encoding }
    }

    pub fn date_encoding(&self) -> DateEncoding {
        self.date_encoding
    }

    /// Prepare a value for persistence
    ///
    /// Returns `None` only for a bare [`Value::Undefined`]. Inside arrays an
    /// undefined slot becomes `Null` so element positions are kept; inside
    /// objects undefined fields are dropped.
    pub fn to_storage(&self, value: &Value) -> Option<StoredValue> {
        let stored = match value {
            Value::Undefined => return None,
            Value::Null => StoredValue::Null,
            Value::Bool(b) => StoredValue::Bool(*b),
            Value::Number(n) => StoredValue::Number(n.clone()),
            Value::String(s) => StoredValue::String(s.clone()),
            Value::Date(date) => match self.date_encoding {
                DateEncoding::Timestamp => StoredValue::Timestamp(Timestamp::from_date(*date)),
                DateEncoding::Iso8601 => {
                    StoredValue::String(date.to_rfc3339_opts(SecondsFormat::Millis, true))
                }
            },
            Value::Array(items) => StoredValue::Array(
                items
                    .iter()
                    .map(|item| self.to_storage(item).unwrap_or(StoredValue::Null))
                    .collect(),
            ),
            Value::Object(record) => StoredValue::Map(self.record_to_storage(record)),
        };
        Some(stored)
    }

    /// Prepare a record for persistence, dropping undefined fields
    pub fn record_to_storage(&self, record: &Record) -> Document {
        record
            .iter()
            .filter_map(|(key, value)| {
                self.to_storage(value)
                    .map(|stored| (key.clone(), stored))
            })
            .collect()
    }

    /// Restore a value read from the store
    ///
    /// A server timestamp sentinel only shows up on a pending local write; it
    /// has no value yet and reads back as `Null`.
    pub fn from_storage(&self, value: &StoredValue) -> Value {
        match value {
            StoredValue::Timestamp(ts) => Value::Date(ts.to_date()),
            StoredValue::ServerTimestamp | StoredValue::Null => Value::Null,
            StoredValue::Bool(b) => Value::Bool(*b),
            StoredValue::Number(n) => Value::Number(n.clone()),
            StoredValue::String(s) => Value::String(s.clone()),
            StoredValue::Array(items) => {
                Value::Array(items.iter().map(|item| self.from_storage(item)).collect())
            }
            StoredValue::Map(map) => Value::Object(self.document_from_storage(map)),
        }
    }

    /// Restore a document read from the store, keeping every key
    pub fn document_from_storage(&self, document: &Document) -> Record {
        document
            .iter()
            .map(|(key, value)| (key.clone(), self.from_storage(value)))
            .collect()
    }
}

/// [`Normalizer::to_storage`] with native timestamp dates
pub fn to_storage(value: &Value) -> Option<StoredValue> {
    Normalizer::default().to_storage(value)
}

/// [`Normalizer::from_storage`] with native timestamp dates
pub fn from_storage(value: &StoredValue) -> Value {
    Normalizer::default().from_storage(value)
}
