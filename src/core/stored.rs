//! Storage value space
//!
//! These are the value types a document store accepts and returns. There is no
//! undefined here: a field is either present with a value or absent. Dates are
//! carried as [`Timestamp`], the store's native time type, and
//! [`StoredValue::ServerTimestamp`] is the write-time sentinel the store replaces
//! with its own clock at commit.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::cmp::Ordering;
use std::fmt;

/// A stored document: field name to value, in insertion order
pub type Document = IndexMap<String, StoredValue>;

/// Opaque document identifier assigned by the store at creation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The store's native point in time
///
/// Seconds since the Unix epoch plus a nanosecond fraction, always normalized
/// so that `nanos < 1_000_000_000`. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    seconds: i64,
    nanos: u32,
}

impl Timestamp {
    const NANOS_PER_SECOND: u32 = 1_000_000_000;

    /// Build a timestamp, carrying excess nanoseconds into the seconds
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self {
            seconds: seconds + i64::from(nanos / Self::NANOS_PER_SECOND),
            nanos: nanos % Self::NANOS_PER_SECOND,
        }
    }

    pub fn now() -> Self {
        Self::from_date(Utc::now())
    }

    pub fn from_date(date: DateTime<Utc>) -> Self {
        Self::new(date.timestamp(), date.timestamp_subsec_nanos())
    }

    pub fn from_millis(millis: i64) -> Self {
        let seconds = millis.div_euclid(1000);
        let nanos = (millis.rem_euclid(1000) as u32) * 1_000_000;
        Self::new(seconds, nanos)
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    pub fn to_millis(&self) -> i64 {
        self.seconds * 1000 + i64::from(self.nanos / 1_000_000)
    }

    /// Convert to a native date
    ///
    /// Values outside the range chrono can represent clamp to the epoch.
    pub fn to_date(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.seconds, self.nanos).unwrap_or_default()
    }

    /// The smallest timestamp strictly after this one
    pub fn successor(&self) -> Self {
        Self::new(self.seconds, self.nanos + 1)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_date().to_rfc3339())
    }
}

/// A value in the storage value space
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Timestamp(Timestamp),
    /// Write-time placeholder replaced by the store's clock at commit
    ServerTimestamp,
    Array(Vec<StoredValue>),
    Map(Document),
}

impl StoredValue {
    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            StoredValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoredValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Document> {
        match self {
            StoredValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Replace every server timestamp sentinel with the commit time
    pub fn resolve_server_timestamps(&mut self, commit_time: Timestamp) {
        match self {
            StoredValue::ServerTimestamp => *self = StoredValue::Timestamp(commit_time),
            StoredValue::Array(items) => items
                .iter_mut()
                .for_each(|item| item.resolve_server_timestamps(commit_time)),
            StoredValue::Map(map) => resolve_document_timestamps(map, commit_time),
            _ => {}
        }
    }

    /// Rank of the value's type in the cross-type sort order
    fn type_rank(&self) -> u8 {
        match self {
            StoredValue::Null => 0,
            StoredValue::Bool(_) => 1,
            StoredValue::Number(_) => 2,
            StoredValue::Timestamp(_) | StoredValue::ServerTimestamp => 3,
            StoredValue::String(_) => 4,
            StoredValue::Array(_) => 5,
            StoredValue::Map(_) => 6,
        }
    }

    /// Total order used by ordered queries
    ///
    /// Values of different types sort by type (null, booleans, numbers,
    /// timestamps, strings, arrays, maps); values of the same type sort
    /// naturally. A pending server timestamp sorts after every resolved one.
    pub fn query_cmp(&self, other: &StoredValue) -> Ordering {
        match (self, other) {
            (StoredValue::Null, StoredValue::Null) => Ordering::Equal,
            (StoredValue::Bool(a), StoredValue::Bool(b)) => a.cmp(b),
            (StoredValue::Number(a), StoredValue::Number(b)) => compare_numbers(a, b),
            (StoredValue::Timestamp(a), StoredValue::Timestamp(b)) => a.cmp(b),
            (StoredValue::ServerTimestamp, StoredValue::ServerTimestamp) => Ordering::Equal,
            (StoredValue::Timestamp(_), StoredValue::ServerTimestamp) => Ordering::Less,
            (StoredValue::ServerTimestamp, StoredValue::Timestamp(_)) => Ordering::Greater,
            (StoredValue::String(a), StoredValue::String(b)) => a.cmp(b),
            (StoredValue::Array(a), StoredValue::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.query_cmp(y))
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (StoredValue::Map(a), StoredValue::Map(b)) => a
                .iter()
                .zip(b.iter())
                .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.query_cmp(vb)))
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x.cmp(&y);
    }
    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    x.total_cmp(&y)
}

/// Replace every server timestamp sentinel in a document with the commit time
pub fn resolve_document_timestamps(document: &mut Document, commit_time: Timestamp) {
    document
        .values_mut()
        .for_each(|value| value.resolve_server_timestamps(commit_time));
}

/// Sort direction of an ordered query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering of an ordered query: one field and a direction
///
/// Documents that lack the field are not part of the result, the same way an
/// index on that field would not contain them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    /// Compare two documents on the ordering field
    ///
    /// Both documents are expected to carry the field.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => x.query_cmp(y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// A document read from the store together with its id
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: DocumentId,
    pub data: Document,
}

impl DocumentSnapshot {
    pub fn new(id: DocumentId, data: Document) -> Self {
        Self { id, data }
    }
}
