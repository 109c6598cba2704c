//! Core module containing the value spaces, the normalizer and the store seam

pub mod error;
pub mod events;
pub mod normalize;
pub mod store;
pub mod stored;
pub mod value;

pub use error::{ConfigError, Operation, PersistenceError, StoreError};
pub use events::{DocumentEvent, EventBus, EventEnvelope, StoreEvent};
pub use normalize::{DateEncoding, Normalizer, from_storage, to_storage};
pub use store::{
    DocumentStore, ErrorCallback, ListenerRegistration, ListenerState, SnapshotCallback,
};
pub use stored::{Direction, Document, DocumentId, DocumentSnapshot, OrderBy, StoredValue, Timestamp};
pub use value::{Record, Value};
