//! # convoke-store
//!
//! Durable, concurrency-safe persistence for small JSON records.
//!
//! Each record lives in its own `<id>.json` file, written under an advisory
//! lock on a `<id>.json.lock` sidecar. A namespace never holds more than its
//! configured number of records; the least recently modified are pruned
//! after every save.

mod blob;
mod record;
mod schemas;

pub use blob::{validate_id, BlobEntry, BlobStore, FsBlobStore, WriteOutcome};
pub use record::{Record, RecordStore};
pub use schemas::{DebateRecord, TraceRecord};
