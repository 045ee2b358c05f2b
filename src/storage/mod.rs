//! Key/value persistence used by the group registry.
//!
//! The registry only needs two operations from its backing store: read a set
//! of keys and write a set of key/value pairs. Values are opaque strings; the
//! callers decide how to encode them (JSON in practice).

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::KeyValueStore;
