//! Durable key/value storage for client-held state.
//!
//! Keys are plain strings and values are JSON. Writes are last-write-wins with
//! no transactions.

mod error;
mod json_file;
mod memory;

pub use error::{StoreError, StoreErrorKind};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use serde_json::Value;

/// String-keyed, JSON-valued persistent storage.
pub trait DurableStore: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
