//! Persisted Session Storage
//!
//! Durable key-value storage shared by the API client, the router guard and
//! the state store. The only key the client relies on is [`TOKEN_KEY`], which
//! holds the bearer token between runs.
//!
//! - **file**: JSON document on disk, survives restarts
//! - **memory**: in-process map, for tests and throwaway sessions
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use dataplatform::storage::{FileStore, KeyValueStore, TOKEN_KEY};
//!
//! let store = FileStore::new("./session.json");
//! store.set_item(TOKEN_KEY, "eyJhbGciOi...")?;
//! assert!(store.get_item(TOKEN_KEY)?.is_some());
//! # Ok::<(), dataplatform::storage::StorageError>(())
//! ```

pub mod error;
pub mod file;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

/// Key under which the bearer token is persisted
pub const TOKEN_KEY: &str = "jwt";

/// Synchronous durable key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a key. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> StorageResult<()>;
}

/// Shared handle to the persisted storage
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Read the persisted bearer token.
///
/// Read failures and empty strings both count as "no token": callers treat the
/// token purely as a presence check.
pub fn persisted_token(store: &dyn KeyValueStore) -> Option<String> {
    match store.get_item(TOKEN_KEY) {
        Ok(Some(token)) if !token.is_empty() => Some(token),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read persisted token");
            None
        }
    }
}
