//! Client-side persistence for the referral record.
//!
//! Stores behave like browser `localStorage`: synchronous string values under
//! string keys. Reads and writes never interleave with each other, so the
//! record cannot be torn by overlapping reconciliations.

mod file;
mod memory;

use std::sync::Arc;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors that can occur when reading or writing a store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing would exceed the store's capacity.
    #[error("Storage quota of {limit} bytes exceeded")]
    QuotaExceeded {
        /// Capacity in bytes.
        limit: usize,
    },

    /// Key cannot be represented by this store.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Store cannot be used at all (disabled, poisoned).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A synchronous key/value store.
pub trait RecordStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value under `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be modified.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}
