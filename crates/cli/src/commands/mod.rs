//! CLI command implementations.
//!
//! Every command builds the same agent from [`SyncConfig`]: a [`FileStore`]
//! in the configured directory and an [`AjaxCartClient`] for the store.

pub mod record;
pub mod sync;

use referral_sync::{
    AjaxCartClient, CartError, ConfigError, FileStore, ReferralSyncAgent, StorageError, SyncConfig,
};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The store could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The cart client could not be built.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// The page URL argument is invalid.
    #[error("Invalid page URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Reading stdin failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task panicked or was cancelled.
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The record could not be printed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The captured record could not be written; details are in the log.
    #[error("Referral record could not be written to {0}")]
    NotPersisted(String),

    /// Reconciliation did not reach the cart; details are in the log.
    #[error("Cart sync failed")]
    SyncFailed,
}

/// The agent type every command works with.
pub type Agent = ReferralSyncAgent<FileStore, AjaxCartClient>;

/// Build the agent described by `config`.
fn build_agent(config: &SyncConfig) -> Result<Agent, CommandError> {
    let store = FileStore::open(&config.storage_dir)?;
    let cart = AjaxCartClient::new(&config.cart)?;

    Ok(ReferralSyncAgent::new(store, cart)
        .with_keys(config.keys.clone())
        .with_storage_key(&config.storage_key))
}
