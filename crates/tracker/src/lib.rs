//! Referral Sync library.
//!
//! Captures referral identifiers from storefront page URLs, persists them in a
//! client-side store, and mirrors them into Shopify cart attributes so they
//! show up on the merchant's order.
//!
//! # Architecture
//!
//! [`ReferralSyncAgent`] owns the capture → persist → sync flow. Its three
//! collaborators are injected:
//! - [`RecordStore`] - synchronous key/value persistence ([`MemoryStore`], [`FileStore`])
//! - [`CartService`] - the remote cart ([`AjaxCartClient`])
//! - [`CartEvents`] - "cart updated" notifications that trigger reconciliation
//!
//! # Example
//!
//! ```rust,ignore
//! use referral_sync::{AjaxCartClient, CartEvents, FileStore, ReferralSyncAgent, SyncConfig};
//!
//! let config = SyncConfig::from_env()?;
//! let store = FileStore::open(&config.storage_dir)?;
//! let cart = AjaxCartClient::new(&config.cart)?;
//! let events = CartEvents::new();
//!
//! let handle = ReferralSyncAgent::initialize(store, cart, &events, &page_url);
//!
//! // Elsewhere, after the cart UI adds a line:
//! events.notify();
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod agent;
pub mod cart;
pub mod config;
pub mod events;
pub mod storage;

pub use agent::{CaptureOutcome, ReconcileOutcome, ReferralSyncAgent, SyncHandle};
pub use cart::{AjaxCartClient, CartError, CartService};
pub use config::{CartConfig, ConfigError, SyncConfig};
pub use events::{CartEvents, CartUpdated};
pub use storage::{FileStore, MemoryStore, RecordStore, StorageError};
