//! Referral Sync Core - Shared types library.
//!
//! This crate provides the types shared by the referral tracker and its
//! tooling:
//! - `referral-sync` - Capture, persistence and cart synchronization
//! - `referral-sync-cli` - Operator command line
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no storage access,
//! no HTTP clients. Merging a capture into a record and deciding which cart
//! attributes diverge are both pure functions in [`types::record`].
//!
//! # Modules
//!
//! - [`types`] - Identifier newtypes, the persisted record, cart attributes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
