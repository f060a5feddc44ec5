//! Core types for referral tracking.
//!
//! This module provides type-safe wrappers for the identifiers captured from
//! storefront URLs and the record persisted for them.

pub mod attributes;
pub mod record;
pub mod token;

pub use attributes::{CartAttributes, TrackedFields, TrackingKeys};
pub use record::{Capture, RecordError, ReferralRecord};
pub use token::*;
