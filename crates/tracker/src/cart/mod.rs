//! Remote cart service.
//!
//! # Architecture
//!
//! - The cart lives in Shopify; this crate only reads and writes its custom
//!   attributes, it never mirrors the cart locally
//! - [`CartService`] is the seam the agent depends on; [`AjaxCartClient`]
//!   implements it against the storefront AJAX endpoints
//!
//! # Endpoints
//!
//! - `GET /cart.js` - current cart, including `attributes`
//! - `POST /cart/update.js` - merge `{ "attributes": {...} }` into the cart

mod ajax;

use std::future::Future;

pub use ajax::AjaxCartClient;

use referral_sync_core::CartAttributes;
use thiserror::Error;

/// Errors that can occur when talking to the cart service.
#[derive(Debug, Error)]
pub enum CartError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Cart service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Leading part of the response body.
        body: String,
    },

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid cart URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Read and write access to the live cart's custom attributes.
pub trait CartService: Send + Sync + 'static {
    /// Fetch the cart's current attributes.
    fn attributes(&self) -> impl Future<Output = Result<CartAttributes, CartError>> + Send;

    /// Merge `attributes` into the cart in a single request.
    fn update_attributes(
        &self,
        attributes: &CartAttributes,
    ) -> impl Future<Output = Result<(), CartError>> + Send;
}
