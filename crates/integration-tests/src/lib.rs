//! Integration tests for referral sync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p referral-sync-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_client` - AJAX cart client against a mock storefront
//! - `referral_sync` - Agent end to end: file store, mock cart, notifications
//!
//! The mock storefront is a `wiremock` server; no Shopify store is needed.

use referral_sync::config::parse_store_url;
use referral_sync::{AjaxCartClient, CartConfig};
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::MockServer;

/// Mock storefront plus a cart client pointed at it.
pub struct TestStore {
    pub server: MockServer,
    pub config: CartConfig,
}

impl TestStore {
    /// Start a mock storefront without a cart token.
    ///
    /// # Panics
    ///
    /// Panics if the mock server URI cannot be parsed.
    pub async fn start() -> Self {
        Self::start_with_token(None).await
    }

    /// Start a mock storefront whose client sends `token` as the cart cookie.
    ///
    /// # Panics
    ///
    /// Panics if the mock server URI cannot be parsed.
    #[allow(clippy::expect_used)]
    pub async fn start_with_token(token: Option<&str>) -> Self {
        let server = MockServer::start().await;
        let store_url = parse_store_url(&server.uri()).expect("mock server URI is valid");

        Self {
            server,
            config: CartConfig {
                store_url,
                cart_token: token.map(SecretString::from),
            },
        }
    }

    /// Build a cart client for this store.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn client(&self) -> AjaxCartClient {
        AjaxCartClient::new(&self.config).expect("cart client builds")
    }

    /// JSON bodies of every `POST /cart/update.js` received so far.
    pub async fn update_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == "/cart/update.js")
            .filter_map(|r| r.body_json::<Value>().ok())
            .collect()
    }

    /// Number of `GET /cart.js` requests received so far.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/cart.js")
            .count()
    }
}

/// A minimal `/cart.js` document carrying `attributes`.
#[must_use]
pub fn cart_document(attributes: &Value) -> Value {
    json!({
        "token": "c1-test",
        "item_count": 1,
        "items": [],
        "attributes": attributes,
    })
}
