//! Shopify AJAX cart API client.
//!
//! Uses `reqwest` with a cookie jar so every request addresses the same cart
//! (Shopify identifies the AJAX cart by its `cart` cookie).

use std::sync::Arc;

use referral_sync_core::CartAttributes;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use url::Url;

use super::{CartError, CartService};
use crate::config::CartConfig;

/// Characters of an error body kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 200;

/// Client for the storefront AJAX cart endpoints.
#[derive(Clone)]
pub struct AjaxCartClient {
    inner: Arc<AjaxCartClientInner>,
}

struct AjaxCartClientInner {
    client: reqwest::Client,
    cart_url: Url,
    update_url: Url,
}

/// Subset of the `/cart.js` document this client reads.
#[derive(Debug, Deserialize)]
struct CartDocument {
    #[serde(default)]
    attributes: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
struct AttributesUpdate<'a> {
    attributes: &'a CartAttributes,
}

impl AjaxCartClient {
    /// Create a new cart client.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URLs cannot be built or the HTTP client
    /// fails to build.
    pub fn new(config: &CartConfig) -> Result<Self, CartError> {
        let cart_url = config.store_url.join("cart.js")?;
        let update_url = config.store_url.join("cart/update.js")?;

        let jar = Jar::default();
        if let Some(token) = &config.cart_token {
            jar.add_cookie_str(
                &format!("cart={}", token.expose_secret()),
                &config.store_url,
            );
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_provider(Arc::new(jar))
            .build()?;

        Ok(Self {
            inner: Arc::new(AjaxCartClientInner {
                client,
                cart_url,
                update_url,
            }),
        })
    }

    /// The `/cart.js` endpoint.
    #[must_use]
    pub fn cart_url(&self) -> &Url {
        &self.inner.cart_url
    }

    /// The `/cart/update.js` endpoint.
    #[must_use]
    pub fn update_url(&self) -> &Url {
        &self.inner.update_url
    }
}

impl CartService for AjaxCartClient {
    #[instrument(skip(self), fields(url = %self.inner.cart_url))]
    async fn attributes(&self) -> Result<CartAttributes, CartError> {
        let response = self.inner.client.get(self.inner.cart_url.clone()).send().await?;
        let body = read_success_body(response).await?;

        let document: CartDocument = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body),
                "Failed to parse cart document"
            );
            CartError::Parse(e)
        })?;

        let attributes = convert_attributes(document.attributes.unwrap_or_default());
        debug!(count = attributes.len(), "Fetched cart attributes");
        Ok(attributes)
    }

    #[instrument(skip(self, attributes), fields(url = %self.inner.update_url, count = attributes.len()))]
    async fn update_attributes(&self, attributes: &CartAttributes) -> Result<(), CartError> {
        let response = self
            .inner
            .client
            .post(self.inner.update_url.clone())
            .json(&AttributesUpdate { attributes })
            .send()
            .await?;

        read_success_body(response).await?;
        debug!("Cart attributes updated");
        Ok(())
    }
}

/// Return the body of a successful response, or the matching error.
async fn read_success_body(response: reqwest::Response) -> Result<String, CartError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(CartError::RateLimited(retry_after));
    }

    let body = response.text().await?;

    if !status.is_success() {
        tracing::error!(
            status = %status,
            body = %truncate(&body),
            "Cart service returned non-success status"
        );
        return Err(CartError::Status {
            status: status.as_u16(),
            body: truncate(&body),
        });
    }

    Ok(body)
}

/// Flatten raw attribute values to strings; `null` means unset.
fn convert_attributes(raw: Map<String, Value>) -> CartAttributes {
    raw.into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

fn truncate(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}
