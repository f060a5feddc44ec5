//! Sync configuration loaded from environment variables.
//!
//! Only the composition layer (the CLI) reads the environment; the agent
//! itself receives everything through its constructor.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPIFY_STORE_URL` - Storefront base URL (e.g., `https://your-store.myshopify.com`)
//!
//! ## Optional
//! - `SHOPIFY_CART_TOKEN` - Existing cart token, sent as the `cart` cookie
//! - `REFERRAL_STORAGE_DIR` - Directory for the file store (default: .referral-sync)
//! - `REFERRAL_STORAGE_KEY` - Key the record is stored under (default: `referral_data`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;

use referral_sync_core::TrackingKeys;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Key the referral record is stored under unless overridden.
pub const DEFAULT_STORAGE_KEY: &str = "referral_data";

/// Directory for the file store unless overridden.
pub const DEFAULT_STORAGE_DIR: &str = ".referral-sync";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Referral sync configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote cart configuration
    pub cart: CartConfig,
    /// Directory backing the file store
    pub storage_dir: PathBuf,
    /// Key the referral record is stored under
    pub storage_key: String,
    /// Query parameter and cart attribute names
    pub keys: TrackingKeys,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Shopify AJAX cart configuration.
///
/// Implements `Debug` manually to redact the cart token.
#[derive(Clone)]
pub struct CartConfig {
    /// Storefront base URL, always ending in `/`
    pub store_url: Url,
    /// Cart token identifying an existing cart
    pub cart_token: Option<SecretString>,
}

impl std::fmt::Debug for CartConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartConfig")
            .field("store_url", &self.store_url.as_str())
            .field(
                "cart_token",
                &self.cart_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let cart = CartConfig::from_env()?;
        let storage_dir = PathBuf::from(get_env_or_default(
            "REFERRAL_STORAGE_DIR",
            DEFAULT_STORAGE_DIR,
        ));
        let storage_key = get_env_or_default("REFERRAL_STORAGE_KEY", DEFAULT_STORAGE_KEY);
        if storage_key.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "REFERRAL_STORAGE_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        Ok(Self {
            cart,
            storage_dir,
            storage_key,
            keys: TrackingKeys::default(),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl CartConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = get_required_env("SHOPIFY_STORE_URL")?;
        let store_url = parse_store_url(&raw)
            .map_err(|reason| ConfigError::InvalidEnvVar("SHOPIFY_STORE_URL".to_string(), reason))?;

        Ok(Self {
            store_url,
            cart_token: get_optional_env("SHOPIFY_CART_TOKEN").map(SecretString::from),
        })
    }
}

/// Parse a storefront base URL, normalizing it to end in `/`.
///
/// # Errors
///
/// Returns a description of the problem if the URL is unparsable, not
/// http(s), or carries a query or fragment.
pub fn parse_store_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| e.to_string())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_store_url_adds_trailing_slash() {
        let url = parse_store_url("https://shop.test").unwrap();
        assert_eq!(url.as_str(), "https://shop.test/");

        let url = parse_store_url("https://shop.test/en").unwrap();
        assert_eq!(url.as_str(), "https://shop.test/en/");
    }

    #[test]
    fn test_parse_store_url_rejects_other_schemes() {
        let err = parse_store_url("ftp://shop.test").unwrap_err();
        assert!(err.contains("ftp"));
    }

    #[test]
    fn test_parse_store_url_rejects_query() {
        assert!(parse_store_url("https://shop.test/?ref=a").is_err());
        assert!(parse_store_url("not a url").is_err());
    }

    #[test]
    fn test_cart_config_debug_redacts_token() {
        let config = CartConfig {
            store_url: Url::parse("https://shop.test/").unwrap(),
            cart_token: Some(SecretString::from("super_secret_cart_token")),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("shop.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_cart_token"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnvVar("SHOPIFY_STORE_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SHOPIFY_STORE_URL"
        );
    }
}
