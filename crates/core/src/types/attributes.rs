//! Cart attribute snapshot and the keys used to track referrals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Query parameter carrying the referral code.
pub const REFERRAL_CODE_PARAM: &str = "ref";
/// Query parameter carrying the order identifier.
pub const ORDER_ID_PARAM: &str = "order_id";
/// Cart attribute holding the referral code.
pub const REFERRAL_CODE_ATTRIBUTE: &str = "referral_code";
/// Cart attribute holding the order identifier.
pub const ORDER_ID_ATTRIBUTE: &str = "order_id";
/// Cart attribute holding the landing page path.
pub const LANDING_PAGE_ATTRIBUTE: &str = "landingPage";
/// Cart attribute holding the capture timestamp.
pub const CAPTURED_AT_ATTRIBUTE: &str = "capturedAt";

/// Names of the query parameters read and the cart attributes written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingKeys {
    /// Query parameter for the referral code.
    pub code_param: String,
    /// Query parameter for the order identifier.
    pub order_id_param: String,
    /// Cart attribute mirroring the referral code.
    pub code_attribute: String,
    /// Cart attribute mirroring the order identifier.
    pub order_id_attribute: String,
    /// Metadata attribute for the landing page.
    pub landing_page_attribute: String,
    /// Metadata attribute for the capture timestamp.
    pub captured_at_attribute: String,
}

impl Default for TrackingKeys {
    fn default() -> Self {
        Self {
            code_param: REFERRAL_CODE_PARAM.to_string(),
            order_id_param: ORDER_ID_PARAM.to_string(),
            code_attribute: REFERRAL_CODE_ATTRIBUTE.to_string(),
            order_id_attribute: ORDER_ID_ATTRIBUTE.to_string(),
            landing_page_attribute: LANDING_PAGE_ATTRIBUTE.to_string(),
            captured_at_attribute: CAPTURED_AT_ATTRIBUTE.to_string(),
        }
    }
}

/// Custom attributes attached to a cart.
///
/// Ordered so payloads serialize deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartAttributes(BTreeMap<String, String>);

impl CartAttributes {
    /// Create an empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an attribute value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set an attribute, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Whether the attribute is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CartAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Which of the two tracked identifiers an operation touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackedFields {
    /// The referral code.
    pub code: bool,
    /// The order identifier.
    pub order_id: bool,
}

impl TrackedFields {
    /// Whether neither field is flagged.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.code && !self.order_id
    }

    /// Human-readable field names, for log lines.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(2);
        if self.code {
            names.push("code");
        }
        if self.order_id {
            names.push("order_id");
        }
        names
    }
}
