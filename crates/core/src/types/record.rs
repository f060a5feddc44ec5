//! The persisted referral record and the captures that feed it.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::attributes::{CartAttributes, TrackedFields, TrackingKeys};
use super::token::{OrderReference, ReferralCode};

/// Errors that can occur when decoding a stored [`ReferralRecord`].
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// The stored content is not a valid record document.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The record carries neither identifier.
    #[error("record has neither a referral code nor an order id")]
    Empty,
}

/// Identifiers observed on a single page view.
///
/// Empty query values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    /// Referral code, if the page URL carried one.
    pub code: Option<ReferralCode>,
    /// Order identifier, if the page URL carried one.
    pub order_id: Option<OrderReference>,
}

impl Capture {
    /// Read the tracked query parameters from a page URL.
    ///
    /// Only the first occurrence of each parameter is considered.
    #[must_use]
    pub fn from_url(url: &Url, keys: &TrackingKeys) -> Self {
        let first = |param: &str| {
            url.query_pairs()
                .find(|(name, _)| name == param)
                .map(|(_, value)| value.into_owned())
        };

        Self {
            code: first(&keys.code_param).and_then(|v| ReferralCode::try_from(v).ok()),
            order_id: first(&keys.order_id_param).and_then(|v| OrderReference::try_from(v).ok()),
        }
    }

    /// Whether neither identifier was observed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.code.is_none() && self.order_id.is_none()
    }

    /// Which identifiers were observed.
    #[must_use]
    pub const fn fields(&self) -> TrackedFields {
        TrackedFields {
            code: self.code.is_some(),
            order_id: self.order_id.is_some(),
        }
    }
}

/// The single record persisted per client.
///
/// Stored as JSON:
///
/// ```json
/// { "code": "store1", "orderId": null,
///   "capturedAt": "2026-03-01T12:00:00.000Z", "landingPage": "/products/tee" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralRecord {
    /// Referral source identifier.
    pub code: Option<ReferralCode>,
    /// Associated order identifier.
    pub order_id: Option<OrderReference>,
    /// When the record was last written.
    #[serde(with = "iso8601")]
    pub captured_at: DateTime<Utc>,
    /// URL path active at capture time.
    pub landing_page: String,
}

impl ReferralRecord {
    /// Merge a capture into the previously stored record.
    ///
    /// Newly observed identifiers win; identifiers missing from the capture
    /// fall back to the previous record. Returns `None` for an empty capture,
    /// which must never create or overwrite a record.
    ///
    /// `now` is truncated to the millisecond precision the record is stored
    /// with.
    #[must_use]
    pub fn merge(
        previous: Option<&Self>,
        capture: Capture,
        landing_page: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if capture.is_empty() {
            return None;
        }

        let (previous_code, previous_order_id) =
            previous.map_or((None, None), |r| (r.code.clone(), r.order_id.clone()));

        Some(Self {
            code: capture.code.or(previous_code),
            order_id: capture.order_id.or(previous_order_id),
            captured_at: now.trunc_subsecs(3),
            landing_page: landing_page.into(),
        })
    }

    /// Decode and validate a stored record.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Malformed` if the content does not match the
    /// record schema, or `RecordError::Empty` if it carries no identifier.
    pub fn decode(raw: &str) -> Result<Self, RecordError> {
        let record: Self = serde_json::from_str(raw)?;
        if !record.has_identifier() {
            return Err(RecordError::Empty);
        }
        Ok(record)
    }

    /// Encode the record for storage.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Malformed` if serialization fails.
    pub fn encode(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether at least one identifier is set.
    #[must_use]
    pub const fn has_identifier(&self) -> bool {
        self.code.is_some() || self.order_id.is_some()
    }

    /// Which identifiers are set.
    #[must_use]
    pub const fn fields(&self) -> TrackedFields {
        TrackedFields {
            code: self.code.is_some(),
            order_id: self.order_id.is_some(),
        }
    }

    /// Identifiers whose value differs from the live cart attributes.
    ///
    /// A field matches when it is unset in the record or equal to the live
    /// attribute; only set fields can diverge.
    #[must_use]
    pub fn divergence(&self, live: &CartAttributes, keys: &TrackingKeys) -> TrackedFields {
        TrackedFields {
            code: self
                .code
                .as_ref()
                .is_some_and(|code| live.get(&keys.code_attribute) != Some(code.as_str())),
            order_id: self
                .order_id
                .as_ref()
                .is_some_and(|id| live.get(&keys.order_id_attribute) != Some(id.as_str())),
        }
    }

    /// Attribute payload for a cart update.
    ///
    /// Metadata attributes are always present; tracked attributes only when set.
    #[must_use]
    pub fn cart_attributes(&self, keys: &TrackingKeys) -> CartAttributes {
        let mut attributes = CartAttributes::new();
        attributes.insert(&keys.landing_page_attribute, &self.landing_page);
        attributes.insert(
            &keys.captured_at_attribute,
            format_timestamp(&self.captured_at),
        );
        if let Some(code) = &self.code {
            attributes.insert(&keys.code_attribute, code.as_str());
        }
        if let Some(order_id) = &self.order_id {
            attributes.insert(&keys.order_id_attribute, order_id.as_str());
        }
        attributes
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
#[must_use]
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn keys() -> TrackingKeys {
        TrackingKeys::default()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn record(code: Option<&str>, order_id: Option<&str>) -> ReferralRecord {
        ReferralRecord {
            code: code.map(|c| ReferralCode::parse(c).unwrap()),
            order_id: order_id.map(|o| OrderReference::parse(o).unwrap()),
            captured_at: at(9),
            landing_page: "/".to_string(),
        }
    }

    fn capture(url: &str) -> Capture {
        Capture::from_url(&Url::parse(url).unwrap(), &keys())
    }

    #[test]
    fn test_capture_reads_both_params() {
        let c = capture("https://shop.test/products/tee?ref=store1&order_id=99");
        assert_eq!(c.code.unwrap().as_str(), "store1");
        assert_eq!(c.order_id.unwrap().as_str(), "99");
    }

    #[test]
    fn test_capture_treats_empty_values_as_absent() {
        assert!(capture("https://shop.test/?ref=&order_id=").is_empty());
        assert!(capture("https://shop.test/?utm_source=mail").is_empty());
    }

    #[test]
    fn test_capture_uses_first_occurrence() {
        let c = capture("https://shop.test/?ref=a&ref=b");
        assert_eq!(c.code.unwrap().as_str(), "a");
    }

    #[test]
    fn test_capture_decodes_percent_encoding() {
        let c = capture("https://shop.test/?ref=store%201");
        assert_eq!(c.code.unwrap().as_str(), "store 1");
    }

    #[test]
    fn test_merge_new_value_wins_and_other_survives() {
        let previous = record(Some("A"), Some("B"));
        let merged =
            ReferralRecord::merge(Some(&previous), capture("https://shop.test/?ref=C"), "/x", at(10))
                .unwrap();
        assert_eq!(merged.code.unwrap().as_str(), "C");
        assert_eq!(merged.order_id.unwrap().as_str(), "B");
        assert_eq!(merged.landing_page, "/x");
        assert_eq!(merged.captured_at, at(10));
    }

    #[test]
    fn test_merge_empty_capture_is_none() {
        let previous = record(Some("A"), Some("B"));
        assert!(
            ReferralRecord::merge(Some(&previous), Capture::default(), "/", at(10)).is_none()
        );
        assert!(ReferralRecord::merge(None, Capture::default(), "/", at(10)).is_none());
    }

    #[test]
    fn test_merge_without_previous() {
        let merged =
            ReferralRecord::merge(None, capture("https://shop.test/?order_id=7"), "/", at(10))
                .unwrap();
        assert!(merged.code.is_none());
        assert_eq!(merged.order_id.unwrap().as_str(), "7");
    }

    #[test]
    fn test_merged_record_survives_storage() {
        let now = at(10) + chrono::Duration::nanoseconds(744_101_836);
        let merged = ReferralRecord::merge(
            None,
            capture("https://shop.test/?ref=store1&order_id=99"),
            "/products/tee",
            now,
        )
        .unwrap();

        assert_eq!(format_timestamp(&merged.captured_at), "2026-03-01T10:00:00.744Z");
        let decoded = ReferralRecord::decode(&merged.encode().unwrap()).unwrap();
        assert_eq!(decoded, merged);
    }

    #[test]
    fn test_encode_uses_camel_case_and_nulls() {
        let json: serde_json::Value =
            serde_json::from_str(&record(Some("store1"), None).encode().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "store1",
                "orderId": null,
                "capturedAt": "2026-03-01T09:00:00.000Z",
                "landingPage": "/"
            })
        );
    }

    #[test]
    fn test_decode_accepts_stored_document() {
        let decoded = ReferralRecord::decode(
            r#"{"code":null,"orderId":"99","capturedAt":"2026-03-01T09:00:00.000Z","landingPage":"/cart"}"#,
        )
        .unwrap();
        assert_eq!(decoded, {
            let mut r = record(None, Some("99"));
            r.landing_page = "/cart".to_string();
            r
        });
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            ReferralRecord::decode("not json"),
            Err(RecordError::Malformed(_))
        ));
        assert!(matches!(
            ReferralRecord::decode(r#"{"code":"a"}"#),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_record_without_identifiers() {
        let raw = r#"{"code":null,"orderId":null,"capturedAt":"2026-03-01T09:00:00.000Z","landingPage":"/"}"#;
        assert!(matches!(ReferralRecord::decode(raw), Err(RecordError::Empty)));
    }

    #[test]
    fn test_divergence_in_sync() {
        let live: CartAttributes = [("referral_code", "store1"), ("order_id", "99")]
            .into_iter()
            .collect();
        assert!(
            record(Some("store1"), Some("99"))
                .divergence(&live, &keys())
                .is_empty()
        );
    }

    #[test]
    fn test_divergence_ignores_unset_fields() {
        let live: CartAttributes = [("referral_code", "store1")].into_iter().collect();
        assert!(record(Some("store1"), None).divergence(&live, &keys()).is_empty());
    }

    #[test]
    fn test_divergence_partial_match() {
        let live: CartAttributes = [("referral_code", "store1")].into_iter().collect();
        let diverged = record(Some("store1"), Some("99")).divergence(&live, &keys());
        assert!(!diverged.code);
        assert!(diverged.order_id);
    }

    #[test]
    fn test_cart_attributes_omit_unset_fields() {
        let attributes = record(Some("store1"), None).cart_attributes(&keys());
        assert_eq!(attributes.get("referral_code"), Some("store1"));
        assert_eq!(attributes.get("landingPage"), Some("/"));
        assert_eq!(attributes.get("capturedAt"), Some("2026-03-01T09:00:00.000Z"));
        assert!(!attributes.contains_key("order_id"));
        assert_eq!(attributes.len(), 3);
    }
}
