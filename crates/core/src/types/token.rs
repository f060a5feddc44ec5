//! Opaque identifier newtypes.
//!
//! Use the `define_token!` macro to create string wrappers that prevent
//! accidentally swapping a referral code for an order reference.

/// Errors that can occur when parsing an identifier token.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The input string is empty.
    #[error("identifier cannot be empty")]
    Empty,
}

/// Macro to define a type-safe opaque identifier.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` as a plain JSON string (empty strings are rejected)
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `parse()`, `as_str()`, `into_inner()`
/// - `FromStr`, `TryFrom<String>` and `Into<String>` implementations
///
/// # Example
///
/// ```rust
/// # use referral_sync_core::define_token;
/// define_token!(PartnerId);
/// define_token!(CampaignId);
///
/// let partner = PartnerId::parse("store1").unwrap();
/// let campaign = CampaignId::parse("spring").unwrap();
///
/// // These are different types, so this won't compile:
/// // let _: PartnerId = campaign;
/// # let _ = (partner, campaign);
/// ```
#[macro_export]
macro_rules! define_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse a token from a string.
            ///
            /// # Errors
            ///
            /// Returns `TokenError::Empty` if the input is empty.
            pub fn parse(value: &str) -> ::core::result::Result<Self, $crate::TokenError> {
                if value.is_empty() {
                    return Err($crate::TokenError::Empty);
                }
                Ok(Self(value.to_owned()))
            }

            /// Returns the token as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the token and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::TokenError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl ::core::convert::TryFrom<String> for $name {
            type Error = $crate::TokenError;

            fn try_from(value: String) -> ::core::result::Result<Self, Self::Error> {
                if value.is_empty() {
                    return Err($crate::TokenError::Empty);
                }
                Ok(Self(value))
            }
        }

        impl From<$name> for String {
            fn from(token: $name) -> Self {
                token.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_token!(
    /// Referral source identifier taken from the `ref` query parameter.
    ReferralCode
);
define_token!(
    /// Order identifier taken from the `order_id` query parameter.
    OrderReference
);
