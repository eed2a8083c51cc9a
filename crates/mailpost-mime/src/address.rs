//! Email address formatting.

use crate::encoding::encode_word;
use std::fmt;

/// Display name and address, as used in `From`, `To`, `Cc` and `Reply-To`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmailAddress {
    /// Display name (may be empty).
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    /// Email address.
    pub address: String,
}

impl EmailAddress {
    /// Creates an address without a display name.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            address: address.into(),
        }
    }

    /// Creates an address with a display name.
    #[must_use]
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Returns true if no address is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }

    /// Formats the address for a message header (RFC 5322).
    ///
    /// A display name that needs no encoding is written as a quoted string;
    /// otherwise it is RFC 2047 `Q` encoded in `charset`.
    #[must_use]
    pub fn format(&self, charset: &str) -> String {
        if self.name.is_empty() {
            return self.address.clone();
        }

        let encoded = encode_word(&self.name, charset);
        let mut result = String::with_capacity(encoded.len() + self.address.len() + 5);
        if encoded == self.name {
            result.push('"');
            for ch in self.name.chars() {
                if ch == '\\' || ch == '"' {
                    result.push('\\');
                }
                result.push(ch);
            }
            result.push('"');
        } else {
            result.push_str(&encoded);
        }
        result.push_str(" <");
        result.push_str(&self.address);
        result.push('>');
        result
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.name, self.address)
        }
    }
}

/// Joins addresses with `", "` using their plain display form.
#[must_use]
pub fn join_addresses(addresses: &[EmailAddress]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Joins addresses with `", "` using their header form.
#[must_use]
pub fn join_formatted_addresses(addresses: &[EmailAddress], charset: &str) -> String {
    addresses
        .iter()
        .map(|a| a.format(charset))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits `user@domain` at the first `@`.
///
/// An address without `@` is returned whole as the local part with an empty
/// domain.
#[must_use]
pub fn split(address: &str) -> (&str, &str) {
    address.split_once('@').unwrap_or((address, ""))
}
