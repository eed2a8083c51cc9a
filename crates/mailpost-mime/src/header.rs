//! Message header lists.

use crate::encoding::encode_word;
use std::io::Write;

/// A single header field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    /// Field name, written as given.
    pub name: String,
    /// Field value.
    pub value: String,
    /// Whether the value is RFC 2047 encoded when written.
    #[cfg_attr(feature = "serde", serde(default))]
    pub encoded: bool,
}

impl Header {
    /// Creates a header.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, encoded: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            encoded,
        }
    }
}

/// Ordered header list.
///
/// Duplicate names are allowed and kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct HeaderList(Vec<Header>);

impl HeaderList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a header.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>, encoded: bool) {
        self.0.push(Header::new(name, value, encoded));
    }

    /// Appends every header of `other`, keeping its order.
    pub fn extend(&mut self, other: &Self) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Returns the first header named `name` (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Header> {
        self.0.iter().find(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Returns every header named `name` (case-insensitive), in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&Header> {
        self.0
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case(name))
            .collect()
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the headers in order.
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    /// Writes `Name: value` lines followed by the blank line ending the block.
    ///
    /// Values flagged as encoded are `Q` encoded in `charset`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W, charset: &str) -> std::io::Result<()> {
        for header in &self.0 {
            if header.encoded {
                write!(w, "{}: {}\r\n", header.name, encode_word(&header.value, charset))?;
            } else {
                write!(w, "{}: {}\r\n", header.name, header.value)?;
            }
        }
        w.write_all(b"\r\n")
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn written(headers: &HeaderList, charset: &str) -> String {
        let mut out = Vec::new();
        headers.write_to(&mut out, charset).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_write_ascii_encoded_header_unchanged() {
        let mut headers = HeaderList::new();
        headers.add("Content-Type", "text/html", true);
        assert_eq!(written(&headers, "UTF-8"), "Content-Type: text/html\r\n\r\n");
    }

    #[test]
    fn test_write_long_encoded_header() {
        let mut headers = HeaderList::new();
        headers.add(
            "X-Very-Long",
            "ùaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaddddddddddddddddddddddddddddddddddddffffff ffffffffffffffffffffffffffffffffffff",
            true,
        );
        assert_eq!(
            written(&headers, "UTF-8"),
            "X-Very-Long: =?UTF-8?q?=C3=B9aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaddddddddddddddddddddddddddd?= =?UTF-8?q?dddddddddffffff_ffffffffffffffffffffffffffffffffffff?=\r\n\r\n"
        );
    }

    #[test]
    fn test_write_unencoded_keeps_value_verbatim() {
        let mut headers = HeaderList::new();
        headers.add("X-Raw", "<òàè+ù;6789@pippo.com>", false);
        assert_eq!(
            written(&headers, "utf-8"),
            "X-Raw: <òàè+ù;6789@pippo.com>\r\n\r\n"
        );
    }

    #[test]
    fn test_empty_list_writes_blank_line() {
        assert_eq!(written(&HeaderList::new(), "utf-8"), "\r\n");
    }

    #[test]
    fn test_duplicates_preserved_in_order() {
        let mut headers = HeaderList::new();
        headers.add("Received", "first", false);
        headers.add("X-Other", "x", false);
        headers.add("received", "second", false);

        assert_eq!(headers.get("RECEIVED").unwrap().value, "first");
        let all: Vec<&str> = headers
            .get_all("Received")
            .iter()
            .map(|h| h.value.as_str())
            .collect();
        assert_eq!(all, vec!["first", "second"]);
        assert!(headers.get("Missing").is_none());
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_extend_appends_in_order() {
        let mut base = HeaderList::new();
        base.add("A", "1", false);
        let mut extra = HeaderList::new();
        extra.add("B", "2", false);
        extra.add("C", "3", true);
        base.extend(&extra);

        let names: Vec<&str> = base.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(base.get("c").unwrap().encoded);
    }
}
