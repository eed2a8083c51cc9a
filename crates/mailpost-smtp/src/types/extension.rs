//! SMTP service extensions advertised in the EHLO reply.

use std::collections::HashMap;
use std::fmt;

/// Well-known SMTP extension keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - Authentication
    Auth,
    /// SIZE - Maximum message size
    Size,
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// CHUNKING - Chunked message transfer
    Chunking,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// DSN - Delivery status notifications
    Dsn,
    /// BINARYMIME - Binary MIME
    BinaryMime,
}

impl Extension {
    /// Returns the EHLO keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::StartTls => "STARTTLS",
            Self::Auth => "AUTH",
            Self::Size => "SIZE",
            Self::EightBitMime => "8BITMIME",
            Self::Pipelining => "PIPELINING",
            Self::Chunking => "CHUNKING",
            Self::SmtpUtf8 => "SMTPUTF8",
            Self::Dsn => "DSN",
            Self::BinaryMime => "BINARYMIME",
        }
    }

    /// Parses a keyword (case-insensitive).
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Some(Self::StartTls),
            "AUTH" => Some(Self::Auth),
            "SIZE" => Some(Self::Size),
            "8BITMIME" => Some(Self::EightBitMime),
            "PIPELINING" => Some(Self::Pipelining),
            "CHUNKING" => Some(Self::Chunking),
            "SMTPUTF8" => Some(Self::SmtpUtf8),
            "DSN" => Some(Self::Dsn),
            "BINARYMIME" => Some(Self::BinaryMime),
            _ => None,
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Capability map built from one EHLO reply.
///
/// Keys are uppercased keywords; values are the parameter text after the
/// first space (empty if none).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    map: HashMap<String, String>,
    auth: Vec<String>,
}

impl Extensions {
    /// Parses the EHLO reply text (lines joined by `\n`).
    ///
    /// The first line echoes the greeting and is skipped. A keyword seen
    /// twice keeps its last parameter.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut map = HashMap::new();
        for line in text.split('\n').skip(1) {
            let (keyword, param) = line.split_once(' ').unwrap_or((line, ""));
            map.insert(keyword.to_ascii_uppercase(), param.to_string());
        }
        let auth = map
            .get("AUTH")
            .map(|mechs| mechs.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        Self { map, auth }
    }

    /// Returns the parameter of an extension by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&name.to_ascii_uppercase()).map(String::as_str)
    }

    /// Checks if a well-known extension is advertised.
    #[must_use]
    pub fn supports(&self, ext: Extension) -> bool {
        self.map.contains_key(ext.keyword())
    }

    /// Returns the advertised authentication mechanism names.
    #[must_use]
    pub fn auth_mechanisms(&self) -> &[String] {
        &self.auth
    }

    /// Returns the advertised maximum message size, if any.
    #[must_use]
    pub fn max_size(&self) -> Option<usize> {
        self.get("SIZE").and_then(|s| s.trim().parse().ok())
    }

    /// Returns the number of advertised extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if nothing was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
