//! `Content-Type` header values.

use std::fmt;

/// Content type with ordered parameters.
///
/// Parameters are written in the order they were added. A parameter is
/// written quoted only when added with [`ContentType::with_quoted_parameter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    essence: String,
    parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Parameter {
    name: String,
    value: String,
    quoted: bool,
}

impl ContentType {
    /// Creates a content type from a `type/subtype` string.
    #[must_use]
    pub fn new(essence: impl Into<String>) -> Self {
        Self {
            essence: essence.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a text content type (`text/plain`, `text/html`, ...) with a
    /// quoted charset.
    #[must_use]
    pub fn text(sub_type: &str, charset: &str) -> Self {
        Self::new(format!("text/{sub_type}")).with_quoted_parameter("charset", charset)
    }

    /// Creates a multipart content type with a boundary.
    #[must_use]
    pub fn multipart(sub_type: &str, boundary: impl Into<String>) -> Self {
        Self::new(format!("multipart/{sub_type}")).with_parameter("boundary", boundary)
    }

    /// Adds a parameter written as `name=value`.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            value: value.into(),
            quoted: false,
        });
        self
    }

    /// Adds a parameter written as `name="value"`.
    #[must_use]
    pub fn with_quoted_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            value: value.into(),
            quoted: true,
        });
        self
    }

    /// Returns the `type/subtype` part.
    #[must_use]
    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// Returns the first parameter named `name` (case-insensitive).
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.essence
            .get(..10)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/"))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        for param in &self.parameters {
            if param.quoted {
                write!(f, "; {}=\"{}\"", param.name, param.value)?;
            } else {
                write!(f, "; {}={}", param.name, param.value)?;
            }
        }
        Ok(())
    }
}
