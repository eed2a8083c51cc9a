//! MIME body parts: attachments, inline images and text alternatives.

use crate::content_type::ContentType;
use crate::encoding::{encode_base64_wrapped, encode_quoted_printable};
use crate::header::HeaderList;
use crate::multipart::MultipartWriter;
use std::fmt;
use std::io::{self, Write};

/// Content transfer encoding for a body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// Quoted-printable (RFC 2045).
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "quoted-printable"))]
    QuotedPrintable,
    /// Base64, wrapped at 76 columns.
    #[cfg_attr(feature = "serde", serde(rename = "base64"))]
    Base64,
    /// Raw 8-bit data, written verbatim.
    #[cfg_attr(feature = "serde", serde(rename = "8bit"))]
    EightBit,
}

impl TransferEncoding {
    /// Parses an encoding name (case-insensitive).
    ///
    /// Anything other than `base64` or `8bit` is quoted-printable.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("base64") {
            Self::Base64
        } else if name.eq_ignore_ascii_case("8bit") {
            Self::EightBit
        } else {
            Self::QuotedPrintable
        }
    }

    /// Returns the header value for this encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
            Self::EightBit => "8bit",
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writes `body` in the given transfer encoding, followed by CRLF.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_encoded_body<W: Write + ?Sized>(
    w: &mut W,
    body: &[u8],
    encoding: TransferEncoding,
) -> io::Result<()> {
    match encoding {
        TransferEncoding::Base64 => w.write_all(encode_base64_wrapped(body).as_bytes())?,
        TransferEncoding::EightBit => w.write_all(body)?,
        TransferEncoding::QuotedPrintable => {
            w.write_all(encode_quoted_printable(body).as_bytes())?;
        }
    }
    w.write_all(b"\r\n")
}

/// A single body part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Part {
    /// File name, added to `Content-Type` and `Content-Disposition`.
    pub filename: Option<String>,
    /// Media type, e.g. `image/png`.
    pub content_type: String,
    /// Disposition, e.g. `attachment`.
    pub content_disposition: Option<String>,
    /// Transfer encoding of the body.
    pub encoding: TransferEncoding,
    /// Charset parameter for text parts.
    pub charset: Option<String>,
    /// Content id for inline images, written as `<id>`.
    pub content_id: Option<String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a text part (`text/plain`, `text/html`, ...) in `charset`.
    #[must_use]
    pub fn text(
        content_type: impl Into<String>,
        charset: impl Into<String>,
        encoding: TransferEncoding,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            charset: Some(charset.into()),
            encoding,
            body: body.into(),
            ..Self::default()
        }
    }

    /// Builds the part header block.
    #[must_use]
    pub fn headers(&self) -> HeaderList {
        let mut content_type = ContentType::new(self.content_type.as_str());
        if let Some(filename) = &self.filename {
            content_type = content_type.with_parameter("name", filename.as_str());
        }
        if let Some(charset) = &self.charset {
            content_type = content_type.with_quoted_parameter("charset", charset.as_str());
        }

        let mut headers = HeaderList::new();
        headers.add("Content-Type", content_type.to_string(), false);
        if let Some(disposition) = &self.content_disposition {
            headers.add(
                "Content-Disposition",
                format!(
                    "{disposition}; filename={}; size={}",
                    self.filename.as_deref().unwrap_or_default(),
                    self.body.len()
                ),
                false,
            );
        }
        headers.add("Content-Transfer-Encoding", self.encoding.as_str(), false);
        if let Some(id) = &self.content_id {
            headers.add("Content-ID", format!("<{id}>"), false);
        }
        headers
    }

    /// Writes the part as the next part of `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut MultipartWriter<W>) -> io::Result<()> {
        let out = writer.create_part(&self.headers())?;
        write_encoded_body(out, &self.body, self.encoding)
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

    fn encoded(body: &[u8], encoding: TransferEncoding) -> String {
        let mut out = Vec::new();
        write_encoded_body(&mut out, body, encoding).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_encoding() {
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(TransferEncoding::parse("8bit"), TransferEncoding::EightBit);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::QuotedPrintable);
        assert_eq!(TransferEncoding::parse(""), TransferEncoding::QuotedPrintable);
    }

    #[test]
    fn test_write_encoded_body() {
        assert_eq!(
            encoded(b"Text text text", TransferEncoding::Base64),
            "VGV4dCB0ZXh0IHRleHQ=\r\n"
        );
        assert_eq!(
            encoded("Go编程".as_bytes(), TransferEncoding::EightBit),
            "Go编程\r\n"
        );
        assert_eq!(
            encoded("Go编程".as_bytes(), TransferEncoding::QuotedPrintable),
            "Go=E7=BC=96=E7=A8=8B\r\n"
        );
    }

    #[test]
    fn test_attachment_headers() {
        let part = Part {
            filename: Some("test.txt".to_string()),
            content_type: "text/plain".to_string(),
            content_disposition: Some("attachment".to_string()),
            encoding: TransferEncoding::Base64,
            body: b"Text text text".to_vec(),
            ..Part::default()
        };
        let mut out = Vec::new();
        part.headers().write_to(&mut out, "utf-8").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Content-Type: text/plain; name=test.txt\r\n\
             Content-Disposition: attachment; filename=test.txt; size=14\r\n\
             Content-Transfer-Encoding: base64\r\n\r\n"
        );
    }

    #[test]
    fn test_image_headers() {
        let part = Part {
            filename: Some("immagine.jpg".to_string()),
            content_type: "image/jpg".to_string(),
            encoding: TransferEncoding::Base64,
            content_id: Some("123456".to_string()),
            ..Part::default()
        };
        let headers = part.headers();
        assert_eq!(
            headers.get("content-type").unwrap().value,
            "image/jpg; name=immagine.jpg"
        );
        assert!(headers.get("Content-Disposition").is_none());
        assert_eq!(headers.get("Content-ID").unwrap().value, "<123456>");
    }

    #[test]
    fn test_text_part_headers() {
        let part = Part::text("text/html", "utf-8", TransferEncoding::QuotedPrintable, "<b>hi</b>");
        let headers = part.headers();
        assert_eq!(
            headers.get("Content-Type").unwrap().value,
            "text/html; charset=\"utf-8\""
        );
        assert_eq!(
            headers.get("Content-Transfer-Encoding").unwrap().value,
            "quoted-printable"
        );
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_write_to_multipart() {
        let part = Part::text("text/plain", "utf-8", TransferEncoding::EightBit, "hello");
        let mut writer = MultipartWriter::with_boundary(Vec::new(), "B");
        part.write_to(&mut writer).unwrap();
        let out = writer.close().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "--B\r\n\
             Content-Type: text/plain; charset=\"utf-8\"\r\n\
             Content-Transfer-Encoding: 8bit\r\n\r\n\
             hello\r\n\
             \r\n--B--\r\n"
        );
    }
}
