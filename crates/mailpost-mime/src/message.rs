//! Message composition and encoding.
//!
//! [`Message`] describes one outgoing email. [`Message::write_to`] renders it
//! as an RFC 5322 byte stream ready for the SMTP DATA phase:
//!
//! - text-only or HTML-only messages without attachments are written as a
//!   single transfer-encoded body,
//! - AMP messages are a `multipart/alternative` of text, AMP and HTML,
//! - everything else is a `multipart/mixed` holding a nested
//!   `multipart/alternative` followed by attachments and inline images.

use crate::address::{EmailAddress, join_formatted_addresses, split};
use crate::content_type::ContentType;
use crate::error::{Error, Result};
use crate::header::HeaderList;
use crate::multipart::{MultipartWriter, generate_boundary};
use crate::part::{Part, TransferEncoding, write_encoded_body};
use crate::sanitize::html_to_text;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::io::Write;
use std::path::Path;

/// Length of the random token in generated message ids.
const MESSAGE_ID_TOKEN_LEN: usize = 22;

/// Date header format (RFC 5322).
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// An outgoing email message.
///
/// Empty `text`, `html` and `amp` strings mean the body is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Message {
    /// Author.
    pub from: EmailAddress,
    /// Primary recipients.
    pub to: Vec<EmailAddress>,
    /// Carbon-copy recipients.
    pub cc: Vec<EmailAddress>,
    /// Blind carbon-copy recipients (envelope only, never written).
    pub bcc: Vec<EmailAddress>,
    /// Subject, RFC 2047 encoded when needed.
    pub subject: String,
    /// Extended headers, written after the standard ones.
    pub headers: HeaderList,
    /// Plain text body.
    pub text: String,
    /// HTML body.
    pub html: String,
    /// AMP for Email body.
    pub amp: String,
    /// Transfer encoding for the text bodies.
    pub encoding: TransferEncoding,
    /// Charset for the text bodies and encoded headers.
    pub charset: String,
    /// Message id without angle brackets. Generated when absent.
    pub message_id: Option<String>,
    /// Reply-To address.
    pub reply_to: Option<EmailAddress>,
    /// Single envelope recipient overriding To, Cc and Bcc.
    pub recipient: Option<String>,
    /// Envelope sender overriding the From address.
    pub return_path: Option<String>,
    /// Value of the Sender header.
    pub sender: Option<String>,
    /// File attachments.
    pub attachments: Vec<Part>,
    /// Inline images referenced by content id.
    pub images: Vec<Part>,
    /// Derive the text body from the HTML body when text is empty.
    pub sanitize: bool,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            from: EmailAddress::default(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: String::new(),
            headers: HeaderList::new(),
            text: String::new(),
            html: String::new(),
            amp: String::new(),
            encoding: TransferEncoding::QuotedPrintable,
            charset: "utf-8".to_string(),
            message_id: None,
            reply_to: None,
            recipient: None,
            return_path: None,
            sender: None,
            attachments: Vec::new(),
            images: Vec::new(),
            sanitize: false,
        }
    }
}

impl Message {
    /// Creates a message with quoted-printable encoding and `utf-8` charset.
    #[must_use]
    pub fn new(
        from: EmailAddress,
        to: Vec<EmailAddress>,
        subject: impl Into<String>,
        html: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to,
            subject: subject.into(),
            html: html.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Adds a base64 encoded attachment.
    pub fn add_attachment(
        &mut self,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) {
        self.attachments.push(Part {
            filename: Some(filename.into()),
            content_type: content_type.into(),
            content_disposition: Some("attachment".to_string()),
            encoding: TransferEncoding::Base64,
            body: body.into(),
            ..Part::default()
        });
    }

    /// Adds a base64 encoded inline image referenced as `cid:<content_id>`.
    pub fn add_embedded_image(
        &mut self,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content_id: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) {
        self.images.push(Part {
            filename: Some(filename.into()),
            content_type: content_type.into(),
            content_id: Some(content_id.into()),
            encoding: TransferEncoding::Base64,
            body: body.into(),
            ..Part::default()
        });
    }

    /// Reads a file and adds it as an attachment.
    ///
    /// The content type is guessed from the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load_attachment(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let body = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.add_attachment(name, content_type_for_path(path), body);
        Ok(())
    }

    /// Returns true if the message needs a multipart container.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        if !self.amp.is_empty() {
            return true;
        }
        if self.attachments.is_empty() && self.images.is_empty() {
            return self.text.is_empty() == self.html.is_empty();
        }
        true
    }

    /// Returns the top-level media type.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        if self.is_multipart() {
            if self.amp.is_empty() {
                "multipart/mixed"
            } else {
                "multipart/alternative"
            }
        } else if self.html.is_empty() {
            "text/plain"
        } else {
            "text/html"
        }
    }

    /// Returns the message id, generating `<token>@<sender domain>` once.
    pub fn ensure_message_id(&mut self) -> &str {
        let from = &self.from.address;
        self.message_id.get_or_insert_with(|| {
            let (_, domain) = split(from);
            let token: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(MESSAGE_ID_TOKEN_LEN)
                .map(char::from)
                .collect();
            format!("{token}@{domain}")
        })
    }

    /// Envelope sender: the return-path override, else the From address.
    #[must_use]
    pub fn envelope_from(&self) -> &str {
        self.return_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(self.from.address.as_str())
    }

    /// Envelope recipients: the single recipient override, else To, Cc and
    /// Bcc in that order.
    #[must_use]
    pub fn envelope_recipients(&self) -> Vec<&str> {
        if let Some(recipient) = self.recipient.as_deref().filter(|r| !r.is_empty()) {
            return vec![recipient];
        }
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(|a| a.address.as_str())
            .collect()
    }

    /// Renders the message into a byte vector.
    ///
    /// # Errors
    ///
    /// See [`Message::write_to`].
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Writes the complete message: header block, then body.
    ///
    /// Assigns the message id and, when `sanitize` is set, the text body
    /// if they are missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the From address is empty, HTML sanitizing
    /// fails, or writing fails.
    pub fn write_to<W: Write>(&mut self, mut w: W) -> Result<()> {
        if self.from.is_empty() {
            return Err(Error::InvalidAddress("missing From address".to_string()));
        }

        if !self.is_multipart() {
            self.write_headers(&mut w, None)?;
            let body = if self.text.is_empty() {
                &self.html
            } else {
                &self.text
            };
            write_encoded_body(&mut w, body.as_bytes(), self.encoding)?;
            return Ok(());
        }

        let boundary = generate_boundary();
        self.write_headers(&mut w, Some(&boundary))?;
        let mut writer = MultipartWriter::with_boundary(w, boundary);
        if self.amp.is_empty() {
            self.write_mixed_body(&mut writer)?;
        } else {
            self.write_amp_body(&mut writer)?;
        }
        writer.close()?;
        Ok(())
    }

    fn write_headers<W: Write + ?Sized>(&mut self, w: &mut W, boundary: Option<&str>) -> Result<()> {
        let charset = self.charset.clone();
        let message_id = self.ensure_message_id().to_string();

        let mut headers = HeaderList::new();
        headers.add("Message-Id", format!("<{message_id}>"), false);
        headers.add("From", self.from.format(&charset), false);
        if !self.to.is_empty() {
            headers.add("To", join_formatted_addresses(&self.to, &charset), false);
        }
        if !self.cc.is_empty() {
            headers.add("Cc", join_formatted_addresses(&self.cc, &charset), false);
        }
        if let Some(reply_to) = self.reply_to.as_ref().filter(|a| !a.is_empty()) {
            headers.add("Reply-To", reply_to.format(&charset), false);
        }
        if let Some(sender) = self.sender.as_deref().filter(|s| !s.is_empty()) {
            headers.add("Sender", sender, false);
        }
        headers.add("Subject", self.subject.as_str(), true);
        headers.add(
            "Date",
            chrono::Local::now().format(DATE_FORMAT).to_string(),
            false,
        );
        headers.add("MIME-Version", "1.0", false);
        match boundary {
            Some(boundary) => {
                let ct = ContentType::new(self.content_type()).with_parameter("boundary", boundary);
                headers.add("Content-Type", ct.to_string(), false);
            }
            None => {
                let ct = ContentType::new(self.content_type())
                    .with_quoted_parameter("charset", charset.as_str());
                headers.add("Content-Type", ct.to_string(), false);
                headers.add("Content-Transfer-Encoding", self.encoding.as_str(), false);
            }
        }
        headers.extend(&self.headers);
        headers.write_to(w, &charset)?;
        Ok(())
    }

    fn sanitize_text(&mut self) -> Result<()> {
        if self.text.is_empty() && self.sanitize && !self.html.is_empty() {
            self.text = html_to_text(&self.html)?;
        }
        Ok(())
    }

    fn text_part(&self, content_type: &str, body: &str) -> Part {
        Part::text(content_type, self.charset.as_str(), self.encoding, body)
    }

    /// HTML body, falling back to the text body.
    fn html_or_text(&self) -> &str {
        if self.html.is_empty() {
            &self.text
        } else {
            &self.html
        }
    }

    fn write_mixed_body<W: Write>(&mut self, writer: &mut MultipartWriter<W>) -> Result<()> {
        self.sanitize_text()?;

        let alternative_boundary = generate_boundary();
        let mut headers = HeaderList::new();
        headers.add(
            "Content-Type",
            ContentType::multipart("alternative", alternative_boundary.as_str()).to_string(),
            false,
        );
        let body = writer.create_part(&headers)?;

        let mut alternative = MultipartWriter::with_boundary(body, alternative_boundary);
        self.text_part("text/plain", &self.text)
            .write_to(&mut alternative)?;
        self.text_part("text/html", self.html_or_text())
            .write_to(&mut alternative)?;
        alternative.close()?;

        for attachment in &self.attachments {
            attachment.write_to(writer)?;
        }
        for image in &self.images {
            image.write_to(writer)?;
        }
        Ok(())
    }

    fn write_amp_body<W: Write>(&mut self, writer: &mut MultipartWriter<W>) -> Result<()> {
        self.sanitize_text()?;

        if !self.text.is_empty() {
            self.text_part("text/plain", &self.text).write_to(writer)?;
        }
        self.text_part("text/x-amp-html", &self.amp)
            .write_to(writer)?;
        self.text_part("text/html", self.html_or_text())
            .write_to(writer)?;
        Ok(())
    }
}

/// Guesses a media type from a file extension.
#[must_use]
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt" | "log") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
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

    fn sender() -> EmailAddress {
        EmailAddress::with_name("Jack Sender", "sender@gmail.com")
    }

    fn receivers() -> Vec<EmailAddress> {
        vec![
            EmailAddress::with_name("John Receiver", "recipient@gmail.com"),
            EmailAddress::with_name("Luke Yahoo", "recipient@yahoo.com"),
        ]
    }

    #[test]
    fn test_new_defaults() {
        let msg = Message::new(sender(), receivers(), "Hi", "", "body");
        assert_eq!(msg.encoding, TransferEncoding::QuotedPrintable);
        assert_eq!(msg.charset, "utf-8");
        assert!(msg.message_id.is_none());
    }

    #[test]
    fn test_is_multipart() {
        let mut msg = Message::new(sender(), receivers(), "Hi", "", "text");
        assert!(!msg.is_multipart());
        assert_eq!(msg.content_type(), "text/plain");

        msg.text.clear();
        msg.html = "<b>x</b>".to_string();
        assert!(!msg.is_multipart());
        assert_eq!(msg.content_type(), "text/html");

        msg.text = "text".to_string();
        assert!(msg.is_multipart());
        assert_eq!(msg.content_type(), "multipart/mixed");

        msg.amp = "<html amp4email></html>".to_string();
        assert_eq!(msg.content_type(), "multipart/alternative");
    }

    #[test]
    fn test_empty_bodies_are_multipart() {
        let msg = Message::new(sender(), receivers(), "Hi", "", "");
        assert!(msg.is_multipart());
    }

    #[test]
    fn test_attachment_forces_multipart() {
        let mut msg = Message::new(sender(), receivers(), "Hi", "", "text");
        msg.add_attachment("test.txt", "text/plain", b"abc".to_vec());
        assert!(msg.is_multipart());
        let part = &msg.attachments[0];
        assert_eq!(part.content_disposition.as_deref(), Some("attachment"));
        assert_eq!(part.encoding, TransferEncoding::Base64);
    }

    #[test]
    fn test_ensure_message_id_generated_once() {
        let mut msg = Message::new(sender(), receivers(), "Hi", "", "text");
        let id = msg.ensure_message_id().to_string();
        let (token, domain) = split(&id);
        assert_eq!(domain, "gmail.com");
        assert_eq!(token.len(), MESSAGE_ID_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(msg.ensure_message_id(), id);
    }

    #[test]
    fn test_ensure_message_id_keeps_existing() {
        let mut msg = Message::new(sender(), receivers(), "Hi", "", "text");
        msg.message_id = Some("1".to_string());
        assert_eq!(msg.ensure_message_id(), "1");
    }

    #[test]
    fn test_envelope() {
        let mut msg = Message::new(sender(), receivers(), "Hi", "", "text");
        msg.cc.push(EmailAddress::new("cc@example.com"));
        msg.bcc.push(EmailAddress::new("bcc@example.com"));
        assert_eq!(msg.envelope_from(), "sender@gmail.com");
        assert_eq!(
            msg.envelope_recipients(),
            vec![
                "recipient@gmail.com",
                "recipient@yahoo.com",
                "cc@example.com",
                "bcc@example.com"
            ]
        );

        msg.return_path = Some("bounce@gmail.com".to_string());
        msg.recipient = Some("only@example.com".to_string());
        assert_eq!(msg.envelope_from(), "bounce@gmail.com");
        assert_eq!(msg.envelope_recipients(), vec!["only@example.com"]);
    }

    #[test]
    fn test_missing_from_rejected() {
        let mut msg = Message::new(EmailAddress::default(), receivers(), "Hi", "", "text");
        assert!(matches!(msg.to_bytes(), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_sanitize_fills_text_once() {
        let html = r#"<h1>Title</h1><p>Hello <b>there</b> <a href="http://x.y">link</a></p>"#;
        let mut msg = Message::new(sender(), receivers(), "Hi", html, "");
        msg.sanitize = true;
        msg.add_attachment("a.txt", "text/plain", b"a".to_vec());
        msg.to_bytes().unwrap();
        assert_eq!(msg.text, "Title\nHello there link");

        msg.html = "<p>changed</p>".to_string();
        msg.to_bytes().unwrap();
        assert_eq!(msg.text, "Title\nHello there link");
    }

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("a/report.PDF")), "application/pdf");
        assert_eq!(content_type_for_path(Path::new("notes.txt")), "text/plain");
        assert_eq!(content_type_for_path(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(
            content_type_for_path(Path::new("Makefile")),
            "application/octet-stream"
        );
        assert_eq!(
            content_type_for_path(Path::new("data.unknownext")),
            "application/octet-stream"
        );
    }
}
