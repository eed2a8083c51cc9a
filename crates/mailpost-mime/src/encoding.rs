//! MIME encoding utilities.
//!
//! Supports Base64 and Quoted-Printable body encodings (RFC 2045) and the
//! RFC 2047 `Q` encoding used for non-ASCII header text.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Maximum line length for encoded bodies.
const MAX_LINE_LENGTH: usize = 76;

/// Maximum length of a single RFC 2047 encoded-word.
const MAX_ENCODED_WORD_LENGTH: usize = 75;

/// Room left for encoded text once `=?UTF-8?q?` and `?=` are accounted for.
const MAX_WORD_CONTENT: usize = MAX_ENCODED_WORD_LENGTH - "=?UTF-8?q?".len() - "?=".len();

const UPPER_HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64, broken into CRLF-separated lines of 76 columns.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);
    for (i, ch) in encoded.chars().enumerate() {
        if i > 0 && i % MAX_LINE_LENGTH == 0 {
            result.push_str("\r\n");
        }
        result.push(ch);
    }
    result
}

/// Encodes data using Quoted-Printable encoding (RFC 2045).
///
/// Text mode: LF and CRLF in the input become CRLF hard line breaks, lines
/// are soft-wrapped so no output line exceeds 76 columns, and a space or tab
/// right before a line break is encoded.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut encoder = QuotedPrintable::default();
    for &byte in data {
        match byte {
            b'=' => encoder.escape(byte),
            b'!'..=b'~' | b' ' | b'\t' | b'\r' | b'\n' => encoder.literal(byte),
            _ => encoder.escape(byte),
        }
    }
    encoder.finish()
}

#[derive(Default)]
struct QuotedPrintable {
    out: Vec<u8>,
    /// Bytes written on the current output line.
    line: usize,
    /// Previous input byte was a CR, so its LF is already emitted.
    cr: bool,
}

impl QuotedPrintable {
    fn literal(&mut self, byte: u8) {
        if byte == b'\r' || byte == b'\n' {
            if self.cr && byte == b'\n' {
                self.cr = false;
                return;
            }
            self.cr = byte == b'\r';
            self.escape_trailing_whitespace();
            self.hard_break();
            return;
        }

        if self.line == MAX_LINE_LENGTH - 1 {
            self.soft_break();
        }
        self.out.push(byte);
        self.line += 1;
        self.cr = false;
    }

    fn escape(&mut self, byte: u8) {
        if MAX_LINE_LENGTH - 1 - self.line < 3 {
            self.soft_break();
        }
        self.out.extend_from_slice(&[
            b'=',
            UPPER_HEX[usize::from(byte >> 4)],
            UPPER_HEX[usize::from(byte & 0x0f)],
        ]);
        self.line += 3;
        self.cr = false;
    }

    fn escape_trailing_whitespace(&mut self) {
        if self.line == 0 {
            return;
        }
        if let Some(&last) = self.out.last()
            && (last == b' ' || last == b'\t')
        {
            self.out.pop();
            self.line -= 1;
            self.escape(last);
        }
    }

    fn soft_break(&mut self) {
        self.out.extend_from_slice(b"=\r\n");
        self.line = 0;
    }

    fn hard_break(&mut self) {
        self.out.extend_from_slice(b"\r\n");
        self.line = 0;
    }

    fn finish(mut self) -> String {
        self.escape_trailing_whitespace();
        // Every byte pushed above is printable ASCII or CRLF.
        self.out.into_iter().map(char::from).collect()
    }
}

/// Encodes header text as RFC 2047 `Q` encoded-words.
///
/// Text made only of printable ASCII (and tabs) is returned unchanged. For
/// UTF-8 the output is split into several encoded-words separated by a space
/// so none exceeds 75 characters; a character is never split across words.
/// Other charsets produce a single encoded-word.
#[must_use]
pub fn encode_word(text: &str, charset: &str) -> String {
    if !needs_encoding(text) {
        return text.to_string();
    }

    let mut result = format!("=?{charset}?q?");
    if !charset.eq_ignore_ascii_case("utf-8") {
        write_q(&mut result, text.as_bytes());
        result.push_str("?=");
        return result;
    }

    let mut current = 0;
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        let bytes = ch.encode_utf8(&mut buf).as_bytes();
        let len = match bytes {
            [b] if is_q_safe(*b) || *b == b' ' => 1,
            _ => 3 * bytes.len(),
        };
        if current + len > MAX_WORD_CONTENT {
            result.push_str("?= =?");
            result.push_str(charset);
            result.push_str("?q?");
            current = 0;
        }
        write_q(&mut result, bytes);
        current += len;
    }
    result.push_str("?=");
    result
}

fn needs_encoding(text: &str) -> bool {
    text.chars()
        .any(|c| (c < ' ' || c > '~') && c != '\t')
}

const fn is_q_safe(byte: u8) -> bool {
    matches!(byte, b'!'..=b'~') && byte != b'=' && byte != b'?' && byte != b'_'
}

fn write_q(out: &mut String, bytes: &[u8]) {
    for &byte in bytes {
        if byte == b' ' {
            out.push('_');
        } else if is_q_safe(byte) {
            out.push(char::from(byte));
        } else {
            out.push('=');
            out.push(char::from(UPPER_HEX[usize::from(byte >> 4)]));
            out.push(char::from(UPPER_HEX[usize::from(byte & 0x0f)]));
        }
    }
}
