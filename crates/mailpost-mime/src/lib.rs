//! # mailpost-mime
//!
//! MIME message generation for outbound email.
//!
//! ## Features
//!
//! - **Message encoding**: text, HTML and AMP bodies, attachments and inline
//!   images rendered as a single-part or multipart RFC 5322 message
//! - **Encodings**: Base64, Quoted-Printable, RFC 2047 header words
//! - **Addresses**: display-name formatting and list joining
//! - **Headers**: ordered extended headers with duplicates
//!
//! ## Quick Start
//!
//! ```
//! use mailpost_mime::{EmailAddress, Message};
//!
//! let mut message = Message::new(
//!     EmailAddress::with_name("Jack Sender", "sender@example.com"),
//!     vec![EmailAddress::new("recipient@example.com")],
//!     "Hello",
//!     "",
//!     "Hello, World!",
//! );
//! message.add_attachment("notes.txt", "text/plain", b"some notes".to_vec());
//!
//! let bytes = message.to_bytes()?;
//! assert!(String::from_utf8_lossy(&bytes).contains("Content-Type: multipart/mixed; boundary="));
//! # Ok::<(), mailpost_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod message;
mod multipart;
mod part;
mod sanitize;

pub mod encoding;

pub use address::{EmailAddress, join_addresses, join_formatted_addresses, split};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::{Header, HeaderList};
pub use message::{Message, content_type_for_path};
pub use multipart::{MultipartWriter, generate_boundary};
pub use part::{Part, TransferEncoding, write_encoded_body};
pub use sanitize::html_to_text;
