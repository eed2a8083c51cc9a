//! # mailpost-smtp
//!
//! An async SMTP submission client (RFC 5321) for messages built with
//! [`mailpost_mime`].
//!
//! ## Features
//!
//! - **Session state machine**: lazy EHLO with HELO fallback, runtime
//!   transaction phases, RSET/QUIT handling
//! - **TLS**: implicit TLS (port 465) and STARTTLS via rustls
//! - **Authentication**: pluggable SASL [`Mechanism`]s, with PLAIN and LOGIN
//! - **Extensions**: 8BITMIME, SIZE, SMTPUTF8 with IDNA fallback
//! - **Bulk sending**: many messages over one session with a per-message
//!   report
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailpost_mime::{EmailAddress, Message};
//! use mailpost_smtp::auth::Plain;
//! use mailpost_smtp::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> mailpost_smtp::Result<()> {
//!     let config = SessionConfig::builder("smtp.example.com")
//!         .local_name("client.example.com")
//!         .build();
//!
//!     let mut session = Session::connect(&config)
//!         .await?
//!         .with_mechanism(Box::new(Plain::new("", "user", "secret", "smtp.example.com")));
//!
//!     let mut message = Message::new(
//!         EmailAddress::with_name("Jack Sender", "sender@example.com"),
//!         vec![EmailAddress::new("recipient@example.com")],
//!         "Hello",
//!         "",
//!         "Hello, World!",
//!     );
//!
//!     let (report, quit) = session.send_bulk(std::slice::from_mut(&mut message)).await;
//!     assert_eq!(report.items.len(), 1);
//!     quit
//! }
//! ```
//!
//! ## Session Phases
//!
//! ```text
//! connect ─→ hello ─→ [STARTTLS ─→ hello] ─→ [AUTH]
//!                                              │
//!   ┌──────────────────────────────────────────┘
//!   ↓
//! Idle/Complete ─ MAIL ─→ MailSent ─ RCPT ─→ RecipientsAccepted ─ DATA ─→ InData
//!   ↑                                                                      │
//!   └───────────────────────────── 250 after end of data ──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: SASL mechanisms and the AUTH exchange
//! - [`command`]: SMTP command builders
//! - [`connection`]: Transport, TLS and configuration
//! - [`parser`]: Reply parser
//! - [`types`]: Replies, extensions and envelope addresses

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
mod session;
pub mod types;

pub use auth::{Mechanism, ServerInfo};
pub use connection::{Security, SessionConfig, SmtpStream, TlsConfig, TlsInfo};
pub use error::{Error, Result};
pub use session::{DataSink, SendReport, SendReportItem, Session, TransactionPhase, send_mail};
pub use types::{Extension, Extensions, Reply, ReplyCode};
