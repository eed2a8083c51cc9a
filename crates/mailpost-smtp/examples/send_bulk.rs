#![allow(clippy::expect_used, clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: Send a small batch of messages over one SMTP session
//!
//! Connects to a submission server, upgrades with STARTTLS when offered,
//! authenticates with PLAIN and sends one message per recipient.
//!
//! ## Configuration
//!
//! Set these environment variables:
//!
//! - `SMTP_HOST` (required), `SMTP_PORT` (default 587)
//! - `SMTP_USER`, `SMTP_PASSWORD` (optional; no AUTH if unset)
//! - `MAIL_FROM` (required)
//! - `MAIL_TO` (required, comma separated)
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=mailpost_smtp=debug cargo run --package mailpost-smtp --example send_bulk
//! ```

use std::env;

use mailpost_mime::{EmailAddress, Message};
use mailpost_smtp::auth::Plain;
use mailpost_smtp::{Session, SessionConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = env::var("SMTP_HOST")?;
    let port = env::var("SMTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(587);
    let from = env::var("MAIL_FROM")?;
    let to = env::var("MAIL_TO")?;

    let config = SessionConfig::builder(&host).port(port).build();
    println!("Connecting to {}:{}...", config.host, config.port);
    let mut session = Session::connect(&config).await?;
    println!("✓ Connected");

    if let (Ok(user), Ok(password)) = (env::var("SMTP_USER"), env::var("SMTP_PASSWORD")) {
        session = session.with_mechanism(Box::new(Plain::new("", user, password, &host)));
    }

    let mut messages: Vec<Message> = to
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(|addr| {
            Message::new(
                EmailAddress::with_name("mailpost", from.as_str()),
                vec![EmailAddress::new(addr)],
                "mailpost test message",
                format!("<p>Hello <b>{addr}</b>!</p>"),
                format!("Hello {addr}!"),
            )
        })
        .collect();

    let (report, quit) = session.send_bulk(&mut messages).await;
    for item in &report.items {
        match &item.error {
            None => println!("✓ sent {}", item.message_id.as_deref().unwrap_or("-")),
            Some(e) => println!("✗ failed {}: {}", item.message_id.as_deref().unwrap_or("-"), e),
        }
    }
    println!("{} of {} messages sent", report.sent_count(), report.items.len());

    quit?;
    Ok(())
}
