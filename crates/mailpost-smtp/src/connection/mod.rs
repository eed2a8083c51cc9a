//! SMTP connection management: transport, TLS and configuration.

mod config;
mod dot;
mod stream;

pub use config::{Security, SessionConfig, SessionConfigBuilder};
pub use dot::DotStuffer;
pub use stream::{AsyncStream, SmtpStream, TlsConfig, TlsInfo, connect, connect_tls};
