//! PLAIN mechanism (RFC 4616).

use super::{Mechanism, ServerInfo};
use crate::error::{Error, Result};

/// PLAIN authentication.
///
/// Sends `identity\0username\0password` as the initial response. Refuses to
/// run over an unencrypted connection unless the server is local, and
/// refuses a server whose name differs from `host`.
#[derive(Clone)]
pub struct Plain {
    identity: String,
    username: String,
    password: String,
    host: String,
}

impl std::fmt::Debug for Plain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plain")
            .field("identity", &self.identity)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

impl Plain {
    /// Creates a PLAIN mechanism. `identity` is usually empty.
    #[must_use]
    pub fn new(
        identity: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            username: username.into(),
            password: password.into(),
            host: host.into(),
        }
    }
}

fn is_localhost(name: &str) -> bool {
    matches!(name, "localhost" | "127.0.0.1" | "::1")
}

impl Mechanism for Plain {
    fn start(&mut self, server: &ServerInfo) -> Result<(String, Option<Vec<u8>>)> {
        if !server.tls && !is_localhost(&server.name) {
            return Err(Error::Auth("unencrypted connection".into()));
        }
        if server.name != self.host {
            return Err(Error::Auth("wrong host name".into()));
        }
        let resp = format!("{}\0{}\0{}", self.identity, self.username, self.password);
        Ok(("PLAIN".to_string(), Some(resp.into_bytes())))
    }

    fn next(&mut self, _challenge: &[u8], more: bool) -> Result<Option<Vec<u8>>> {
        if more {
            return Err(Error::Auth("unexpected server challenge".into()));
        }
        Ok(None)
    }
}
