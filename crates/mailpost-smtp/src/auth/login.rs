//! LOGIN mechanism.

use super::{Mechanism, ServerInfo};
use crate::error::{Error, Result};

/// LOGIN authentication: the username and password answer the server's two
/// 334 prompts in turn.
#[derive(Clone)]
pub struct Login {
    username: String,
    password: String,
    step: u8,
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("step", &self.step)
            .finish()
    }
}

impl Login {
    /// Creates a LOGIN mechanism.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            step: 0,
        }
    }
}

impl Mechanism for Login {
    fn start(&mut self, _server: &ServerInfo) -> Result<(String, Option<Vec<u8>>)> {
        self.step = 0;
        Ok(("LOGIN".to_string(), None))
    }

    fn next(&mut self, _challenge: &[u8], more: bool) -> Result<Option<Vec<u8>>> {
        if !more {
            return Ok(None);
        }
        self.step = self.step.saturating_add(1);
        match self.step {
            1 => Ok(Some(self.username.as_bytes().to_vec())),
            2 => Ok(Some(self.password.as_bytes().to_vec())),
            _ => Err(Error::Auth("unexpected server challenge".into())),
        }
    }
}
