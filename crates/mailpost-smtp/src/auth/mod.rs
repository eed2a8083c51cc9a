//! SMTP authentication (RFC 4954).
//!
//! A [`Mechanism`] produces the SASL payloads; the session drives the
//! base64 challenge/response exchange:
//!
//! ```text
//! C: AUTH <mech> [<base64 initial response>]
//! S: 334 <base64 challenge>      -> Mechanism::next(challenge, true)
//! C: <base64 response>
//! S: 235 <text>                  -> Mechanism::next(text, false)
//! ```
//!
//! If the mechanism fails, or has nothing to say to a challenge, the client
//! sends `*` to abort the exchange.

mod login;
mod plain;

pub use login::Login;
pub use plain::Plain;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::types::ReplyCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// What a mechanism knows about the server it authenticates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server name the session was opened for.
    pub name: String,
    /// Whether the connection is encrypted.
    pub tls: bool,
    /// Mechanisms advertised in the EHLO `AUTH` line.
    pub mechanisms: Vec<String>,
}

/// A SASL authentication mechanism.
pub trait Mechanism: Send {
    /// Begins authentication.
    ///
    /// Returns the mechanism name and an optional initial response.
    ///
    /// # Errors
    ///
    /// Returns an error to refuse authenticating against this server.
    fn start(&mut self, server: &ServerInfo) -> Result<(String, Option<Vec<u8>>)>;

    /// Continues authentication.
    ///
    /// `challenge` is the decoded server challenge when `more` is true, or
    /// the final success text when `more` is false. Returns the response to
    /// send, if any.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the exchange.
    fn next(&mut self, challenge: &[u8], more: bool) -> Result<Option<Vec<u8>>>;
}

/// Runs the AUTH exchange. The caller terminates the session on failure.
pub(crate) async fn exchange(session: &mut Session, mechanism: &mut dyn Mechanism) -> Result<()> {
    let server = session.server_info();
    let (name, initial) = mechanism.start(&server)?;

    let initial_response = initial
        .filter(|resp| !resp.is_empty())
        .map(|resp| STANDARD.encode(resp));
    let mut reply = session
        .command(&Command::Auth {
            mechanism: name,
            initial_response,
        })
        .await?;

    loop {
        match reply.code {
            ReplyCode::AUTH_CONTINUE => {
                let step = STANDARD
                    .decode(reply.message_text().trim())
                    .map_err(|e| Error::Protocol(format!("Invalid AUTH challenge: {e}")))
                    .and_then(|challenge| mechanism.next(&challenge, true));
                let response = match step {
                    Ok(Some(response)) => response,
                    Ok(None) => {
                        return abort(session, Error::Auth("no response to server challenge".into()))
                            .await;
                    }
                    Err(e) => return abort(session, e).await,
                };
                reply = session
                    .command(&Command::AuthResponse(STANDARD.encode(response)))
                    .await?;
            }
            ReplyCode::AUTH_SUCCEEDED => {
                return match mechanism.next(reply.message_text().as_bytes(), false) {
                    Ok(_) => Ok(()),
                    Err(e) => abort(session, e).await,
                };
            }
            code => {
                return Err(Error::smtp_error(code.as_u16(), reply.message_text()));
            }
        }
    }
}

async fn abort(session: &mut Session, err: Error) -> Result<()> {
    tracing::warn!(error = %err, "Aborting authentication");
    // Usually 501.
    let _ = session.command(&Command::AuthCancel).await;
    Err(err)
}
