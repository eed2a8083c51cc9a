//! Envelope address preparation for SMTPUTF8 (RFC 6531).

use crate::error::{Error, Result};
use mailpost_mime::split;

/// Prepares an envelope address for the server.
///
/// Returns the address to send and whether it needs the `SMTPUTF8`
/// parameter on MAIL:
///
/// - ASCII addresses pass through unchanged.
/// - Non-ASCII addresses pass through unchanged when the server supports
///   SMTPUTF8, and need the extension.
/// - Otherwise a non-ASCII domain is rewritten to its IDNA ASCII form; a
///   non-ASCII local part cannot be sent.
///
/// # Errors
///
/// Returns [`Error::Addressing`] if the local part is not ASCII and SMTPUTF8
/// is unavailable, or the domain is not IDNA safe.
pub fn classify(address: &str, smtputf8: bool) -> Result<(String, bool)> {
    if address.is_ascii() {
        return Ok((address.to_string(), false));
    }
    if smtputf8 {
        return Ok((address.to_string(), true));
    }

    let (user, domain) = split(address);
    if !user.is_ascii() {
        return Err(Error::Addressing(
            "local part is not ASCII but server does not support SMTPUTF8".into(),
        ));
    }

    let domain = idna::domain_to_ascii(domain)
        .map_err(|_| Error::Addressing("non-ASCII domain is not IDNA safe".into()))?;
    Ok((format!("{user}@{domain}"), false))
}
