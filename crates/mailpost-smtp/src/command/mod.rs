//! SMTP command builder.

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Mechanism name
        mechanism: String,
        /// Base64 initial response (SASL-IR)
        initial_response: Option<String>,
    },
    /// Base64 response to a 334 challenge
    AuthResponse(String),
    /// `*` - Abort an authentication exchange
    AuthCancel,
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Envelope sender
        from: String,
        /// Append `BODY=8BITMIME`
        body_8bitmime: bool,
        /// SIZE parameter
        size: Option<usize>,
        /// Append `SMTPUTF8`
        smtputf8: bool,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: String,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// VRFY - Verify address
    Vrfy {
        /// Address to verify
        address: String,
    },
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Returns the command verb, safe to log.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::AuthResponse(_) => "AUTH-RESPONSE",
            Self::AuthCancel => "AUTH-CANCEL",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Vrfy { .. } => "VRFY",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
    }

    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Helo { hostname } => {
                buf.extend_from_slice(b"HELO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::Ehlo { hostname } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::StartTls => {
                buf.extend_from_slice(b"STARTTLS");
            }
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTH ");
                buf.extend_from_slice(mechanism.as_bytes());
                if let Some(resp) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(resp.as_bytes());
                }
            }
            Self::AuthResponse(resp) => {
                buf.extend_from_slice(resp.as_bytes());
            }
            Self::AuthCancel => {
                buf.push(b'*');
            }
            Self::MailFrom {
                from,
                body_8bitmime,
                size,
                smtputf8,
            } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.as_bytes());
                buf.push(b'>');
                if *body_8bitmime {
                    buf.extend_from_slice(b" BODY=8BITMIME");
                }
                if let Some(msg_size) = size {
                    buf.extend_from_slice(format!(" SIZE={msg_size}").as_bytes());
                }
                if *smtputf8 {
                    buf.extend_from_slice(b" SMTPUTF8");
                }
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.as_bytes());
                buf.push(b'>');
            }
            Self::Data => {
                buf.extend_from_slice(b"DATA");
            }
            Self::Rset => {
                buf.extend_from_slice(b"RSET");
            }
            Self::Vrfy { address } => {
                buf.extend_from_slice(b"VRFY ");
                buf.extend_from_slice(address.as_bytes());
            }
            Self::Noop => {
                buf.extend_from_slice(b"NOOP");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(from: &str) -> Command {
        Command::MailFrom {
            from: from.to_string(),
            body_8bitmime: false,
            size: None,
            smtputf8: false,
        }
    }

    #[test]
    fn test_greetings() {
        let helo = Command::Helo {
            hostname: "client.example.com".to_string(),
        };
        let ehlo = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(helo.serialize(), b"HELO client.example.com\r\n");
        assert_eq!(ehlo.serialize(), b"EHLO client.example.com\r\n");
    }

    #[test]
    fn test_auth_with_initial_response() {
        let cmd = Command::Auth {
            mechanism: "PLAIN".to_string(),
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(cmd.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
    }

    #[test]
    fn test_auth_without_initial_response() {
        let cmd = Command::Auth {
            mechanism: "LOGIN".to_string(),
            initial_response: None,
        };
        assert_eq!(cmd.serialize(), b"AUTH LOGIN\r\n");
        assert_eq!(
            Command::AuthResponse("dXNlcg==".to_string()).serialize(),
            b"dXNlcg==\r\n"
        );
        assert_eq!(Command::AuthCancel.serialize(), b"*\r\n");
    }

    #[test]
    fn test_mail_from_simple() {
        assert_eq!(
            mail("sender@example.com").serialize(),
            b"MAIL FROM:<sender@example.com>\r\n"
        );
        assert_eq!(mail("").serialize(), b"MAIL FROM:<>\r\n");
    }

    #[test]
    fn test_mail_from_with_params() {
        let cmd = Command::MailFrom {
            from: "sender@example.com".to_string(),
            body_8bitmime: true,
            size: Some(12345),
            smtputf8: true,
        };
        assert_eq!(
            cmd.serialize(),
            b"MAIL FROM:<sender@example.com> BODY=8BITMIME SIZE=12345 SMTPUTF8\r\n"
        );
    }

    #[test]
    fn test_simple_commands() {
        let rcpt = Command::RcptTo {
            to: "recipient@example.com".to_string(),
        };
        assert_eq!(rcpt.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
        assert_eq!(Command::Noop.serialize(), b"NOOP\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
        let vrfy = Command::Vrfy {
            address: "postmaster".to_string(),
        };
        assert_eq!(vrfy.serialize(), b"VRFY postmaster\r\n");
    }

    #[test]
    fn test_verb_hides_payload() {
        let cmd = Command::AuthResponse("c2VjcmV0".to_string());
        assert_eq!(cmd.verb(), "AUTH-RESPONSE");
        assert_eq!(mail("a@b").verb(), "MAIL");
    }
}
