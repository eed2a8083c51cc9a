//! SMTP session: negotiation, transactions and composite send operations.
//!
//! A [`Session`] owns one connection and tracks its protocol state at
//! runtime. Operations that need a prior EHLO/HELO perform it lazily, so
//! most callers only use [`Session::start_session`], [`Session::send_single`]
//! and [`Session::quit`], or [`Session::send_bulk`] for the whole sequence.

use crate::auth::{self, Mechanism, ServerInfo};
use crate::command::Command;
use crate::connection::{
    DotStuffer, Security, SessionConfig, SmtpStream, TlsConfig, TlsInfo, connect, connect_tls,
};
use crate::error::{Error, Result};
use crate::types::{Extension, Extensions, Reply, classify};
use mailpost_mime::Message;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Mail transaction phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionPhase {
    /// No transaction in progress.
    #[default]
    Idle,
    /// MAIL accepted.
    MailSent,
    /// At least one RCPT accepted.
    RecipientsAccepted,
    /// DATA accepted; message content is being written.
    InData,
    /// Last message accepted. A new transaction may start.
    Complete,
}

/// Outcome of one message in [`Session::send_bulk`].
#[derive(Debug)]
pub struct SendReportItem {
    /// Message-Id assigned to the message, if it got that far.
    pub message_id: Option<String>,
    /// Whether the server accepted the message.
    pub sent: bool,
    /// Failure, if not sent.
    pub error: Option<Error>,
}

/// Per-message outcomes of a bulk send, in input order.
#[derive(Debug, Default)]
pub struct SendReport {
    /// One item per message.
    pub items: Vec<SendReportItem>,
}

impl SendReport {
    /// Returns the number of messages accepted by the server.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.items.iter().filter(|item| item.sent).count()
    }

    /// Returns the items that failed.
    pub fn failures(&self) -> impl Iterator<Item = &SendReportItem> {
        self.items.iter().filter(|item| !item.sent)
    }
}

/// A client SMTP session over one connection.
pub struct Session {
    stream: Option<SmtpStream>,
    server_name: String,
    local_name: String,
    extensions: Option<Extensions>,
    tls: bool,
    did_hello: bool,
    hello_error: Option<Error>,
    phase: TransactionPhase,
    mechanism: Option<Box<dyn Mechanism>>,
    tls_config: Option<TlsConfig>,
    security: Security,
    io_timeout: Duration,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("server_name", &self.server_name)
            .field("local_name", &self.local_name)
            .field("extensions", &self.extensions)
            .field("tls", &self.tls)
            .field("did_hello", &self.did_hello)
            .field("phase", &self.phase)
            .field("security", &self.security)
            .field("closed", &self.stream.is_none())
            .finish_non_exhaustive()
    }
}

async fn with_timeout<T>(timeout: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Timeout(timeout))?
}

fn validate_line(value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::Validation(
            "command argument contains CR or LF".into(),
        ));
    }
    Ok(())
}

impl Session {
    /// Creates a session over an open stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting cannot be read or is not 220.
    pub async fn new(stream: SmtpStream, server_name: impl Into<String>) -> Result<Self> {
        Self::with_config(stream, &SessionConfig::new(server_name)).await
    }

    /// Creates a session over an open stream using the given configuration
    /// for names, security mode and timeouts, and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting cannot be read or is not 220.
    pub async fn with_config(stream: SmtpStream, config: &SessionConfig) -> Result<Self> {
        let mut session = Self {
            tls: stream.is_tls(),
            stream: Some(stream),
            server_name: config.host.clone(),
            local_name: config.local_name.clone(),
            extensions: None,
            did_hello: false,
            hello_error: None,
            phase: TransactionPhase::Idle,
            mechanism: None,
            tls_config: None,
            security: config.security,
            io_timeout: config.io_timeout,
        };

        match session.read_reply().await.and_then(|r| r.expect(220)) {
            Ok(greeting) => {
                tracing::info!(
                    server = %session.server_name,
                    greeting = %greeting.message_text(),
                    "Connected"
                );
                Ok(session)
            }
            Err(e) => {
                let _ = session.close().await;
                Err(e)
            }
        }
    }

    /// Connects to the configured server and reads the greeting.
    ///
    /// Uses implicit TLS when the security mode is [`Security::Implicit`].
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, TLS handshake or greeting fails.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let stream = if config.security == Security::Implicit {
            let tls = TlsConfig::new(config.host.clone());
            connect_tls(&config.host, config.port, config.connect_timeout, &tls).await?
        } else {
            connect(&config.host, config.port, config.connect_timeout).await?
        };
        Self::with_config(stream, config).await
    }

    /// Sets the mechanism [`Session::start_session`] authenticates with.
    #[must_use]
    pub fn with_mechanism(mut self, mechanism: Box<dyn Mechanism>) -> Self {
        self.mechanism = Some(mechanism);
        self
    }

    /// Sets the TLS configuration used for STARTTLS by
    /// [`Session::start_session`].
    #[must_use]
    pub fn with_tls_config(mut self, config: TlsConfig) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the read/write timeout.
    #[must_use]
    pub const fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Returns the current transaction phase.
    #[must_use]
    pub const fn phase(&self) -> TransactionPhase {
        self.phase
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls
    }

    /// Returns true once the connection has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Returns the extensions from the last successful hello.
    #[must_use]
    pub const fn extensions(&self) -> Option<&Extensions> {
        self.extensions.as_ref()
    }

    fn supports(&self, ext: Extension) -> bool {
        self.extensions.as_ref().is_some_and(|e| e.supports(ext))
    }

    pub(crate) fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: self.server_name.clone(),
            tls: self.tls,
            mechanisms: self
                .extensions
                .as_ref()
                .map(|e| e.auth_mechanisms().to_vec())
                .unwrap_or_default(),
        }
    }

    fn stream_mut(&mut self) -> Result<&mut SmtpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState("session is closed".into()))
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let timeout = self.io_timeout;
        let stream = self.stream_mut()?;
        with_timeout(timeout, stream.write_all(data)).await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let timeout = self.io_timeout;
        let stream = self.stream_mut()?;
        with_timeout(timeout, stream.read_reply()).await
    }

    /// Sends a command and reads its reply without checking the code.
    pub(crate) async fn command(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::debug!(command = cmd.verb(), "Sending command");
        self.write(&cmd.serialize()).await?;
        let reply = self.read_reply().await?;
        tracing::debug!(command = cmd.verb(), code = reply.code.as_u16(), "Reply");
        Ok(reply)
    }

    async fn ehlo(&mut self) -> Result<()> {
        let reply = self
            .command(&Command::Ehlo {
                hostname: self.local_name.clone(),
            })
            .await?
            .expect(250)?;
        self.extensions = Some(Extensions::parse(&reply.message_text()));
        Ok(())
    }

    async fn helo(&mut self) -> Result<()> {
        self.extensions = None;
        self.command(&Command::Helo {
            hostname: self.local_name.clone(),
        })
        .await?
        .expect(250)?;
        self.extensions = Some(Extensions::default());
        Ok(())
    }

    /// Greets the server with EHLO, falling back to HELO.
    ///
    /// Runs at most once per session; later calls return the first outcome.
    ///
    /// # Errors
    ///
    /// Returns the error of the failed HELO if both greetings failed.
    pub async fn hello(&mut self) -> Result<()> {
        if !self.did_hello {
            self.did_hello = true;
            if let Err(e) = self.ehlo().await {
                tracing::warn!(?e, "EHLO failed, falling back to HELO");
                if let Err(e) = self.helo().await {
                    self.hello_error = Some(e);
                }
            }
        }
        match &self.hello_error {
            Some(e) => Err(e.replay()),
            None => Ok(()),
        }
    }

    /// Greets the server using `local_name` instead of the configured name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`], without any I/O, if called after any
    /// other operation. Otherwise as [`Session::hello`].
    pub async fn hello_as(&mut self, local_name: &str) -> Result<()> {
        if self.did_hello || self.is_closed() {
            return Err(Error::InvalidState(
                "hello_as called after other methods".into(),
            ));
        }
        validate_line(local_name)?;
        self.local_name = local_name.to_string();
        self.hello().await
    }

    /// Upgrades the connection with STARTTLS and greets the server again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if STARTTLS is not advertised, or an
    /// error if the command, handshake or new EHLO fails. A failed handshake
    /// closes the session.
    pub async fn start_tls(&mut self, config: &TlsConfig) -> Result<()> {
        self.hello().await?;
        if !self.supports(Extension::StartTls) {
            return Err(Error::NotSupported("STARTTLS".into()));
        }
        self.command(&Command::StartTls).await?.expect(220)?;

        let stream = self
            .stream
            .take()
            .ok_or_else(|| Error::InvalidState("session is closed".into()))?;
        let stream = with_timeout(self.io_timeout, stream.upgrade_to_tls(config)).await?;
        self.stream = Some(stream);
        self.tls = true;
        tracing::info!(server = %config.server_name, "TLS established");

        self.ehlo().await
    }

    /// Returns the negotiated TLS parameters, if encrypted.
    #[must_use]
    pub fn tls_connection_state(&self) -> Option<TlsInfo> {
        self.stream.as_ref().and_then(SmtpStream::tls_info)
    }

    /// Authenticates with the given mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails. The session is quit and
    /// closed before the error is returned.
    pub async fn authenticate(&mut self, mechanism: &mut dyn Mechanism) -> Result<()> {
        self.hello().await?;
        match auth::exchange(self, mechanism).await {
            Ok(()) => {
                tracing::info!(server = %self.server_name, "Authenticated");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(?e, "Authentication failed");
                let _ = self.quit().await;
                Err(e)
            }
        }
    }

    fn check_phase(&self, allowed: &[TransactionPhase], operation: &str) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "{operation} not allowed in phase {:?}",
                self.phase
            )))
        }
    }

    async fn mail_with(&mut self, from: &str, size: Option<usize>, smtputf8: bool) -> Result<()> {
        self.check_phase(&[TransactionPhase::Idle, TransactionPhase::Complete], "MAIL")?;
        validate_line(from)?;
        self.hello().await?;

        let cmd = Command::MailFrom {
            from: from.to_string(),
            body_8bitmime: self.supports(Extension::EightBitMime),
            size: size.filter(|_| self.supports(Extension::Size)),
            smtputf8,
        };
        match self.command(&cmd).await.and_then(|r| r.expect(250)) {
            Ok(_) => {
                self.phase = TransactionPhase::MailSent;
                Ok(())
            }
            Err(e) => {
                self.phase = TransactionPhase::Idle;
                Err(e)
            }
        }
    }

    /// Starts a mail transaction.
    ///
    /// Adds `BODY=8BITMIME` if the server supports it, and `SIZE` when a
    /// size is given and the server supports it.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already in progress or the
    /// server rejects the sender.
    pub async fn mail(&mut self, from: &str, size: Option<usize>) -> Result<()> {
        self.mail_with(from, size, false).await
    }

    /// Adds a recipient. Any 25x reply is accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is in progress or the server
    /// rejects the recipient.
    pub async fn rcpt(&mut self, to: &str) -> Result<()> {
        self.check_phase(
            &[TransactionPhase::MailSent, TransactionPhase::RecipientsAccepted],
            "RCPT",
        )?;
        validate_line(to)?;
        self.command(&Command::RcptTo { to: to.to_string() })
            .await?
            .expect(25)?;
        self.phase = TransactionPhase::RecipientsAccepted;
        Ok(())
    }

    /// Starts sending the message content.
    ///
    /// # Errors
    ///
    /// Returns an error if no recipient was accepted or the server refuses
    /// DATA.
    pub async fn data(&mut self) -> Result<DataSink<'_>> {
        self.check_phase(&[TransactionPhase::RecipientsAccepted], "DATA")?;
        self.command(&Command::Data).await?.expect(354)?;
        self.phase = TransactionPhase::InData;
        Ok(DataSink {
            session: self,
            stuffer: DotStuffer::new(),
        })
    }

    /// Aborts the current transaction with RSET.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn reset(&mut self) -> Result<()> {
        self.hello().await?;
        self.command(&Command::Rset).await?.expect(250)?;
        self.phase = TransactionPhase::Idle;
        Ok(())
    }

    /// Checks an address with VRFY.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not confirm the address.
    pub async fn verify(&mut self, address: &str) -> Result<()> {
        self.hello().await?;
        validate_line(address)?;
        self.command(&Command::Vrfy {
            address: address.to_string(),
        })
        .await?
        .expect(250)?;
        Ok(())
    }

    /// Returns the parameter of an advertised extension (case-insensitive).
    ///
    /// `None` if the extension is absent or the greeting failed.
    pub async fn extension(&mut self, name: &str) -> Option<&str> {
        self.hello().await.ok()?;
        self.extensions.as_ref()?.get(name)
    }

    /// Sends QUIT and closes the connection, even if QUIT fails.
    ///
    /// Does nothing on a closed session.
    ///
    /// # Errors
    ///
    /// Returns an error if QUIT is not answered with 221.
    pub async fn quit(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let result = self
            .command(&Command::Quit)
            .await
            .and_then(|r| r.expect(221))
            .map(|_| ());
        self.phase = TransactionPhase::Idle;
        let closed = self.close().await;
        result.and(closed)
    }

    /// Closes the connection without QUIT. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if shutting down the stream fails.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        tracing::debug!(server = %self.server_name, "Closing connection");
        stream.shutdown().await
    }

    /// Issues MAIL and one RCPT per envelope recipient of `message`.
    ///
    /// The sender is the return-path override or the From address; the
    /// recipients are the single-recipient override or To, Cc and Bcc in
    /// order. `SMTPUTF8` is requested if any address needs it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Addressing`] if an address cannot be sent to this
    /// server, or the first rejected command.
    pub async fn mail_and_rcpt(&mut self, message: &Message) -> Result<()> {
        self.envelope(message, None).await
    }

    /// MAIL and RCPT with the rendered message size for `SIZE=`.
    async fn envelope(&mut self, message: &Message, size: Option<usize>) -> Result<()> {
        self.hello().await?;
        let smtputf8 = self.supports(Extension::SmtpUtf8);

        let (from, mut needs_smtputf8) = classify(message.envelope_from(), smtputf8)?;
        let mut recipients = Vec::new();
        for rcpt in message.envelope_recipients() {
            let (to, needs) = classify(rcpt, smtputf8)?;
            needs_smtputf8 |= needs;
            recipients.push(to);
        }

        self.mail_with(&from, size, needs_smtputf8).await?;
        for to in &recipients {
            self.rcpt(to).await?;
        }
        Ok(())
    }

    async fn transmit(&mut self, body: &[u8]) -> Result<()> {
        let mut sink = self.data().await?;
        sink.write(body).await?;
        sink.close().await
    }

    /// Sends one message over the open session.
    ///
    /// Assigns the Message-Id if missing. On a rejected envelope or DATA
    /// the transaction is reset before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without any I/O if the message has no
    /// sender or no recipients, or the first failure of the transaction.
    pub async fn send_single(&mut self, message: &mut Message) -> Result<()> {
        if message.from.address.is_empty() {
            return Err(Error::Validation("From address can not be empty".into()));
        }
        if message.envelope_recipients().is_empty() {
            return Err(Error::Validation(
                "Recipient addresses can not be empty".into(),
            ));
        }
        message.ensure_message_id();
        let body = message.to_bytes()?;

        if let Err(e) = self.envelope(message, Some(body.len())).await {
            let _ = self.reset().await;
            return Err(e);
        }
        if let Err(e) = self.transmit(&body).await {
            if self.phase == TransactionPhase::RecipientsAccepted {
                let _ = self.reset().await;
            }
            return Err(e);
        }

        tracing::info!(
            message_id = message.message_id.as_deref().unwrap_or_default(),
            "Message accepted"
        );
        Ok(())
    }

    /// Greets the server, upgrades to TLS per the security mode and
    /// authenticates if a mechanism is set and the server offers AUTH.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if TLS is required but STARTTLS is
    /// not advertised, or the first failing step.
    pub async fn start_session(&mut self) -> Result<()> {
        self.hello().await?;

        let upgrade = match self.security {
            Security::Opportunistic => !self.tls && self.supports(Extension::StartTls),
            Security::Required => !self.tls,
            Security::None | Security::Implicit => false,
        };
        if upgrade {
            let config = self
                .tls_config
                .clone()
                .unwrap_or_else(|| TlsConfig::new(self.server_name.clone()));
            self.start_tls(&config).await?;
        }

        if self.supports(Extension::Auth)
            && let Some(mut mechanism) = self.mechanism.take()
        {
            let result = self.authenticate(&mut *mechanism).await;
            self.mechanism = Some(mechanism);
            result?;
        }

        tracing::info!(server = %self.server_name, tls = self.tls, "Session started");
        Ok(())
    }

    /// Sends every message over this session, then quits.
    ///
    /// A failing message does not stop the others. If the session cannot
    /// be started nothing is sent, the connection is closed and the report
    /// is empty.
    ///
    /// Returns the report and the outcome of session setup or QUIT.
    pub async fn send_bulk(&mut self, messages: &mut [Message]) -> (SendReport, Result<()>) {
        let mut report = SendReport::default();
        if let Err(e) = self.start_session().await {
            let _ = self.close().await;
            return (report, Err(e));
        }

        for message in messages.iter_mut() {
            let result = self.send_single(message).await;
            if let Err(e) = &result {
                tracing::warn!(?e, message_id = ?message.message_id, "Message not sent");
            }
            report.items.push(SendReportItem {
                message_id: message.message_id.clone(),
                sent: result.is_ok(),
                error: result.err(),
            });
        }

        let quit = self.quit().await;
        (report, quit)
    }
}

/// Writer for the DATA phase.
///
/// Dot-stuffs the content and normalizes line endings. Dropping the sink
/// without [`DataSink::close`] leaves the session in
/// [`TransactionPhase::InData`].
#[derive(Debug)]
pub struct DataSink<'a> {
    session: &'a mut Session,
    stuffer: DotStuffer,
}

impl DataSink<'_> {
    /// Writes message content.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the session stays in
    /// [`TransactionPhase::InData`] and must be reset.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut out = Vec::with_capacity(data.len() + data.len() / 32);
        self.stuffer.encode(data, &mut out);
        self.session.write(&out).await
    }

    /// Ends the content and waits for the server's verdict.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the message (the session
    /// returns to [`TransactionPhase::Idle`]) or on I/O failure.
    pub async fn close(self) -> Result<()> {
        let mut out = Vec::with_capacity(5);
        self.stuffer.finish(&mut out);
        self.session.write(&out).await?;
        let reply = self.session.read_reply().await?;
        match reply.expect(250) {
            Ok(_) => {
                self.session.phase = TransactionPhase::Complete;
                Ok(())
            }
            Err(e) => {
                self.session.phase = TransactionPhase::Idle;
                Err(e)
            }
        }
    }
}

/// Connects, starts the session, sends one message and quits.
///
/// # Errors
///
/// Returns the first failure. The connection is closed in every case.
pub async fn send_mail(
    config: &SessionConfig,
    mechanism: Option<Box<dyn Mechanism>>,
    message: &mut Message,
) -> Result<()> {
    let mut session = Session::connect(config).await?;
    if let Some(mechanism) = mechanism {
        session = session.with_mechanism(mechanism);
    }

    let result = match session.start_session().await {
        Ok(()) => session.send_single(message).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => session.quit().await,
        Err(e) => {
            let _ = session.quit().await;
            Err(e)
        }
    }
}
