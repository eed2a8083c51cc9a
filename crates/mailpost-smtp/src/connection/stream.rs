//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::Reply;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{CipherSuite, ProtocolVersion};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

/// Byte stream an SMTP session can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// SMTP stream (plain or TLS).
pub enum SmtpStream {
    /// Unencrypted connection.
    Plain(BufReader<Box<dyn AsyncStream>>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<TlsStream<Box<dyn AsyncStream>>>>),
}

impl fmt::Debug for SmtpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("SmtpStream::Plain"),
            Self::Tls(_) => f.write_str("SmtpStream::Tls"),
        }
    }
}

impl SmtpStream {
    /// Wraps an already-open byte stream.
    pub fn plain<S: AsyncStream + 'static>(stream: S) -> Self {
        Self::Plain(BufReader::new(Box::new(stream)))
    }

    /// Reads a line from the stream, without its line terminator.
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the peer closed the connection.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        let n = match self {
            Self::Plain(reader) => reader.read_until(b'\n', &mut line).await?,
            Self::Tls(reader) => reader.read_until(b'\n', &mut line).await?,
        };
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        Ok(String::from_utf8_lossy(&line).trim_end().to_string())
    }

    /// Reads one complete, possibly multi-line, reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the reply is malformed.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
        }

        parse_reply(&lines)
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        Ok(())
    }

    /// Upgrades a plain stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted, the server name
    /// is invalid or the handshake fails.
    pub async fn upgrade_to_tls(self, config: &TlsConfig) -> Result<Self> {
        let inner = match self {
            Self::Plain(reader) => reader.into_inner(),
            Self::Tls(_) => return Err(Error::InvalidState("Already using TLS".into())),
        };

        let server_name = ServerName::try_from(config.server_name.clone())?;
        let connector = TlsConnector::from(Arc::clone(&config.client_config));
        let tls_stream = connector.connect(server_name, inner).await?;
        Ok(Self::Tls(Box::new(BufReader::new(tls_stream))))
    }

    /// Returns true if the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Returns the negotiated TLS parameters, if encrypted.
    #[must_use]
    pub fn tls_info(&self) -> Option<TlsInfo> {
        let Self::Tls(reader) = self else {
            return None;
        };
        let (_, conn) = reader.get_ref().get_ref();
        Some(TlsInfo {
            protocol_version: conn.protocol_version(),
            cipher_suite: conn.negotiated_cipher_suite().map(|s| s.suite()),
            peer_certificates: conn
                .peer_certificates()
                .map(<[CertificateDer<'static>]>::to_vec)
                .unwrap_or_default(),
        })
    }

    /// Shuts down the write side of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Self::Plain(reader) => reader.get_mut().shutdown().await?,
            Self::Tls(reader) => reader.get_mut().shutdown().await?,
        }
        Ok(())
    }
}

/// TLS settings for implicit TLS and STARTTLS.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Name the server certificate is verified against.
    pub server_name: String,
    /// rustls client configuration.
    pub client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Creates a configuration trusting the webpki root certificates.
    #[must_use]
    pub fn new(server_name: impl Into<String>) -> Self {
        let root_store = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self::with_client_config(server_name, Arc::new(config))
    }

    /// Creates a configuration with a custom rustls client config.
    #[must_use]
    pub fn with_client_config(
        server_name: impl Into<String>,
        client_config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            client_config,
        }
    }
}

/// Negotiated TLS parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsInfo {
    /// Protocol version.
    pub protocol_version: Option<ProtocolVersion>,
    /// Cipher suite.
    pub cipher_suite: Option<CipherSuite>,
    /// Peer certificate chain, leaf first.
    pub peer_certificates: Vec<CertificateDer<'static>>,
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails or times out.
pub async fn connect(hostname: &str, port: u16, timeout: Duration) -> Result<SmtpStream> {
    let stream = tcp_connect(hostname, port, timeout).await?;
    Ok(SmtpStream::plain(stream))
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(
    hostname: &str,
    port: u16,
    timeout: Duration,
    config: &TlsConfig,
) -> Result<SmtpStream> {
    let stream = connect(hostname, port, timeout).await?;
    tokio::time::timeout(timeout, stream.upgrade_to_tls(config))
        .await
        .map_err(|_| Error::Timeout(timeout))?
}

async fn tcp_connect(hostname: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{hostname}:{port}");
    let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| Error::Timeout(timeout))??;
    Ok(stream)
}
