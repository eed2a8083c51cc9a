//! STARTTLS tests against a loopback server with a self-signed certificate.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use mailpost_smtp::auth::Plain;
use mailpost_smtp::connection::connect;
use mailpost_smtp::{Security, Session, TlsConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

const PLAIN_EHLO: &[u8] = b"250-localhost\r\n250-STARTTLS\r\n250 SIZE 1000\r\n";
const TLS_EHLO: &[u8] = b"250-localhost\r\n250 AUTH PLAIN\r\n";

struct Pki {
    cert: CertificateDer<'static>,
    acceptor: TlsAcceptor,
    client: TlsConfig,
}

fn pki() -> Pki {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        certified.key_pair.serialize_der(),
    ));

    let server = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], key)
        .unwrap();

    let mut roots = RootCertStore::empty();
    roots.add(cert.clone()).unwrap();
    let client = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Pki {
        cert,
        acceptor: TlsAcceptor::from(Arc::new(server)),
        client: TlsConfig::with_client_config("localhost", Arc::new(client)),
    }
}

/// Answers commands until STARTTLS (returns true) or QUIT (returns false).
async fn answer<S>(stream: &mut BufReader<S>, ehlo: &[u8], seen: &mut Vec<String>) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let mut line = String::new();
        if stream.read_line(&mut line).await.unwrap() == 0 {
            return false;
        }
        let line = line.trim_end().to_string();
        let verb = line.split(' ').next().unwrap_or_default().to_string();
        seen.push(line);

        let reply: &[u8] = match verb.as_str() {
            "EHLO" => ehlo,
            "STARTTLS" => b"220 2.0.0 Ready to start TLS\r\n",
            "AUTH" => b"235 2.7.0 Authentication successful\r\n",
            "QUIT" => b"221 2.0.0 Bye\r\n",
            _ => b"250 Ok\r\n",
        };
        stream.get_mut().write_all(reply).await.unwrap();

        match verb.as_str() {
            "STARTTLS" => return true,
            "QUIT" => {
                // Wait for the client to hang up.
                let mut rest = Vec::new();
                let _ = stream.read_to_end(&mut rest).await;
                return false;
            }
            _ => {}
        }
    }
}

async fn serve(listener: TcpListener, acceptor: TlsAcceptor) -> Vec<String> {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut seen = Vec::new();

    let mut plain = BufReader::new(tcp);
    plain
        .get_mut()
        .write_all(b"220 localhost ESMTP\r\n")
        .await
        .unwrap();
    if !answer(&mut plain, PLAIN_EHLO, &mut seen).await {
        return seen;
    }

    let tls = acceptor.accept(plain.into_inner()).await.unwrap();
    let mut tls = BufReader::new(tls);
    answer(&mut tls, TLS_EHLO, &mut seen).await;
    seen
}

async fn open(acceptor: TlsAcceptor) -> (Session, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve(listener, acceptor));

    let stream = connect("127.0.0.1", port, Duration::from_secs(5))
        .await
        .unwrap();
    let session = Session::new(stream, "localhost").await.unwrap();
    (session, server)
}

#[tokio::test]
async fn start_tls_replaces_extensions() {
    let pki = pki();
    let (mut session, server) = open(pki.acceptor).await;

    assert_eq!(session.extension("SIZE").await, Some("1000"));
    assert!(session.extension("STARTTLS").await.is_some());
    assert!(session.tls_connection_state().is_none());

    session.start_tls(&pki.client).await.unwrap();
    assert!(session.is_tls());

    assert_eq!(session.extension("SIZE").await, None);
    assert_eq!(session.extension("STARTTLS").await, None);
    assert_eq!(session.extension("AUTH").await, Some("PLAIN"));
    assert_eq!(session.extensions().unwrap().auth_mechanisms(), ["PLAIN"]);

    let info = session.tls_connection_state().unwrap();
    assert!(info.protocol_version.is_some());
    assert!(info.cipher_suite.is_some());
    assert_eq!(info.peer_certificates.first(), Some(&pki.cert));

    session.quit().await.unwrap();
    let seen = server.await.unwrap();
    assert_eq!(
        seen,
        ["EHLO localhost", "STARTTLS", "EHLO localhost", "QUIT"]
    );
}

#[tokio::test]
async fn start_session_upgrades_then_authenticates() {
    let pki = pki();
    let (session, server) = open(pki.acceptor).await;
    let mut session = session
        .with_security(Security::Required)
        .with_tls_config(pki.client)
        .with_mechanism(Box::new(Plain::new("", "user", "pass", "localhost")));

    session.start_session().await.unwrap();
    assert!(session.is_tls());

    session.quit().await.unwrap();
    let seen = server.await.unwrap();
    assert_eq!(
        seen,
        [
            "EHLO localhost",
            "STARTTLS",
            "EHLO localhost",
            "AUTH PLAIN AHVzZXIAcGFzcw==",
            "QUIT"
        ]
    );
}
