//! Session protocol tests against scripted servers.
//!
//! Each test scripts the exact command/reply exchange with
//! `tokio_test::io::Builder`; the mock panics on any unexpected write and
//! on drop if part of the script was not consumed.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use mailpost_mime::{EmailAddress, Message};
use mailpost_smtp::auth::{Login, Plain};
use mailpost_smtp::{
    Error, Mechanism, Security, ServerInfo, Session, SessionConfig, SmtpStream, TlsConfig,
    TransactionPhase,
};
use tokio::io::AsyncWriteExt;
use tokio_test::io::{Builder, Mock};

const GREETING: &[u8] = b"220 mx.example.com ESMTP ready\r\n";
const EHLO: &[u8] = b"EHLO localhost\r\n";
const EHLO_REPLY: &[u8] =
    b"250-mx.example.com\r\n250-8BITMIME\r\n250-SIZE 1000\r\n250 AUTH PLAIN LOGIN\r\n";

async fn open(mock: Mock) -> Session {
    Session::new(SmtpStream::plain(mock), "mx.example.com")
        .await
        .unwrap()
}

async fn open_local(mock: Mock) -> Session {
    Session::new(SmtpStream::plain(mock), "localhost")
        .await
        .unwrap()
}

#[tokio::test]
async fn hello_runs_once_and_records_extensions() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .build();
    let mut session = open(mock).await;

    session.hello().await.unwrap();
    session.hello().await.unwrap();

    assert_eq!(session.extension("size").await, Some("1000"));
    assert_eq!(session.extension("8BITMIME").await, Some(""));
    assert_eq!(session.extension("STARTTLS").await, None);
    let ext = session.extensions().unwrap();
    assert_eq!(ext.auth_mechanisms(), ["PLAIN", "LOGIN"]);

    let err = session.hello_as("client.example.com").await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    session.close().await.unwrap();
}

#[tokio::test]
async fn hello_falls_back_to_helo() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(b"502 5.5.2 command not recognized\r\n")
        .write(b"HELO localhost\r\n")
        .read(b"250 mx.example.com\r\n")
        .build();
    let mut session = open(mock).await;

    session.hello().await.unwrap();
    assert!(session.extensions().unwrap().is_empty());
    assert_eq!(session.extension("8BITMIME").await, None);

    session.close().await.unwrap();
}

#[tokio::test]
async fn hello_failure_is_cached() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(b"502 no\r\n")
        .write(b"HELO localhost\r\n")
        .read(b"554 5.7.1 go away\r\n")
        .build();
    let mut session = open(mock).await;

    assert_eq!(session.hello().await.unwrap_err().code(), Some(554));
    assert_eq!(session.hello().await.unwrap_err().code(), Some(554));
    assert_eq!(session.extension("SIZE").await, None);

    session.close().await.unwrap();
}

#[tokio::test]
async fn hello_as_overrides_local_name() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"EHLO client.example.com\r\n")
        .read(b"250 mx.example.com\r\n")
        .build();
    let mut session = open(mock).await;

    session.hello_as("client.example.com").await.unwrap();
    assert!(matches!(
        session.hello_as("again.example.com").await,
        Err(Error::InvalidState(_))
    ));

    session.close().await.unwrap();
}

#[tokio::test]
async fn full_transaction() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .write(b"MAIL FROM:<sender@example.com> BODY=8BITMIME SIZE=500\r\n")
        .read(b"250 2.1.0 Ok\r\n")
        .write(b"RCPT TO:<one@example.com>\r\n")
        .read(b"250 2.1.5 Ok\r\n")
        .write(b"RCPT TO:<two@example.com>\r\n")
        .read(b"251 2.1.5 forwarded\r\n")
        .write(b"DATA\r\n")
        .read(b"354 End data with <CR><LF>.<CR><LF>\r\n")
        .write(b"Subject: hi\r\n\r\n..dot\r\nlast")
        .write(b"\r\n.\r\n")
        .read(b"250 2.0.0 queued as 1234\r\n")
        .write(b"QUIT\r\n")
        .read(b"221 2.0.0 Bye\r\n")
        .build();
    let mut session = open(mock).await;

    session.mail("sender@example.com", Some(500)).await.unwrap();
    assert_eq!(session.phase(), TransactionPhase::MailSent);
    session.rcpt("one@example.com").await.unwrap();
    session.rcpt("two@example.com").await.unwrap();
    assert_eq!(session.phase(), TransactionPhase::RecipientsAccepted);

    let mut sink = session.data().await.unwrap();
    sink.write(b"Subject: hi\n\n.dot\nlast").await.unwrap();
    sink.close().await.unwrap();
    assert_eq!(session.phase(), TransactionPhase::Complete);

    session.quit().await.unwrap();
    assert!(session.is_closed());
    assert_eq!(session.phase(), TransactionPhase::Idle);
}

#[tokio::test]
async fn mail_without_advertised_params() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(b"250 mx.example.com\r\n")
        .write(b"MAIL FROM:<sender@example.com>\r\n")
        .read(b"250 Ok\r\n")
        .build();
    let mut session = open(mock).await;

    session.mail("sender@example.com", Some(500)).await.unwrap();
    let err = session.mail("sender@example.com", None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    session.close().await.unwrap();
}

#[tokio::test]
async fn rejected_mail_returns_to_idle() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(b"250 mx.example.com\r\n")
        .write(b"MAIL FROM:<spammer@example.com>\r\n")
        .read(b"550 5.7.1 rejected\r\n")
        .build();
    let mut session = open(mock).await;

    let err = session.mail("spammer@example.com", None).await.unwrap_err();
    assert_eq!(err.code(), Some(550));
    assert!(err.is_permanent());
    assert_eq!(session.phase(), TransactionPhase::Idle);

    session.close().await.unwrap();
}

#[tokio::test]
async fn rejected_message_returns_to_idle() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(b"250 mx.example.com\r\n")
        .write(b"MAIL FROM:<a@example.com>\r\n")
        .read(b"250 Ok\r\n")
        .write(b"RCPT TO:<b@example.com>\r\n")
        .read(b"250 Ok\r\n")
        .write(b"DATA\r\n")
        .read(b"354 go\r\n")
        .write(b"body\r\n")
        .write(b".\r\n")
        .read(b"452 4.3.1 insufficient storage\r\n")
        .build();
    let mut session = open(mock).await;

    session.mail("a@example.com", None).await.unwrap();
    session.rcpt("b@example.com").await.unwrap();
    let mut sink = session.data().await.unwrap();
    sink.write(b"body\r\n").await.unwrap();
    let err = sink.close().await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(session.phase(), TransactionPhase::Idle);

    session.close().await.unwrap();
}

#[tokio::test]
async fn reset_and_verify() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(b"250 mx.example.com\r\n")
        .write(b"VRFY postmaster@example.com\r\n")
        .read(b"250 <postmaster@example.com>\r\n")
        .write(b"VRFY nobody@example.com\r\n")
        .read(b"550 5.1.1 unknown\r\n")
        .write(b"RSET\r\n")
        .read(b"250 Ok\r\n")
        .build();
    let mut session = open(mock).await;

    session.verify("postmaster@example.com").await.unwrap();
    let err = session.verify("nobody@example.com").await.unwrap_err();
    assert!(err.is_permanent());
    session.reset().await.unwrap();
    assert_eq!(session.phase(), TransactionPhase::Idle);

    session.close().await.unwrap();
}

#[tokio::test]
async fn quit_closes_even_on_error() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"QUIT\r\n")
        .read(b"500 what\r\n")
        .build();
    let mut session = open(mock).await;

    assert_eq!(session.quit().await.unwrap_err().code(), Some(500));
    assert!(session.is_closed());
    session.quit().await.unwrap();
}

#[tokio::test]
async fn auth_plain() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
        .read(b"235 2.7.0 Authentication successful\r\n")
        .build();
    let mut session = open_local(mock).await;

    let mut plain = Plain::new("", "user", "pass", "localhost");
    session.authenticate(&mut plain).await.unwrap();
    assert!(!session.is_closed());

    session.close().await.unwrap();
}

#[tokio::test]
async fn auth_login() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .write(b"AUTH LOGIN\r\n")
        .read(b"334 VXNlcm5hbWU6\r\n")
        .write(b"dXNlcg==\r\n")
        .read(b"334 UGFzc3dvcmQ6\r\n")
        .write(b"cGFzcw==\r\n")
        .read(b"235 2.7.0 Authentication successful\r\n")
        .build();
    let mut session = open(mock).await;

    let mut login = Login::new("user", "pass");
    session.authenticate(&mut login).await.unwrap();

    session.close().await.unwrap();
}

#[tokio::test]
async fn auth_failure_terminates_session() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
        .read(b"535 5.7.8 Authentication credentials invalid\r\n")
        .write(b"QUIT\r\n")
        .read(b"221 Bye\r\n")
        .build();
    let mut session = open_local(mock).await;

    let mut plain = Plain::new("", "user", "pass", "localhost");
    let err = session.authenticate(&mut plain).await.unwrap_err();
    assert_eq!(err.code(), Some(535));
    assert!(session.is_closed());
}

#[tokio::test]
async fn auth_unexpected_challenge_is_cancelled() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
        .read(b"334 \r\n")
        .write(b"*\r\n")
        .read(b"501 5.7.0 Authentication cancelled\r\n")
        .write(b"QUIT\r\n")
        .read(b"221 Bye\r\n")
        .build();
    let mut session = open_local(mock).await;

    let mut plain = Plain::new("", "user", "pass", "localhost");
    let err = session.authenticate(&mut plain).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(session.is_closed());
}

/// Mechanism that checks the server's final message, as mutual
/// authentication schemes do.
struct ServerSignature {
    expected: &'static [u8],
}

impl Mechanism for ServerSignature {
    fn start(&mut self, _server: &ServerInfo) -> mailpost_smtp::Result<(String, Option<Vec<u8>>)> {
        Ok(("X-SIGNED".to_string(), Some(b"client".to_vec())))
    }

    fn next(&mut self, challenge: &[u8], _more: bool) -> mailpost_smtp::Result<Option<Vec<u8>>> {
        if challenge == self.expected {
            Ok(None)
        } else {
            Err(Error::Auth("server signature mismatch".into()))
        }
    }
}

#[tokio::test]
async fn auth_final_check_failure_is_cancelled() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .write(b"AUTH X-SIGNED Y2xpZW50\r\n")
        .read(b"235 forged\r\n")
        .write(b"*\r\n")
        .read(b"501 5.7.0 Authentication cancelled\r\n")
        .write(b"QUIT\r\n")
        .read(b"221 Bye\r\n")
        .build();
    let mut session = open(mock).await;

    let mut mechanism = ServerSignature { expected: b"signed" };
    let err = session.authenticate(&mut mechanism).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(session.is_closed());
}

#[tokio::test]
async fn auth_refused_by_mechanism_sends_nothing() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .write(b"QUIT\r\n")
        .read(b"221 Bye\r\n")
        .build();
    // Not encrypted and not local: PLAIN refuses to start.
    let mut session = open(mock).await;

    let mut plain = Plain::new("", "user", "pass", "mx.example.com");
    let err = session.authenticate(&mut plain).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(session.is_closed());
}

#[tokio::test]
async fn start_tls_requires_advertisement() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .build();
    let mut session = open(mock).await;

    let err = session
        .start_tls(&TlsConfig::new("mx.example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
    assert!(!session.is_tls());
    assert!(session.tls_connection_state().is_none());

    session.close().await.unwrap();
}

#[tokio::test]
async fn required_tls_without_starttls_fails() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .build();
    let mut session = open(mock).await.with_security(Security::Required);

    let err = session.start_session().await.unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));

    session.close().await.unwrap();
}

#[tokio::test]
async fn start_session_authenticates_when_offered() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_REPLY)
        .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
        .read(b"235 Ok\r\n")
        .build();
    let mut session = open_local(mock)
        .await
        .with_mechanism(Box::new(Plain::new("", "user", "pass", "localhost")));

    session.start_session().await.unwrap();
    assert!(!session.is_tls());

    session.close().await.unwrap();
}

#[tokio::test]
async fn start_session_skips_auth_when_not_offered() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(b"250 mx.example.com\r\n")
        .build();
    let mut session = open_local(mock)
        .await
        .with_mechanism(Box::new(Plain::new("", "user", "pass", "localhost")));

    session.start_session().await.unwrap();

    session.close().await.unwrap();
}

#[tokio::test]
async fn smtputf8_requested_for_non_ascii_sender() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(b"250-mx.example.com\r\n250 SMTPUTF8\r\n")
        .write("MAIL FROM:<jörg@example.com> SMTPUTF8\r\n".as_bytes())
        .read(b"250 Ok\r\n")
        .write(b"RCPT TO:<user@example.com>\r\n")
        .read(b"250 Ok\r\n")
        .build();
    let mut session = open(mock).await;

    let message = Message::new(
        EmailAddress::new("jörg@example.com"),
        vec![EmailAddress::new("user@example.com")],
        "Grüße",
        "",
        "Hallo",
    );
    session.mail_and_rcpt(&message).await.unwrap();
    assert_eq!(session.phase(), TransactionPhase::RecipientsAccepted);

    session.close().await.unwrap();
}

#[tokio::test]
async fn idna_domain_rewritten_without_smtputf8() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(b"250 mx.example.com\r\n")
        .write(b"MAIL FROM:<sender@example.com>\r\n")
        .read(b"250 Ok\r\n")
        .write(b"RCPT TO:<info@xn--bcher-kva.example>\r\n")
        .read(b"250 Ok\r\n")
        .build();
    let mut session = open(mock).await;

    let mut message = Message::new(
        EmailAddress::new("sender@example.com"),
        vec![EmailAddress::new("ignored@example.com")],
        "Books",
        "",
        "Hello",
    );
    message.recipient = Some("info@bücher.example".to_string());
    session.mail_and_rcpt(&message).await.unwrap();

    session.close().await.unwrap();
}

#[tokio::test]
async fn non_ascii_local_part_without_smtputf8_is_permanent() {
    let mock = Builder::new()
        .read(GREETING)
        .write(EHLO)
        .read(b"250 mx.example.com\r\n")
        .build();
    let mut session = open(mock).await;

    let message = Message::new(
        EmailAddress::new("jörg@example.com"),
        vec![EmailAddress::new("user@example.com")],
        "Hi",
        "",
        "Hallo",
    );
    let err = session.mail_and_rcpt(&message).await.unwrap_err();
    assert!(matches!(err, Error::Addressing(_)));
    assert!(err.is_permanent());
    assert_eq!(session.phase(), TransactionPhase::Idle);

    session.close().await.unwrap();
}

#[tokio::test]
async fn send_single_validates_before_io() {
    let mock = Builder::new().read(GREETING).build();
    let mut session = open(mock).await;

    let mut no_sender = Message::new(
        EmailAddress::new(""),
        vec![EmailAddress::new("user@example.com")],
        "Hi",
        "",
        "text",
    );
    assert!(matches!(
        session.send_single(&mut no_sender).await,
        Err(Error::Validation(_))
    ));

    let mut no_recipients = Message::new(
        EmailAddress::new("sender@example.com"),
        Vec::new(),
        "Hi",
        "",
        "text",
    );
    assert!(matches!(
        session.send_single(&mut no_recipients).await,
        Err(Error::Validation(_))
    ));
    assert!(no_recipients.message_id.is_none());

    session.close().await.unwrap();
}

#[tokio::test]
async fn reads_time_out() {
    let (client, mut server) = tokio::io::duplex(4096);
    server.write_all(GREETING).await.unwrap();

    let config = SessionConfig::builder("mx.example.com")
        .io_timeout(Duration::from_millis(50))
        .build();
    let mut session = Session::with_config(SmtpStream::plain(client), &config)
        .await
        .unwrap();

    let err = session.verify("user@example.com").await.unwrap_err();
    assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(50)));

    session.close().await.unwrap();
    drop(server);
}
