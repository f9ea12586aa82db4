use std::io as std_io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{future, Async, Future, Poll};
use tokio::io::{AsyncRead, AsyncWrite};
use vec1::Vec1;

use tokio_smtp_transmit::body::FLUSH_THRESHOLD;
use tokio_smtp_transmit::io::{MockStream, Socket};
use tokio_smtp_transmit::mock::{ActionData, Actor};
use tokio_smtp_transmit::transmit::{transmit, OnError, ResetFailed, TransmitError, TransmitResult};
use tokio_smtp_transmit::{
    Connection, DeliveryNotification, EncodingRequirement, Envelope, Io, MailAddress, SendOutcome,
};

use self::ActionData::*;
use self::Actor::*;

use super::{envelope, mock_with_caps, Stalled};

fn run(con: Connection, envelope: Envelope, on_error: OnError) -> TransmitResult {
    transmit(con, envelope, on_error)
        .wait()
        .expect("unexpected I/O error")
}

fn recipients_of(outcome: &SendOutcome) -> Vec<String> {
    outcome
        .failures()
        .map(|failures| {
            failures
                .iter()
                .map(|failure| failure.recipient().as_str().to_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn partial_failure_conversation() -> Vec<(Actor, ActionData)> {
    vec![
        (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
        (Server, Lines(vec!["250 Ok"])),
        (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
        (Server, Lines(vec!["250 Ok"])),
        (Client, Lines(vec!["RCPT TO:<c@x.com>"])),
        (Server, Lines(vec!["550 no such user"])),
        (Client, Lines(vec!["RCPT TO:<d@x.com>"])),
        (Server, Lines(vec!["250 Ok"])),
        (Client, Lines(vec!["DATA"])),
        (Server, Lines(vec!["354 go ahead"])),
        (Client, Lines(vec!["hy there", "..dot", "."])),
        (Server, Lines(vec!["250 queued"])),
    ]
}

fn check_partial_failure(always_ready: bool) {
    let con = mock_with_caps(&[], partial_failure_conversation(), always_ready);
    let env = envelope("a@x.com", &["b@x.com", "c@x.com", "d@x.com"]);

    let (body, outcome) = match run(con, env, OnError::StopAndReset) {
        Ok(ok) => ok,
        Err((_con, err)) => panic!("unexpected transmit error: {}", err),
    };

    match &outcome {
        SendOutcome::PartialFailure(failures) => {
            assert_eq!(failures.len(), 1);
            let failure = failures.iter().next().unwrap();
            assert_eq!(failure.recipient().as_str(), "c@x.com");
            assert_eq!(failure.code(), 550);
            assert_eq!(failure.text(), "no such user");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let err = outcome.into_error().unwrap();
    assert!(!err.is_fatal());

    let (_con, result) = body.send_all("hy there\r\n.dot\r\n").wait().unwrap();
    assert_eq!(result.unwrap().code().as_u16(), 250);
}

#[test]
fn partial_failure_returns_body_and_failures() {
    check_partial_failure(true);
}

#[test]
fn partial_failure_with_random_suspension() {
    for _ in 0..8 {
        check_partial_failure(false);
    }
}

#[test]
fn all_accepted_is_success() {
    let con = mock_with_caps(
        &[],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["DATA"])),
            (Server, Lines(vec!["354 go ahead"])),
            (Client, Lines(vec!["body", "."])),
            (Server, Lines(vec!["250 queued"])),
        ],
        false,
    );

    let (body, outcome) = run(con, envelope("a@x.com", &["b@x.com"]), OnError::Stop)
        .map_err(|(_, err)| err)
        .unwrap();

    assert_eq!(outcome, SendOutcome::Success);
    // no trailing "\r\n", it is added when finishing
    let (_con, result) = body.send_all("body").wait().unwrap();
    assert!(result.is_ok());
}

#[test]
fn total_failure_resets_and_does_not_send_data() {
    let con = mock_with_caps(
        &[],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
            (Server, Lines(vec!["550 no such user"])),
            (Client, Lines(vec!["RCPT TO:<c@x.com>"])),
            (Server, Lines(vec!["450 mailbox busy"])),
            (Client, Lines(vec!["RSET"])),
            (Server, Lines(vec!["250 Ok"])),
        ],
        false,
    );

    let env = envelope("a@x.com", &["b@x.com", "c@x.com"]);
    match run(con, env, OnError::StopAndReset) {
        Err((_con, TransmitError::Recipients(err))) => {
            assert!(err.is_fatal());
            assert!(err.single().is_none());
            let codes = err
                .failures()
                .iter()
                .map(|failure| failure.code())
                .collect::<Vec<_>>();
            assert_eq!(codes, vec![550, 450]);
        }
        Err((_con, other)) => panic!("unexpected transmit error: {:?}", other),
        Ok(_) => panic!("all recipients were rejected but DATA was send"),
    }
}

#[test]
fn failing_reset_keeps_recipient_rejections() {
    let con = mock_with_caps(
        &[],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
            (Server, Lines(vec!["550 no such user"])),
            (Client, Lines(vec!["RSET"])),
            (Server, Lines(vec!["421 closing channel"])),
        ],
        false,
    );

    let env = envelope("a@x.com", &["b@x.com"]);
    let err = match transmit(con, env, OnError::StopAndReset).wait() {
        Err(err) => err,
        Ok(_) => panic!("RSET was answered with 421 but the transmission succeeded"),
    };

    let reset_failed = ResetFailed::from_io_error(err).expect("rejection was lost");
    assert_eq!(reset_failed.cause().kind(), std_io::ErrorKind::Other);
    match reset_failed.transmit_error() {
        TransmitError::Recipients(rejected) => {
            assert!(rejected.is_fatal());
            let failure = rejected.single().unwrap();
            assert_eq!(failure.recipient().as_str(), "b@x.com");
            assert_eq!(failure.code(), 550);
        }
        other => panic!("unexpected transmit error: {:?}", other),
    }
}

#[test]
fn failing_reset_after_rejected_data_keeps_rejection() {
    let con = mock_with_caps(
        &[],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["DATA"])),
            (Server, Lines(vec!["554 no valid recipients"])),
            (Client, Lines(vec!["RSET"])),
            (Server, Lines(vec!["421 closing channel"])),
        ],
        true,
    );

    let env = envelope("a@x.com", &["b@x.com"]);
    let err = transmit(con, env, OnError::StopAndReset).wait().err().unwrap();
    let (error, _cause) = ResetFailed::from_io_error(err).unwrap().into_parts();
    match error {
        TransmitError::Data(err) => assert_eq!(err.response().unwrap().code().as_u16(), 554),
        other => panic!("unexpected transmit error: {:?}", other),
    }
}

#[test]
fn single_rejected_recipient_is_total_failure() {
    let con = mock_with_caps(
        &[],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
            (Server, Lines(vec!["550 no such user"])),
        ],
        true,
    );

    match run(con, envelope("a@x.com", &["b@x.com"]), OnError::Stop) {
        Err((_con, TransmitError::Recipients(err))) => {
            assert!(err.is_fatal());
            let single = err.single().unwrap();
            assert_eq!(single.recipient().as_str(), "b@x.com");
            assert_eq!(single.code(), 550);
        }
        Err((_con, other)) => panic!("unexpected transmit error: {:?}", other),
        Ok(_) => panic!("the only recipient was rejected but DATA was send"),
    }
}

#[test]
fn failures_are_in_submission_order() {
    let con = mock_with_caps(
        &[],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<e@x.com>"])),
            (Server, Lines(vec!["550 nope"])),
            (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<c@x.com>"])),
            (Server, Lines(vec!["551 not local"])),
            (Client, Lines(vec!["DATA"])),
            (Server, Lines(vec!["354 go ahead"])),
            (Client, Lines(vec!["."])),
            (Server, Lines(vec!["250 queued"])),
        ],
        false,
    );

    let env = envelope("a@x.com", &["e@x.com", "b@x.com", "c@x.com"]);
    let (body, outcome) = run(con, env, OnError::Stop).map_err(|(_, err)| err).unwrap();
    assert_eq!(recipients_of(&outcome), vec!["e@x.com", "c@x.com"]);

    let (_con, result) = body.finish().wait().unwrap();
    assert!(result.is_ok());
}

#[test]
fn rejected_sender_stops_without_reset() {
    let con = mock_with_caps(
        &[],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
            (Server, Lines(vec!["553 sender not allowed"])),
        ],
        false,
    );

    match run(con, envelope("a@x.com", &["b@x.com"]), OnError::StopAndReset) {
        Err((_con, TransmitError::Sender(err))) => {
            assert_eq!(err.response().unwrap().code().as_u16(), 553)
        }
        Err((_con, other)) => panic!("unexpected transmit error: {:?}", other),
        Ok(_) => panic!("sender was rejected but DATA was send"),
    }
}

#[test]
fn rejected_data_resets() {
    let con = mock_with_caps(
        &[],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["DATA"])),
            (Server, Lines(vec!["554 no thanks"])),
            (Client, Lines(vec!["RSET"])),
            (Server, Lines(vec!["250 Ok"])),
        ],
        true,
    );

    match run(con, envelope("a@x.com", &["b@x.com"]), OnError::StopAndReset) {
        Err((_con, TransmitError::Data(err))) => {
            assert_eq!(err.response().unwrap().code().as_u16(), 554)
        }
        Err((_con, other)) => panic!("unexpected transmit error: {:?}", other),
        Ok(_) => panic!("DATA was rejected but a body was returned"),
    }
}

#[test]
fn notify_is_send_if_dsn_is_supported() {
    let con = mock_with_caps(
        &["DSN"],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<b@x.com> NOTIFY=SUCCESS,FAILURE"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["DATA"])),
            (Server, Lines(vec!["354 go ahead"])),
            (Client, Lines(vec!["."])),
            (Server, Lines(vec!["250 queued"])),
        ],
        false,
    );

    let env = envelope("a@x.com", &["b@x.com"]).with_notify(DeliveryNotification::Notify {
        success: true,
        failure: true,
        delay: false,
    });
    assert!(env.delivery_notification_requested());

    let (body, _outcome) = run(con, env, OnError::Stop).map_err(|(_, err)| err).unwrap();
    let (_con, result) = body.finish().wait().unwrap();
    assert_eq!(result.unwrap().code().as_u16(), 250);
}

#[test]
fn notify_is_skipped_without_dsn() {
    let con = mock_with_caps(
        &[],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["DATA"])),
            (Server, Lines(vec!["354 go ahead"])),
            (Client, Lines(vec!["."])),
            (Server, Lines(vec!["250 queued"])),
        ],
        true,
    );

    let env = envelope("a@x.com", &["b@x.com"]).with_notify(DeliveryNotification::Never);
    let (body, _outcome) = run(con, env, OnError::Stop).map_err(|(_, err)| err).unwrap();
    let (_con, result) = body.finish().wait().unwrap();
    assert_eq!(result.unwrap().code().as_u16(), 250);
}

#[test]
fn smtputf8_and_8bitmime_parameters() {
    let con = mock_with_caps(
        &["SMTPUTF8", "8BITMIME"],
        vec![
            (Client, Lines(vec!["MAIL FROM:<a@x.com> SMTPUTF8 BODY=8BITMIME"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<jörg@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["DATA"])),
            (Server, Lines(vec!["354 go ahead"])),
            (Client, Lines(vec!["."])),
            (Server, Lines(vec!["250 queued"])),
        ],
        false,
    );

    let env = envelope("a@x.com", &["jörg@x.com"]).with_body_encoding(EncodingRequirement::Mime8bit);
    let (body, _outcome) = run(con, env, OnError::Stop).map_err(|(_, err)| err).unwrap();
    let (_con, result) = body.finish().wait().unwrap();
    assert_eq!(result.unwrap().code().as_u16(), 250);
}

#[test]
fn missing_smtputf8_fails_before_sending() {
    let con = mock_with_caps(&["8BITMIME"], vec![], true);

    let env = envelope("a@x.com", &["jörg@x.com"]);
    match run(con, env, OnError::StopAndReset) {
        Err((_con, TransmitError::MissingCapabilities(missing))) => {
            assert_eq!(missing.capabilities()[0].as_str(), "SMTPUTF8")
        }
        Err((_con, other)) => panic!("unexpected transmit error: {:?}", other),
        Ok(_) => panic!("envelope was send without SMTPUTF8"),
    }
}

#[test]
fn empty_reverse_path() {
    let con = mock_with_caps(
        &[],
        vec![
            (Client, Lines(vec!["MAIL FROM:<>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
            (Server, Lines(vec!["250 Ok"])),
            (Client, Lines(vec!["DATA"])),
            (Server, Lines(vec!["354 go ahead"])),
            (Client, Lines(vec!["bounce", "."])),
            (Server, Lines(vec!["250 queued"])),
        ],
        false,
    );

    let env = Envelope::without_reverse_path(Vec1::new(MailAddress::from("b@x.com")));
    let (body, outcome) = run(con, env, OnError::Stop).map_err(|(_, err)| err).unwrap();
    assert!(outcome.is_success());
    let (_con, result) = body.send_all(b"bounce\r\n").wait().unwrap();
    assert_eq!(result.unwrap().code().as_u16(), 250);
}

#[test]
fn timeout_aborts_transmission() {
    super::init_logging();
    let io = Io::from(Socket::Mock(Box::new(Stalled)));
    let con = Connection::from(io).with_timeout(Some(Duration::from_millis(50)));

    let mut runtime = tokio::runtime::current_thread::Runtime::new().unwrap();
    let result = runtime.block_on(transmit(
        con,
        envelope("a@x.com", &["b@x.com"]),
        OnError::StopAndReset,
    ));

    match result {
        Err(err) => assert_eq!(err.kind(), std_io::ErrorKind::TimedOut),
        Ok(_) => panic!("transmission did not time out"),
    }
}

/// a server which sends all its responses at once and counts the bytes it receives
#[derive(Debug)]
struct Counting {
    responses: Option<Vec<u8>>,
    received: Arc<AtomicUsize>,
}

impl std_io::Read for Counting {
    fn read(&mut self, buf: &mut [u8]) -> std_io::Result<usize> {
        match self.responses.take() {
            Some(responses) => {
                assert!(buf.len() >= responses.len());
                buf[..responses.len()].copy_from_slice(&responses);
                Ok(responses.len())
            }
            None => Err(std_io::Error::new(std_io::ErrorKind::WouldBlock, "no more responses")),
        }
    }
}

impl std_io::Write for Counting {
    fn write(&mut self, buf: &[u8]) -> std_io::Result<usize> {
        self.received.fetch_add(buf.len(), Ordering::SeqCst);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std_io::Result<()> {
        Ok(())
    }
}

impl AsyncRead for Counting {}

impl AsyncWrite for Counting {
    fn shutdown(&mut self) -> Poll<(), std_io::Error> {
        Ok(Async::Ready(()))
    }
}

impl MockStream for Counting {
    fn set_is_secure(&mut self, _secure: bool) {}
}

#[test]
fn large_body_is_flushed_while_writing() {
    super::init_logging();
    let received = Arc::new(AtomicUsize::new(0));
    let socket = Counting {
        responses: Some(b"250 Ok\r\n250 Ok\r\n354 go ahead\r\n".to_vec()),
        received: received.clone(),
    };
    let con = Connection::from(Io::from(Socket::Mock(Box::new(socket))));

    let env = envelope("a@x.com", &["b@x.com"]);
    let (mut body, _outcome) = run(con, env, OnError::Stop).map_err(|(_, err)| err).unwrap();
    let envelope_bytes = received.load(Ordering::SeqCst);

    let chunk = vec![b'a'; 4096];
    let total = 4 * FLUSH_THRESHOLD;
    let mut written = 0;
    future::poll_fn(|| -> Poll<(), std_io::Error> {
        while written < total {
            written += futures::try_ready!(body.poll_write(&chunk));
        }
        Ok(Async::Ready(()))
    })
    .wait()
    .unwrap();

    let body_bytes = received.load(Ordering::SeqCst) - envelope_bytes;
    assert!(body_bytes >= total - FLUSH_THRESHOLD - chunk.len());
}
