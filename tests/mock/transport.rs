use std::cell::{Cell, RefCell};
use std::io::{self as std_io, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use futures::Future;
use rand::{thread_rng, Rng};
use tokio::runtime::current_thread::Runtime;
use tokio::timer::Delay;

use tokio_smtp_transmit::command::Noop;
use tokio_smtp_transmit::error::GeneralError;
use tokio_smtp_transmit::io::Socket;
use tokio_smtp_transmit::mock::{ActionData, Actor, MockSocket};
use tokio_smtp_transmit::transmit::TransmitError;
use tokio_smtp_transmit::{
    BlockingTransport, Connection, ConnectionConfig, DefaultTlsSetup, SendOutcome, SmtpTransport,
};

use self::ActionData::*;
use self::Actor::*;

use super::{envelope, init_logging, mock, Stalled};

const RECIPIENTS: [&str; 5] = ["r0@x.com", "r1@x.com", "r2@x.com", "r3@x.com", "r4@x.com"];
const RCPT_LINES: [&str; 5] = [
    "RCPT TO:<r0@x.com>",
    "RCPT TO:<r1@x.com>",
    "RCPT TO:<r2@x.com>",
    "RCPT TO:<r3@x.com>",
    "RCPT TO:<r4@x.com>",
];

fn config() -> ConnectionConfig<Noop, DefaultTlsSetup> {
    ConnectionConfig::builder_local_unencrypted().build()
}

/// how a send attempt ended, comparable between the async and blocking facade
#[derive(Debug, PartialEq)]
enum Summary {
    Sent { failed: Vec<String> },
    Rejected { failed: Vec<String> },
}

fn failed_of(outcome: &SendOutcome) -> Vec<String> {
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

/// conversation for the given accept (`true`) / reject (`false`) sequence
fn conversation(accepts: &[bool]) -> Vec<(Actor, ActionData)> {
    let mut conv = vec![
        (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
        (Server, Lines(vec!["250 Ok"])),
    ];

    for (idx, accept) in accepts.iter().enumerate() {
        conv.push((Client, Lines(vec![RCPT_LINES[idx]])));
        let answer = if *accept { "250 Ok" } else { "550 no such user" };
        conv.push((Server, Lines(vec![answer])));
    }

    if accepts.iter().any(|accept| *accept) {
        conv.push((Client, Lines(vec!["DATA"])));
        conv.push((Server, Lines(vec!["354 go ahead"])));
        conv.push((Client, Lines(vec!["hy there", "."])));
        conv.push((Server, Lines(vec!["250 queued"])));
    } else {
        conv.push((Client, Lines(vec!["RSET"])));
        conv.push((Server, Lines(vec!["250 Ok"])));
    }

    conv.push((Client, Lines(vec!["QUIT"])));
    conv.push((Server, Lines(vec!["221 bye"])));
    conv
}

fn send_async(accepts: &[bool]) -> Summary {
    let mut transport = SmtpTransport::new(config());
    transport.set_connection(mock(conversation(accepts)));

    let env = envelope("a@x.com", &RECIPIENTS[..accepts.len()]);
    let result = transport.begin_send_mail(env).wait();
    let summary = match transport.end_send_mail(result) {
        Ok((mut body, outcome)) => {
            body.write_all(b"hy there\r\n").unwrap();
            let result = transport.begin_finish_body(body).wait();
            let response = transport.end_body(result).unwrap();
            assert_eq!(response.code().as_u16(), 250);
            Summary::Sent {
                failed: failed_of(&outcome),
            }
        }
        Err(GeneralError::Transmit(TransmitError::Recipients(err))) => Summary::Rejected {
            failed: failed_of(&SendOutcome::TotalFailure(err.into_failures())),
        },
        Err(other) => panic!("unexpected error: {}", other),
    };

    assert!(transport.is_connected());
    transport.release_connection().wait().unwrap();
    assert!(!transport.is_connected());
    summary
}

fn send_blocking(accepts: &[bool]) -> Summary {
    let mut transport = BlockingTransport::new(config()).unwrap();
    transport.set_connection(mock(conversation(accepts)));

    let env = envelope("a@x.com", &RECIPIENTS[..accepts.len()]);
    let summary = match transport.send_mail_with_body(env, b"hy there\r\n") {
        Ok((response, outcome)) => {
            assert_eq!(response.code().as_u16(), 250);
            Summary::Sent {
                failed: failed_of(&outcome),
            }
        }
        Err(GeneralError::Transmit(TransmitError::Recipients(err))) => Summary::Rejected {
            failed: failed_of(&SendOutcome::TotalFailure(err.into_failures())),
        },
        Err(other) => panic!("unexpected error: {}", other),
    };

    transport.release_connection().unwrap();
    summary
}

#[test]
fn async_and_blocking_agree() {
    init_logging();
    let mut rng = thread_rng();
    for _ in 0..20 {
        let count = rng.gen_range(1, RECIPIENTS.len() + 1);
        let accepts = (0..count).map(|_| rng.gen::<bool>()).collect::<Vec<_>>();

        let async_summary = send_async(&accepts);
        let blocking_summary = send_blocking(&accepts);
        assert_eq!(async_summary, blocking_summary, "accept sequence: {:?}", accepts);

        let expected_failed = accepts
            .iter()
            .enumerate()
            .filter(|(_, accept)| !**accept)
            .map(|(idx, _)| RECIPIENTS[idx].to_owned())
            .collect::<Vec<_>>();

        let expected = if expected_failed.len() == count {
            Summary::Rejected {
                failed: expected_failed,
            }
        } else {
            Summary::Sent {
                failed: expected_failed,
            }
        };
        assert_eq!(async_summary, expected, "accept sequence: {:?}", accepts);
    }
}

#[test]
fn callback_is_called_exactly_once() {
    let calls = Rc::new(Cell::new(0));
    let connection = Rc::new(RefCell::new(None::<Connection>));

    let mut transport = SmtpTransport::new(config());
    transport.set_connection(mock(vec![
        (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
        (Server, Lines(vec!["250 Ok"])),
        (Client, Lines(vec!["RCPT TO:<b@x.com>"])),
        (Server, Lines(vec!["550 no such user"])),
        (Client, Lines(vec!["RSET"])),
        (Server, Lines(vec!["250 Ok"])),
    ]));

    let fut = {
        let calls = calls.clone();
        let connection = connection.clone();
        transport.begin_send_mail_with_callback(envelope("a@x.com", &["b@x.com"]), move |result| {
            calls.set(calls.get() + 1);
            match result {
                Ok(Err((con, TransmitError::Recipients(err)))) => {
                    assert!(err.is_fatal());
                    *connection.borrow_mut() = Some(con);
                }
                Ok(Err((_con, other))) => panic!("unexpected transmit error: {:?}", other),
                Ok(Ok(_)) => panic!("the only recipient was rejected but DATA was send"),
                Err(err) => panic!("unexpected I/O error: {}", err),
            }
        })
    };

    fut.wait().unwrap();
    assert_eq!(calls.get(), 1);
    assert!(connection.borrow().is_some());
}

#[test]
fn abort_resolves_with_connection_aborted() {
    init_logging();
    let calls = Rc::new(Cell::new(0));

    let mut transport = SmtpTransport::new(config());
    let socket = MockSocket::new(vec![
        (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
        (Server, Lines(vec!["250 Ok"])),
    ])
    .allow_early_drop();
    transport.set_connection(Connection::from(socket));

    let fut = {
        let calls = calls.clone();
        transport.begin_send_mail_with_callback(envelope("a@x.com", &["b@x.com"]), move |result| {
            calls.set(calls.get() + 1);
            match result {
                Err(err) => assert_eq!(err.kind(), std_io::ErrorKind::ConnectionAborted),
                Ok(_) => panic!("aborted send resolved successfully"),
            }
        })
    };

    transport.abort();
    fut.wait().unwrap();
    assert_eq!(calls.get(), 1);
    assert!(!transport.is_connected());
}

#[test]
fn abort_while_waiting_for_the_server() {
    init_logging();
    let calls = Rc::new(Cell::new(0));
    let aborted = Rc::new(Cell::new(false));

    let mut transport = SmtpTransport::new(config());
    transport.set_connection(Connection::from(Socket::Mock(Box::new(Stalled))));

    let fut = {
        let calls = calls.clone();
        let aborted = aborted.clone();
        transport.begin_send_mail_with_callback(envelope("a@x.com", &["b@x.com"]), move |result| {
            calls.set(calls.get() + 1);
            match result {
                Err(err) => aborted.set(err.kind() == std_io::ErrorKind::ConnectionAborted),
                Ok(_) => panic!("aborted send resolved successfully"),
            }
        })
    };

    let mut runtime = Runtime::new().unwrap();
    runtime.spawn(fut);

    // MAIL is written, the send is suspended waiting for the response
    let wait = Delay::new(Instant::now() + Duration::from_millis(50));
    runtime.block_on(wait).unwrap();
    assert_eq!(calls.get(), 0);

    transport.abort();
    runtime.run().unwrap();

    assert_eq!(calls.get(), 1);
    assert!(aborted.get());
    assert!(!transport.is_connected());
}

#[test]
fn release_without_connection_does_nothing() {
    let mut transport = SmtpTransport::new(config());
    transport.release_connection().wait().unwrap();

    let mut blocking = BlockingTransport::new(config()).unwrap();
    blocking.release_connection().unwrap();
    blocking.abort();
}

#[test]
#[should_panic]
fn sending_without_connection_panics() {
    let mut transport = BlockingTransport::new(config()).unwrap();
    let _ = transport.send_mail(envelope("a@x.com", &["b@x.com"]));
}

#[test]
fn failed_transaction_gives_connection_back() {
    let mut transport = BlockingTransport::new(config()).unwrap();
    transport.set_connection(mock(vec![
        (Client, Lines(vec!["MAIL FROM:<a@x.com>"])),
        (Server, Lines(vec!["553 sender not allowed"])),
        (Client, Lines(vec!["QUIT"])),
        (Server, Lines(vec!["221 bye"])),
    ]));

    match transport.send_mail(envelope("a@x.com", &["b@x.com"])) {
        Err(GeneralError::Transmit(TransmitError::Sender(_))) => (),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("sender was rejected but DATA was send"),
    }

    assert!(transport.is_connected());
    transport.release_connection().unwrap();
}
