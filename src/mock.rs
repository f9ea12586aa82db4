//! A scripted mock socket for testing commands and whole mail transactions
//!
//! The conversation is a list of `(Actor, ActionData)` pairs which have to
//! happen in exactly that order. Client actions are compared against what
//! the client flushed, server actions are handed out when the client reads.
//!
//! By default the socket randomly returns `NotReady` (waking the task a
//! bit later from a helper thread) and reads/writes random amounts of bytes,
//! so code using it has to handle suspension at any point. Use
//! `MockSocket::new_always_ready` to get a socket which never returns
//! `NotReady` while it has something to do.
use std::cmp::min;
use std::io::{self as std_io, Read, Write};
use std::mem;
use std::thread;
use std::time::Duration;

use rand::{random, thread_rng, Rng};

use bytes::BytesMut;
use futures::sync::mpsc;
use futures::task::{self, Task};
use futures::{future, Async, Future, Poll, Stream};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::Connection;
use crate::io::{Io, MockStream, Socket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Server,
    Client,
}

#[derive(Debug, Clone)]
pub enum ActionData {
    /// lines without the trailing `"\r\n"`
    Lines(Vec<&'static str>),
    Blob(Vec<u8>),
}

impl ActionData {
    fn len(&self) -> usize {
        match *self {
            ActionData::Blob(ref blob) => blob.len(),
            ActionData::Lines(ref lines) => {
                //MAGIC_NUM: +2 = "\r\n".len()
                lines.iter().map(|ln| ln.len() + 2).sum()
            }
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        match *self {
            ActionData::Blob(ref blob) => blob.clone(),
            ActionData::Lines(ref lines) => {
                let mut out = Vec::with_capacity(self.len());
                for line in lines {
                    out.extend_from_slice(line.as_bytes());
                    out.extend_from_slice(b"\r\n");
                }
                out
            }
        }
    }

    fn assert_same_start(&self, other: &[u8]) {
        let expected = self.to_bytes();
        let use_len = min(expected.len(), other.len());
        assert!(
            expected[..use_len] == other[..use_len],
            "unexpected data from client:\n  expected: {:?}\n  got:      {:?}",
            String::from_utf8_lossy(&expected),
            String::from_utf8_lossy(other)
        );
    }
}

type Waker = mpsc::UnboundedSender<Task>;

#[derive(Debug)]
enum State {
    ServerIsWorking { to_be_read: BytesMut },
    ClientIsWorking { expected: ActionData, input: BytesMut },
    NeedNewAction { buffer: BytesMut },
    ShutdownOrPoison,
}

/// the mock socket, see module level documentation
#[derive(Debug)]
pub struct MockSocket {
    conversation: Vec<(Actor, ActionData)>,
    fake_secure: bool,
    inject_not_ready: bool,
    allow_early_drop: bool,
    waker: Waker,
    state: State,
}

impl MockSocket {
    /// creates a mock socket which randomly returns `NotReady`
    pub fn new(conversation: Vec<(Actor, ActionData)>) -> Self {
        MockSocket::_new(conversation, true)
    }

    /// creates a mock socket which never returns `NotReady` while the
    /// next action of the conversation can be performed
    pub fn new_always_ready(conversation: Vec<(Actor, ActionData)>) -> Self {
        MockSocket::_new(conversation, false)
    }

    fn _new(conversation: Vec<(Actor, ActionData)>, inject_not_ready: bool) -> Self {
        let mut conversation = conversation;
        //queue => stack
        conversation.reverse();

        MockSocket {
            conversation,
            fake_secure: false,
            inject_not_ready,
            allow_early_drop: false,
            waker: delayed_waker(),
            state: State::NeedNewAction {
                buffer: BytesMut::new(),
            },
        }
    }

    /// do not assert that the whole conversation happened when dropped
    ///
    /// (e.g. to test aborting a connection)
    pub fn allow_early_drop(mut self) -> Self {
        self.allow_early_drop = true;
        self
    }

    /// the number of actions which did not yet start
    pub fn remaining_actions(&self) -> usize {
        self.conversation.len()
    }

    fn schedule_delayed_wake(&mut self) {
        // the waker thread only ends once the socket is dropped
        let _ = self.waker.unbounded_send(task::current());
    }

    fn maybe_inject_not_ready(&mut self) -> Poll<(), std_io::Error> {
        // 1/16 chance to be not ready
        if self.inject_not_ready && random::<u8>() >= 240 {
            self.schedule_delayed_wake();
            Ok(Async::NotReady)
        } else {
            Ok(Async::Ready(()))
        }
    }

    fn prepare_next(&mut self, mut buffer: BytesMut) -> State {
        let (actor, data) = self
            .conversation
            .pop()
            .expect("[BUG] prepare next on empty conversation");

        match actor {
            Actor::Server => {
                assert!(buffer.is_empty(), "client wrote more than expected");
                buffer.extend_from_slice(&data.to_bytes());
                State::ServerIsWorking { to_be_read: buffer }
            }
            Actor::Client => State::ClientIsWorking {
                expected: data,
                input: buffer,
            },
        }
    }
}

impl Drop for MockSocket {
    fn drop(&mut self) {
        if thread::panicking() || self.allow_early_drop {
            return;
        }

        let pending_server_data = match self.state {
            State::ServerIsWorking { .. } => true,
            _ => false,
        };
        assert!(!pending_server_data, "client did not read the whole server response");
        assert!(
            self.conversation.is_empty(),
            "premature cancellation of conversation ({} actions left)",
            self.conversation.len()
        );
    }
}

impl MockStream for MockSocket {
    fn is_secure(&self) -> bool {
        self.fake_secure
    }

    fn set_is_secure(&mut self, secure: bool) {
        self.fake_secure = secure;
    }
}

impl From<MockSocket> for Socket {
    fn from(mock: MockSocket) -> Self {
        Socket::Mock(Box::new(mock))
    }
}

impl From<MockSocket> for Io {
    fn from(mock: MockSocket) -> Self {
        Io::from(Socket::from(mock))
    }
}

impl From<MockSocket> for Connection {
    fn from(mock: MockSocket) -> Self {
        Connection::from(Io::from(mock))
    }
}

macro_rules! try_ready_or_would_block {
    ($expr:expr) => {{
        match $expr {
            Ok(Async::Ready(t)) => t,
            Ok(Async::NotReady) => {
                return Err(std_io::Error::new(
                    std_io::ErrorKind::WouldBlock,
                    "Async::NotReady",
                ));
            }
            Err(err) => {
                return Err(err);
            }
        }
    }};
}

impl Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, std_io::Error> {
        Ok(try_ready_or_would_block!(self.poll_read(buf)))
    }
}

impl Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> Result<usize, std_io::Error> {
        Ok(try_ready_or_would_block!(self.poll_write(buf)))
    }

    fn flush(&mut self) -> Result<(), std_io::Error> {
        Ok(try_ready_or_would_block!(self.poll_flush()))
    }
}

impl AsyncRead for MockSocket {
    fn poll_read(&mut self, buf: &mut [u8]) -> Poll<usize, std_io::Error> {
        try_ready!(self.maybe_inject_not_ready());
        let state = mem::replace(&mut self.state, State::ShutdownOrPoison);
        match state {
            State::ShutdownOrPoison => panic!("tried reading from shutdown/poisoned stream"),
            State::ClientIsWorking { .. } => {
                panic!("tried to read from socket while it should only write to it")
            }
            State::NeedNewAction { buffer } => {
                if self.conversation.is_empty() {
                    // the server closed the connection
                    self.state = State::NeedNewAction { buffer };
                    return Ok(Async::Ready(0));
                }

                self.state = self.prepare_next(buffer);
                let is_server_turn = match self.state {
                    State::ServerIsWorking { .. } => true,
                    _ => false,
                };

                if self.inject_not_ready || !is_server_turn {
                    self.schedule_delayed_wake();
                    Ok(Async::NotReady)
                } else {
                    self.poll_read(buf)
                }
            }
            State::ServerIsWorking { mut to_be_read } => {
                let should_write = self.random_amount(min(to_be_read.len(), buf.len()));

                buf[..should_write].copy_from_slice(&to_be_read[..should_write]);
                to_be_read.advance(should_write);

                if to_be_read.is_empty() {
                    self.state = State::NeedNewAction { buffer: to_be_read }
                } else {
                    self.state = State::ServerIsWorking { to_be_read }
                }
                Ok(Async::Ready(should_write))
            }
        }
    }
}

impl AsyncWrite for MockSocket {
    fn poll_write(&mut self, buf: &[u8]) -> Poll<usize, std_io::Error> {
        try_ready!(self.maybe_inject_not_ready());
        let state = mem::replace(&mut self.state, State::ShutdownOrPoison);
        match state {
            State::ShutdownOrPoison => panic!("tried writing to shutdown/poisoned stream"),
            State::ServerIsWorking { .. } => {
                panic!("tried to write to socket while it should only read from it")
            }
            State::NeedNewAction { buffer } => {
                assert!(
                    !self.conversation.is_empty(),
                    "client wrote after the end of the conversation: {:?}",
                    String::from_utf8_lossy(buf)
                );
                self.state = self.prepare_next(buffer);
                if self.inject_not_ready {
                    self.schedule_delayed_wake();
                    Ok(Async::NotReady)
                } else {
                    self.poll_write(buf)
                }
            }
            State::ClientIsWorking {
                expected,
                mut input,
            } => {
                let amount = self.random_amount(buf.len());
                input.extend_from_slice(&buf[..amount]);

                self.state = State::ClientIsWorking { expected, input };
                Ok(Async::Ready(amount))
            }
        }
    }

    fn poll_flush(&mut self) -> Poll<(), std_io::Error> {
        try_ready!(self.maybe_inject_not_ready());
        let state = mem::replace(&mut self.state, State::ShutdownOrPoison);
        match state {
            State::ShutdownOrPoison => panic!("tried flushing shutdown/poisoned stream"),
            State::ServerIsWorking { .. } => {
                panic!("tried to flush socket while it should only read from it")
            }
            // nothing was written, so there is nothing to flush
            state @ State::NeedNewAction { .. } => {
                self.state = state;
                Ok(Async::Ready(()))
            }
            State::ClientIsWorking {
                expected,
                mut input,
            } => {
                expected.assert_same_start(&input);
                let expected_len = expected.len();
                if input.len() >= expected_len {
                    input.advance(expected_len);
                    self.state = State::NeedNewAction { buffer: input };
                } else {
                    self.state = State::ClientIsWorking { expected, input };
                }
                Ok(Async::Ready(()))
            }
        }
    }

    fn shutdown(&mut self) -> Poll<(), std_io::Error> {
        // shutdown implies flush, so we flush
        try_ready!(self.poll_flush());
        match self.state {
            State::ShutdownOrPoison | State::NeedNewAction { .. } => (),
            _ => panic!("unexpected state when shutting down: {:?}", self.state),
        }
        self.state = State::ShutdownOrPoison;
        Ok(Async::Ready(()))
    }
}

impl MockSocket {
    fn random_amount(&self, max_inclusive: usize) -> usize {
        if max_inclusive == 0 {
            return 0;
        }
        // make it more "likely" to transfer everything at once
        min(
            max_inclusive,
            thread_rng().gen_range(1, max_inclusive + 1 + 16),
        )
    }
}

fn delayed_waker() -> Waker {
    let (tx, rx) = mpsc::unbounded();
    thread::spawn(move || {
        let pipe = rx.for_each(|task: Task| {
            //sleep between ~ 0ms - 4ms
            let nanos = random::<u32>() / 1000;
            thread::sleep(Duration::new(0, nanos));

            task.notify();
            future::ok::<(), ()>(())
        });

        let _ = pipe.wait();
    });

    tx
}
