//! Writing the mail body after `DATA` was accepted
use std::io::{self as std_io, Write};

use futures::{Async, Future, Poll};
use tokio::io::AsyncWrite;

use crate::connection::{CmdFuture, Connection};
use crate::error::MissingCapabilities;
use crate::io::{DotStasher, Io};
use crate::{Cmd, EhloData, ExecFuture};

/// Writable mail body, available after the server accepted `DATA` (`354`)
///
/// All bytes written to it are dot-stashed and buffered in the connections
/// output buffer. They are send when polling `poll_flush` (`AsyncWrite`) or
/// when the body is finished. `std::io::Write::flush` does not touch the
/// socket, so the body can be written outside of a task context.
///
/// Writing through `AsyncWrite::poll_write` (e.g. with `tokio::io::copy`)
/// flushes the buffer to the socket each time it grows beyond
/// `FLUSH_THRESHOLD`, returning `NotReady` while the socket can not take more.
///
/// The body has to be finished with `finish` (or `send_all`), which writes
/// the end of data sequence and resolves to the connection and the servers
/// response to the mail.
/// buffered body bytes above which `poll_write` flushes before accepting more
pub const FLUSH_THRESHOLD: usize = 16 * 1024;

#[derive(Debug)]
pub struct BodyStream {
    con: Connection,
    stasher: DotStasher,
}

impl BodyStream {
    pub(crate) fn new(con: Connection) -> Self {
        BodyStream {
            con,
            stasher: DotStasher::new(),
        }
    }

    /// the connection the body is send over
    pub fn connection(&self) -> &Connection {
        &self.con
    }

    /// ends the body and resolves to the connection and the servers response
    ///
    /// The connections timeout applies to sending the remaining body and
    /// waiting for the response.
    pub fn finish(self) -> CmdFuture {
        let BodyStream { con, stasher } = self;
        con.send(EndOfData { stasher })
    }

    /// writes the whole buffer as body and then finishes it
    pub fn send_all<B>(mut self, body: B) -> CmdFuture
    where
        B: AsRef<[u8]>,
    {
        self.write_body(body.as_ref());
        self.finish()
    }

    fn write_body(&mut self, buf: &[u8]) {
        let BodyStream { con, stasher } = self;
        con.io_mut().write_dot_stashed(stasher, buf);
    }
}

impl Write for BodyStream {
    fn write(&mut self, buf: &[u8]) -> std_io::Result<usize> {
        self.write_body(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std_io::Result<()> {
        Ok(())
    }
}

impl AsyncWrite for BodyStream {
    fn poll_write(&mut self, buf: &[u8]) -> Poll<usize, std_io::Error> {
        if self.con.io_mut().pending_output() >= FLUSH_THRESHOLD {
            try_ready!(self.poll_flush());
        }
        self.write_body(buf);
        Ok(Async::Ready(buf.len()))
    }

    fn poll_flush(&mut self) -> Poll<(), std_io::Error> {
        self.con.io_mut().poll_flush()
    }

    /// only flushes, the body is ended with `finish`
    fn shutdown(&mut self) -> Poll<(), std_io::Error> {
        self.poll_flush()
    }
}

/// writes the end of data sequence and reads the response to the mail
struct EndOfData {
    stasher: DotStasher,
}

impl Cmd for EndOfData {
    fn check_cmd_availability(&self, _caps: Option<&EhloData>) -> Result<(), MissingCapabilities> {
        Ok(())
    }

    fn exec(self, mut io: Io) -> ExecFuture {
        let EndOfData { mut stasher } = self;
        io.write_end_of_data(&mut stasher);
        let fut = io.flush().and_then(Io::parse_response);
        Box::new(fut)
    }
}
