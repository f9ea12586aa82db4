use std::{io as std_io, mem};

use bytes::BufMut;
use futures::{Async, Future, Poll};
use tokio::io::AsyncRead;

use super::{Io, SmtpResult, INPUT_BUFFER_INC_SIZE};
use crate::error::check_response;
use crate::response::parser;

impl Io {
    /// parse a "normal" smtp response
    ///
    /// # Panics
    ///
    /// Panics if the write buffer is not empty
    pub fn parse_response(self) -> Parsing {
        if !self.buffer.output.is_empty() {
            panic!("[BUG] parsing input before writing all output")
        }
        Parsing::new(self)
    }

    /// read data from the socket to buffer.input until it would block or the socket closed
    ///
    /// The input buffer is increased in increments of 256 bytes (`INPUT_BUFFER_INC_SIZE`)
    pub fn read_from_socket(&mut self) -> Result<ReadState, std_io::Error> {
        let input = &mut self.buffer.input;
        let socket = &mut self.socket;

        loop {
            if input.remaining_mut() == 0 {
                input.reserve(INPUT_BUFFER_INC_SIZE);
            }

            match socket.read_buf(input) {
                Ok(Async::NotReady) => return Ok(ReadState::NotReady),
                Ok(Async::Ready(0)) => return Ok(ReadState::SocketClosed),
                Ok(Async::Ready(_)) => (),
                Err(err) => return Err(err),
            }
        }
    }

    /// removes the first line from the input buffer and passes it (without `"\r\n"`) to `parse_line_fn`
    ///
    /// Returns `Ok(None)` if there is no complete line in the buffer.
    pub fn try_pop_line<F, R, E>(&mut self, parse_line_fn: F) -> Result<Option<R>, E>
    where
        F: FnOnce(&[u8]) -> Result<R, E>,
    {
        let input = self.in_buffer();

        let eol = (&*input).windows(2).position(|pair| pair == b"\r\n");

        if let Some(eol) = eol {
            let parsed = parse_line_fn(&input[..eol])?;
            input.advance(eol + 2);
            Ok(Some(parsed))
        } else {
            Ok(None)
        }
    }
}

/// Used to hint if a socket was closed
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ReadState {
    /// the socket was closed when reading from it
    SocketClosed,
    /// the socket is not ready
    NotReady,
}

impl ReadState {
    pub fn is_socket_closed(self) -> bool {
        self == ReadState::SocketClosed
    }
}

/// future returned by `Io::parse_response`
pub struct Parsing {
    inner: Option<Io>,
    lines: Vec<parser::ResponseLine>,
}

impl Parsing {
    pub(crate) fn new(inner: Io) -> Self {
        Parsing {
            inner: Some(inner),
            lines: Vec::new(),
        }
    }

    fn io_mut(&mut self) -> &mut Io {
        self.inner.as_mut().expect("[BUG] poll after completion")
    }

    fn read_result(&mut self) -> Result<Option<(Io, SmtpResult)>, parser::ParseError> {
        loop {
            let opt_line = self.io_mut().try_pop_line(parser::parse_line)?;

            let line = match opt_line {
                Some(line) => line,
                None => return Ok(None),
            };

            let last = line.last_line;
            self.lines.push(line);

            if !last {
                continue;
            }

            let lines = mem::replace(&mut self.lines, Vec::new());
            let response = parser::response_from_parsed_lines(lines)?;

            let io = self.inner.take().expect("[BUG] poll after completion");
            return Ok(Some((io, check_response(response))));
        }
    }
}

impl Future for Parsing {
    type Item = (Io, SmtpResult);
    type Error = std_io::Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        //1. parse data which might already be buffered (pipelined responses)
        if let Some(result) = self.read_result().map_err(map_parse_err)? {
            return Ok(Async::Ready(result));
        }

        //2. read more data
        let state = self.io_mut().read_from_socket()?;

        //3. see if we have a full response now
        if let Some(result) = self.read_result().map_err(map_parse_err)? {
            return Ok(Async::Ready(result));
        }

        //4. if not see if the socked was closed
        match state {
            ReadState::NotReady => Ok(Async::NotReady),
            ReadState::SocketClosed => Err(std_io::Error::new(
                std_io::ErrorKind::ConnectionAborted,
                "socket closed before getting full smtp response",
            )),
        }
    }
}

fn map_parse_err(err: parser::ParseError) -> std_io::Error {
    std_io::Error::new(std_io::ErrorKind::InvalidData, err)
}
