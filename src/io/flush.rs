use std::io as std_io;

use futures::{Async, Future, Poll};
use tokio::io::AsyncWrite;

use super::Io;
use crate::connection::ExecFuture;

impl Io {
    pub fn flush(self) -> Flushing {
        Flushing::new(self)
    }

    /// writes `line` and then `"\r\n"` to `buffer.output` and then calls `flush`
    pub fn flush_line_from_parts(mut self, line: &[&str]) -> Flushing {
        self.write_line_from_parts(line);
        self.flush()
    }

    /// writes the line, flushes it and parses the servers response
    ///
    /// This is what most single line commands (`MAIL`, `RCPT`, `RSET`, ...) do.
    pub fn exec_simple_cmd(self, line: &[&str]) -> ExecFuture {
        let fut = self
            .flush_line_from_parts(line)
            .and_then(Io::parse_response);

        Box::new(fut)
    }

    pub fn poll_flush(&mut self) -> Poll<(), std_io::Error> {
        let output = &mut self.buffer.output;
        let socket = &mut self.socket;
        while !output.is_empty() {
            let n = try_ready!(socket.poll_write(output));

            if n == 0 {
                return Err(std_io::Error::new(
                    std_io::ErrorKind::WriteZero,
                    "socket accepted zero bytes while output is pending",
                ));
            }

            // remove the bytes written from the buffer
            output.advance(n);
        }

        try_ready!(socket.poll_flush());

        Ok(Async::Ready(()))
    }
}

/// future resolving to the `Io` once all buffered output was written and flushed
pub struct Flushing {
    inner: Option<Io>,
}

impl Flushing {
    pub(crate) fn new(inner: Io) -> Self {
        Flushing { inner: Some(inner) }
    }
}

impl Future for Flushing {
    type Item = Io;
    type Error = std_io::Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        try_ready!({
            let io = self.inner.as_mut().expect("[BUG] poll after completion");
            io.poll_flush()
        });

        let io = self.inner.take().expect("[BUG] poll after completion");
        Ok(Async::Ready(io))
    }
}
