use std::io as std_io;
use std::time::Duration;

use futures::future::{self, Either, Future};
use tokio::io::{shutdown, Shutdown};
use tokio::timer::{timeout, Timeout};

use crate::common::EhloData;
use crate::error::MissingCapabilities;
use crate::io::{Io, SmtpResult, Socket};

/// Future returned by `Connection::send`
pub type CmdFuture = Box<dyn Future<Item = (Connection, SmtpResult), Error = std_io::Error> + Send>;

/// Future returned by `Cmd::exec`
pub type ExecFuture = Box<dyn Future<Item = (Io, SmtpResult), Error = std_io::Error> + Send>;

/// The basic `Connection` type representing an (likely) open smtp connection
///
/// It's only likely open as the server could disconnect at any time. But it
/// guaranteed that the server did not respond with an error to the initial
/// greeting and the `EHLO` command.
///
/// Every command send through the connection is bounded by the connections
/// `timeout` (if one is set). A command exceeding it fails with an
/// `std::io::Error` of kind `TimedOut`, which drops the connection.
///
/// # Example
///
/// ```no_run
/// extern crate futures;
/// extern crate tokio;
/// extern crate tokio_smtp_transmit;
///
/// use futures::future::{self, Future};
/// use tokio_smtp_transmit::{command, Connection, ReversePath};
///
/// let fut = future::lazy(|| {
///     Connection::connect(
///         tokio_smtp_transmit::ConnectionConfig::builder_local_unencrypted().build()
///     )
/// })
/// .map_err(|err| eprintln!("connecting failed: {}", err))
/// .and_then(|con| {
///     con.send(command::Mail::new(ReversePath::from_unchecked("test@1aim.test")))
///         .map_err(|err| eprintln!("I/O error: {}", err))
/// })
/// .and_then(|(con, result)| {
///     if let Err(err) = result {
///         eprintln!("server rejected MAIL: {}", err);
///     }
///     con.quit().map(|_| ()).map_err(|err| eprintln!("quitting failed: {}", err))
/// });
///
/// tokio::run(fut);
/// ```
#[derive(Debug)]
pub struct Connection {
    io: Io,
    timeout: Option<Duration>,
}

impl Connection {
    /// send a command to the smtp server
    ///
    /// This consumes the connection (as it might be modified, recrated or
    /// killed by the command) and returns a future resolving to the result
    /// of sending the command.
    ///
    /// If the command can not be used, as the server does not support it
    /// the command is not send and a future resolving to a `LogicError`
    /// (containing `MissingCapabilities`) is returned.
    pub fn send<C: Cmd>(self, cmd: C) -> CmdFuture {
        let Connection { io, timeout } = self;

        if let Err(err) = cmd.check_cmd_availability(io.ehlo_data()) {
            let con = Connection { io, timeout };
            return Box::new(future::ok((con, Err(err.into()))));
        }

        let fut = cmd.exec(io);
        let fut = match timeout {
            Some(limit) => Either::A(Timeout::new(fut, limit).map_err(map_timeout_err)),
            None => Either::B(fut),
        };

        let fut = fut.map(move |(io, result)| (Connection { io, timeout }, result));
        Box::new(fut)
    }

    /// returns true if the capability is known to be supported, false elsewise
    ///
    /// The capability is know to be supported if the connection has EhloData and
    /// it was in the ehlo data (as a ehlo-keyword in one of the ehlo-lines after
    /// the first response line).
    ///
    /// If the connection has no ehlo data or the capability is not in the ehlo
    /// data false is returned.
    pub fn has_capability<C>(&self, cap: C) -> bool
    where
        C: AsRef<str>,
    {
        self.io.has_capability(cap)
    }

    /// returns the ehlo data of the last EHLO command
    pub fn ehlo_data(&self) -> Option<&EhloData> {
        self.io.ehlo_data()
    }

    /// the timeout applied to every command (`None` if commands are unbounded)
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// consumes the connection with a different timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// returns the inner `Io` (dropping the timeout)
    pub fn into_inner(self) -> Io {
        self.io
    }

    pub(crate) fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }

    /// shutdown the connection _without_ sending quit
    pub fn shutdown(self) -> Shutdown<Socket> {
        let (socket, _, _) = self.into_inner().split();
        shutdown(socket)
    }

    /// sends Quit to the server and then shuts down the socket
    pub fn quit(self) -> impl Future<Item = Socket, Error = std_io::Error> + Send {
        //Note: this has a circular dependency between Connection <-> cmd Quit which
        // could be resolved using a ext. trait, but it's more ergonomic this way
        use crate::command::Quit;

        self.send(Quit).and_then(|(con, _res)| con.shutdown())
    }
}

impl From<Io> for Connection {
    fn from(io: Io) -> Self {
        Connection { io, timeout: None }
    }
}

impl From<Connection> for Io {
    fn from(con: Connection) -> Self {
        con.into_inner()
    }
}

impl From<Socket> for Connection {
    fn from(socket: Socket) -> Self {
        Connection::from(Io::from(socket))
    }
}

fn map_timeout_err(err: timeout::Error<std_io::Error>) -> std_io::Error {
    if err.is_elapsed() {
        std_io::Error::new(std_io::ErrorKind::TimedOut, "smtp command timed out")
    } else if err.is_inner() {
        err.into_inner()
            .unwrap_or_else(|| std_io::Error::new(std_io::ErrorKind::Other, "smtp command failed"))
    } else {
        std_io::Error::new(std_io::ErrorKind::Other, "timer failed")
    }
}

/// Trait implemented by any smtp command
pub trait Cmd: Send + 'static {
    /// this method is called before the command is send to make sure the server supports it
    fn check_cmd_availability(&self, caps: Option<&EhloData>) -> Result<(), MissingCapabilities>;

    /// this method is called to send the command and return a future resolving
    /// to the new `Io` and the result of the command
    ///
    /// Only fatal errors (connection broken, protocol violations) are returned
    /// as future error, a error response of the server is part of the `SmtpResult`.
    fn exec(self, io: Io) -> ExecFuture;
}
