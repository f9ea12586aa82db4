//! The transport facade, owning the connection between mails
//!
//! `SmtpTransport` is the asynchronous facade, most operations come as a
//! `begin_*` method returning a future and a `end_*` method which takes the
//! result of the future and puts the connection back into the transport.
//!
//! `BlockingTransport` wraps it and drives all futures to completion on a
//! current thread runtime.
use std::io as std_io;

use futures::future::{self, Either, Future};

use crate::body::BodyStream;
use crate::command::Noop;
use crate::common::{DefaultTlsSetup, SetupTls};
use crate::completion::{abortable, AbortHandle, Abortable, Completion};
use crate::connect::{ConnectingFuture, ConnectionConfig};
use crate::connection::{Cmd, CmdFuture, Connection};
use crate::envelope::Envelope;
use crate::error::{ConnectingFailed, GeneralError};
use crate::failure::SendOutcome;
use crate::io::SmtpResult;
use crate::response::Response;
use crate::transmit::{transmit, OnError, Transmit, TransmitResult};

mod blocking;
pub use self::blocking::*;

/// Future returned by `SmtpTransport::begin_send_mail`
pub type SendMailFuture = Abortable<Transmit>;

/// Future returned by `SmtpTransport::begin_finish_body`
pub type FinishBodyFuture = Abortable<CmdFuture>;

/// Asynchronous transport facade
///
/// At most one operation is in flight at any time, the connection is moved
/// into the running operation and handed back with the `end_*` methods.
#[derive(Debug)]
pub struct SmtpTransport<A = Noop, S = DefaultTlsSetup>
where
    A: Cmd + Clone,
    S: SetupTls + Clone,
{
    config: ConnectionConfig<A, S>,
    con: Option<Connection>,
    on_error: OnError,
    pending_abort: Option<AbortHandle>,
}

impl<A, S> SmtpTransport<A, S>
where
    A: Cmd + Clone,
    S: SetupTls + Clone,
{
    pub fn new(config: ConnectionConfig<A, S>) -> Self {
        SmtpTransport {
            config,
            con: None,
            on_error: OnError::default(),
            pending_abort: None,
        }
    }

    /// sets what is done with the connection if the mail transaction fails
    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn on_error(&self) -> OnError {
        self.on_error
    }

    pub fn config(&self) -> &ConnectionConfig<A, S> {
        &self.config
    }

    /// true if a connection is held by the transport (i.e. none is in use by an operation)
    pub fn is_connected(&self) -> bool {
        self.con.is_some()
    }

    /// connects to the configured server
    ///
    /// The resulting connection has to be passed to `end_get_connection`.
    pub fn begin_get_connection(&self) -> ConnectingFuture {
        Connection::connect(self.config.clone())
    }

    pub fn end_get_connection(
        &mut self,
        result: Result<Connection, ConnectingFailed>,
    ) -> Result<(), GeneralError> {
        let con = result?;
        #[cfg(feature = "log")]
        log_facade::debug!("connection to {} acquired", self.config.addr);
        self.con = Some(con);
        Ok(())
    }

    /// starts sending the envelope over the held connection
    ///
    /// # Panics
    ///
    /// if the transport has no connection (`get_connection` was not called
    /// or the connection was not given back)
    pub fn begin_send_mail(&mut self, envelope: Envelope) -> SendMailFuture {
        let con = self
            .con
            .take()
            .expect("sending a mail requires an acquired connection");

        let (fut, handle) = abortable(transmit(con, envelope, self.on_error));
        self.pending_abort = Some(handle);
        fut
    }

    /// like `begin_send_mail` but calls `callback` exactly once with the result
    ///
    /// The returned future has to be polled (e.g. spawned) for the mail to be send.
    pub fn begin_send_mail_with_callback<C>(
        &mut self,
        envelope: Envelope,
        callback: C,
    ) -> Completion<SendMailFuture, C>
    where
        C: FnOnce(Result<TransmitResult, std_io::Error>),
    {
        Completion::new(self.begin_send_mail(envelope), callback)
    }

    /// takes the result of `begin_send_mail`
    ///
    /// If the mail transaction failed the connection is put back into the
    /// transport. If `DATA` was accepted the connection is part of the
    /// `BodyStream` and comes back with `end_body`.
    pub fn end_send_mail(
        &mut self,
        result: Result<TransmitResult, std_io::Error>,
    ) -> Result<(BodyStream, SendOutcome), GeneralError> {
        self.pending_abort = None;
        match result? {
            Ok(body_and_outcome) => Ok(body_and_outcome),
            Err((con, err)) => {
                self.con = Some(con);
                Err(err.into())
            }
        }
    }

    /// finishes the body, resolving to the servers response to the mail
    pub fn begin_finish_body(&mut self, body: BodyStream) -> FinishBodyFuture {
        let (fut, handle) = abortable(body.finish());
        self.pending_abort = Some(handle);
        fut
    }

    /// takes the result of finishing the body, putting the connection back
    pub fn end_body(
        &mut self,
        result: Result<(Connection, SmtpResult), std_io::Error>,
    ) -> Result<Response, GeneralError> {
        self.pending_abort = None;
        let (con, result) = result?;
        self.con = Some(con);
        Ok(result?)
    }

    /// sends `QUIT` and shuts the connection down, resolves directly if there is no connection
    pub fn release_connection(&mut self) -> impl Future<Item = (), Error = std_io::Error> + Send {
        match self.con.take() {
            Some(con) => {
                #[cfg(feature = "log")]
                log_facade::debug!("releasing connection to {}", self.config.addr);
                Either::A(con.quit().map(|_socket| ()))
            }
            None => Either::B(future::ok(())),
        }
    }

    /// aborts the operation in flight (if any) and drops the held connection (if any)
    ///
    /// The aborted operation resolves to a `ConnectionAborted` error.
    pub fn abort(&mut self) {
        if let Some(handle) = self.pending_abort.take() {
            #[cfg(feature = "log")]
            log_facade::debug!("aborting in flight operation");
            handle.abort();
        }
        self.con = None;
    }

    /// removes the connection from the transport
    pub fn take_connection(&mut self) -> Option<Connection> {
        self.con.take()
    }

    /// sets the connection used by the transport, returning the previous one
    pub fn set_connection(&mut self, con: Connection) -> Option<Connection> {
        self.con.replace(con)
    }
}
