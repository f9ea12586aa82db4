//! Sending the envelope of a mail: `MAIL`, `RCPT` for every recipient and `DATA`
//!
//! `transmit` returns a `Transmit` future which drives the whole sequence.
//! It never blocks, if a command resolves immediately (e.g. because the
//! response was already buffered) the next command is send in the same
//! `poll` call.
//!
//! The future resolves to:
//!
//! - `Ok((BodyStream, SendOutcome))` if the server accepted `DATA`, the outcome
//!   tells if some recipients where rejected
//! - `Err((Connection, TransmitError))` if the server rejected the mail
//!   transaction (sender rejected, all recipients rejected, `DATA` rejected or
//!   missing capabilities), the connection can still be used
//!
//! I/O errors (including timeouts) are the error of the future, the connection
//! is lost in that case. If the connection breaks while resetting a rejected
//! transaction the rejection is still available through `ResetFailed`.
use std::error::Error;
use std::fmt::{self, Display};
use std::io as std_io;
use std::mem;

use futures::{Async, Future, Poll};

use crate::body::BodyStream;
use crate::command::{Data, Reset};
use crate::connection::{CmdFuture, Cmd, Connection};
use crate::envelope::Envelope;
use crate::error::{LogicError, MissingCapabilities};
use crate::failure::{FailureSet, RecipientsError, SendOutcome};
use crate::io::SmtpResult;
use crate::response::Response;

/// Result the `Transmit` future resolves to
pub type TransmitResult = Result<(BodyStream, SendOutcome), (Connection, TransmitError)>;

/// What to do with the connection if the mail transaction failed
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum OnError {
    /// return the connection as it is
    Stop,
    /// send `RSET` if a transaction was started, then return the connection
    StopAndReset,
}

impl Default for OnError {
    fn default() -> Self {
        OnError::StopAndReset
    }
}

/// The server rejected the mail transaction
#[derive(Debug)]
pub enum TransmitError {
    /// `MAIL` was rejected, no recipient was send
    Sender(LogicError),
    /// all recipients were rejected, `DATA` was not send
    Recipients(RecipientsError),
    /// `DATA` was rejected (or answered with something else then `354`)
    Data(LogicError),
    /// the envelope needs a capability (e.g. `SMTPUTF8`) the server does not have
    MissingCapabilities(MissingCapabilities),
}

impl Error for TransmitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use self::TransmitError::*;
        match self {
            Sender(err) => Some(err),
            Recipients(err) => Some(err),
            Data(err) => Some(err),
            MissingCapabilities(err) => Some(err),
        }
    }
}

impl Display for TransmitError {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        use self::TransmitError::*;
        match self {
            Sender(err) => write!(fter, "sender rejected: {}", err),
            Recipients(err) => Display::fmt(err, fter),
            Data(err) => write!(fter, "DATA rejected: {}", err),
            MissingCapabilities(err) => Display::fmt(err, fter),
        }
    }
}

/// `RSET` failed after the mail transaction was already rejected
///
/// The connection is lost, but the rejection which caused the reset is kept.
/// It is the inner error of the `std::io::Error` the `Transmit` future fails
/// with (same kind as the error of `RSET`), see `ResetFailed::from_io_error`.
#[derive(Debug)]
pub struct ResetFailed {
    error: TransmitError,
    cause: std_io::Error,
}

impl ResetFailed {
    fn into_io_error(error: TransmitError, cause: std_io::Error) -> std_io::Error {
        #[cfg(feature = "log")]
        log_facade::warn!("RSET failed after {}: {}", error, cause);
        let kind = cause.kind();
        std_io::Error::new(kind, ResetFailed { error, cause })
    }

    /// extracts the `ResetFailed` from an error returned by `Transmit`
    ///
    /// Returns the error unchanged if it is not caused by a failing `RSET`.
    pub fn from_io_error(err: std_io::Error) -> Result<ResetFailed, std_io::Error> {
        let is_reset_failed = err
            .get_ref()
            .map(|inner| inner.is::<ResetFailed>())
            .unwrap_or(false);

        if !is_reset_failed {
            return Err(err);
        }

        match err.into_inner().map(|inner| inner.downcast::<ResetFailed>()) {
            Some(Ok(reset_failed)) => Ok(*reset_failed),
            _ => unreachable!("[BUG] inner error was checked to be ResetFailed"),
        }
    }

    /// the rejection which caused the reset
    pub fn transmit_error(&self) -> &TransmitError {
        &self.error
    }

    /// the error `RSET` failed with
    pub fn cause(&self) -> &std_io::Error {
        &self.cause
    }

    pub fn into_parts(self) -> (TransmitError, std_io::Error) {
        (self.error, self.cause)
    }
}

impl Error for ResetFailed {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.cause)
    }
}

impl Display for ResetFailed {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        write!(fter, "{} (RSET failed: {})", self.error, self.cause)
    }
}

/// starts sending the envelope over the connection
///
/// Nothing is send before the returned future is polled.
pub fn transmit(con: Connection, envelope: Envelope, on_error: OnError) -> Transmit {
    Transmit {
        envelope,
        on_error,
        with_dsn: false,
        state: State::Start(con),
    }
}

/// Future driving the mail transaction, see `transmit`
pub struct Transmit {
    envelope: Envelope,
    on_error: OnError,
    with_dsn: bool,
    state: State,
}

enum State {
    Start(Connection),
    Pending(Phase, CmdFuture),
    Done,
}

enum Phase {
    Sender,
    Recipient { idx: usize, failures: FailureSet },
    Data { outcome: SendOutcome },
    Resetting { error: TransmitError },
}

enum Step {
    Next(State),
    Done(TransmitResult),
}

impl Transmit {
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn start(&mut self, con: Connection) -> Step {
        let mail = self.envelope.mail_cmd();
        if let Err(missing) = mail.check_cmd_availability(con.ehlo_data()) {
            #[cfg(feature = "log")]
            log_facade::warn!("can not send envelope: {}", missing);
            return Step::Done(Err((con, TransmitError::MissingCapabilities(missing))));
        }

        self.with_dsn = con.has_capability("DSN");

        #[cfg(feature = "log")]
        log_facade::debug!(
            "sending envelope from <{}> to {} recipient(s)",
            self.envelope.sender().map(|addr| addr.as_str()).unwrap_or(""),
            self.envelope.recipients().len()
        );

        Step::Next(State::Pending(Phase::Sender, con.send(mail)))
    }

    fn advance(
        &self,
        phase: Phase,
        con: Connection,
        result: SmtpResult,
    ) -> Result<Step, std_io::Error> {
        let step = match phase {
            Phase::Sender => match result {
                Ok(_) => self.send_recipient(con, 0, FailureSet::new()),
                Err(err) => {
                    #[cfg(feature = "log")]
                    log_facade::warn!("sender rejected: {}", err);
                    // no transaction was started, nothing to reset
                    Step::Done(Err((con, TransmitError::Sender(err))))
                }
            },
            Phase::Recipient { idx, mut failures } => {
                let recipient = &self.envelope.recipients()[idx];
                match rejection(result) {
                    Ok(None) => (),
                    Ok(Some(response)) => {
                        #[cfg(feature = "log")]
                        log_facade::warn!("recipient <{}> rejected: {}", recipient, response);
                        failures.record(recipient.clone(), response);
                    }
                    Err(LogicError::MissingCapabilities(missing)) => {
                        let error = TransmitError::MissingCapabilities(missing);
                        return Ok(self.fail_in_transaction(con, error));
                    }
                    Err(other) => {
                        return Err(std_io::Error::new(std_io::ErrorKind::Other, other));
                    }
                }
                self.send_recipient(con, idx + 1, failures)
            }
            Phase::Data { outcome } => match result {
                Ok(_) => {
                    #[cfg(feature = "log")]
                    log_facade::debug!("DATA accepted, sending body");
                    Step::Done(Ok((BodyStream::new(con), outcome)))
                }
                Err(err) => {
                    #[cfg(feature = "log")]
                    log_facade::warn!("DATA rejected: {}", err);
                    self.fail_in_transaction(con, TransmitError::Data(err))
                }
            },
            Phase::Resetting { error } => Step::Done(Err((con, error))),
        };
        Ok(step)
    }

    /// sends the recipient at `idx` or, if all were send, `DATA`
    fn send_recipient(&self, con: Connection, idx: usize, failures: FailureSet) -> Step {
        let recipients = self.envelope.recipients();
        if let Some(recipient) = recipients.get(idx) {
            let cmd = self.envelope.recipient_cmd(recipient, self.with_dsn);
            let phase = Phase::Recipient { idx, failures };
            return Step::Next(State::Pending(phase, con.send(cmd)));
        }

        match failures.classify(recipients.len()) {
            SendOutcome::TotalFailure(failures) => {
                #[cfg(feature = "log")]
                log_facade::warn!("all recipients rejected, not sending DATA");
                let error = TransmitError::Recipients(RecipientsError::new(true, failures));
                self.fail_in_transaction(con, error)
            }
            outcome => Step::Next(State::Pending(Phase::Data { outcome }, con.send(Data))),
        }
    }

    /// ends the transmission after `MAIL` was accepted
    fn fail_in_transaction(&self, con: Connection, error: TransmitError) -> Step {
        match self.on_error {
            OnError::Stop => Step::Done(Err((con, error))),
            OnError::StopAndReset => {
                let phase = Phase::Resetting { error };
                Step::Next(State::Pending(phase, con.send(Reset)))
            }
        }
    }
}

impl Future for Transmit {
    type Item = TransmitResult;
    type Error = std_io::Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        loop {
            let step = match mem::replace(&mut self.state, State::Done) {
                State::Start(con) => self.start(con),
                State::Pending(phase, mut pending) => match pending.poll() {
                    Ok(Async::Ready((con, result))) => self.advance(phase, con, result)?,
                    Ok(Async::NotReady) => {
                        self.state = State::Pending(phase, pending);
                        return Ok(Async::NotReady);
                    }
                    Err(err) => {
                        return Err(match phase {
                            Phase::Resetting { error } => ResetFailed::into_io_error(error, err),
                            _ => err,
                        });
                    }
                },
                State::Done => panic!("[BUG] poll after completion"),
            };

            match step {
                Step::Next(state) => self.state = state,
                Step::Done(result) => return Ok(Async::Ready(result)),
            }
        }
    }
}

/// the response rejecting the recipient, `None` if it was accepted
fn rejection(result: SmtpResult) -> Result<Option<Response>, LogicError> {
    match result {
        Ok(response) => {
            if response.code().is_positive() {
                Ok(None)
            } else {
                Ok(Some(response))
            }
        }
        Err(LogicError::Code(response)) | Err(LogicError::UnexpectedCode(response)) => {
            Ok(Some(response))
        }
        Err(other) => Err(other),
    }
}
