//! Error types
//!
//! `std::io::Error` is used for all errors which kill the connection
//! (e.g. the socket was closed, a command timed out). Errors which are
//! produced by the server responding with a error code are `LogicError`'s,
//! they do not kill the connection, which is returned together with them.
use std::error::Error;
use std::fmt::{self, Display};
use std::io as std_io;

use crate::data_types::{Capability, EsmtpKeyword};
use crate::response::Response;
use crate::transmit::TransmitError;

/// Error returned when creating a connection failed
#[derive(Debug)]
pub enum ConnectingFailed {
    /// connecting failed on an I/O level (e.g. connection refused, tls handshake failed)
    Io(std_io::Error),
    /// the server rejected the greeting/EHLO/STARTTLS
    Setup(LogicError),
    /// the server rejected the authentication
    Auth(LogicError),
}

impl From<std_io::Error> for ConnectingFailed {
    fn from(err: std_io::Error) -> Self {
        ConnectingFailed::Io(err)
    }
}

impl Error for ConnectingFailed {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use self::ConnectingFailed::*;
        match self {
            Io(err) => Some(err),
            Setup(err) => Some(err),
            Auth(err) => Some(err),
        }
    }
}

impl Display for ConnectingFailed {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        use self::ConnectingFailed::*;
        match self {
            Io(err) => write!(fter, "connecting with server failed: {}", err),
            Setup(err) => write!(fter, "setting up the connection failed: {}", err),
            Auth(err) => write!(fter, "authentication failed: {}", err),
        }
    }
}

/// turns a error response into a `LogicError::Code`
pub fn check_response(response: Response) -> Result<Response, LogicError> {
    if response.is_erroneous() {
        Err(LogicError::Code(response))
    } else {
        Ok(response)
    }
}

#[derive(Debug)]
pub enum LogicError {
    /// The server replied with a error response code
    Code(Response),

    /// The server replied with a non-error response code, but the command could not handle it
    ///
    /// For example on DATA the server responds with the intermediate code 354, if the client
    /// now receives e.g. a 250 than clearly something went wrong.
    UnexpectedCode(Response),

    /// a custom error produced by a custom command
    Custom(Box<dyn Error + 'static + Send + Sync>),

    /// command can not be used, as the server does not promotes the necessary capabilities
    MissingCapabilities(MissingCapabilities),
}

impl LogicError {
    /// the response which caused the error, if there is one
    pub fn response(&self) -> Option<&Response> {
        match self {
            LogicError::Code(response) | LogicError::UnexpectedCode(response) => Some(response),
            _ => None,
        }
    }
}

impl From<MissingCapabilities> for LogicError {
    fn from(err: MissingCapabilities) -> Self {
        LogicError::MissingCapabilities(err)
    }
}

impl Error for LogicError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LogicError::Custom(boxed) => boxed.source(),
            LogicError::MissingCapabilities(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for LogicError {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        use self::LogicError::*;

        match self {
            Code(response) => write!(fter, "server responded with error: {}", response),
            UnexpectedCode(response) => write!(fter, "server responded unexpectedly: {}", response),
            Custom(boxed) => Display::fmt(boxed, fter),
            MissingCapabilities(err) => Display::fmt(err, fter),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MissingCapabilities {
    capabilities: Vec<Capability>,
}

impl MissingCapabilities {
    pub fn new_from_unchecked<I>(data: I) -> Self
    where
        I: Into<String>,
    {
        let mut keyword = data.into();
        keyword.make_ascii_uppercase();
        MissingCapabilities::new(vec![Capability::from(EsmtpKeyword::from_unchecked(
            keyword,
        ))])
    }

    pub fn new(capabilities: Vec<Capability>) -> Self {
        MissingCapabilities { capabilities }
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }
}

impl From<Vec<Capability>> for MissingCapabilities {
    fn from(capabilities: Vec<Capability>) -> Self {
        MissingCapabilities { capabilities }
    }
}

impl Error for MissingCapabilities {}

impl Display for MissingCapabilities {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        write!(fter, "missing capabilities:")?;
        for (idx, cap) in self.capabilities.iter().enumerate() {
            let sep = if idx == 0 { " " } else { ", " };
            write!(fter, "{}{}", sep, cap.as_str())?;
        }
        Ok(())
    }
}

/// Error type combining all errors the transport facade can produce
#[derive(Debug)]
pub enum GeneralError {
    /// acquiring the connection failed
    Connecting(ConnectingFailed),
    /// the mail transaction failed (sender/data rejected, all recipients rejected)
    Transmit(TransmitError),
    /// the server rejected a command outside of the envelope phase (e.g. the mail body)
    Cmd(LogicError),
    /// the connection broke, timed out or was aborted
    Io(std_io::Error),
}

impl From<ConnectingFailed> for GeneralError {
    fn from(err: ConnectingFailed) -> Self {
        GeneralError::Connecting(err)
    }
}

impl From<TransmitError> for GeneralError {
    fn from(err: TransmitError) -> Self {
        GeneralError::Transmit(err)
    }
}

impl From<LogicError> for GeneralError {
    fn from(err: LogicError) -> Self {
        GeneralError::Cmd(err)
    }
}

impl From<std_io::Error> for GeneralError {
    fn from(err: std_io::Error) -> Self {
        GeneralError::Io(err)
    }
}

impl Error for GeneralError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use self::GeneralError::*;
        match self {
            Connecting(err) => Some(err),
            Transmit(err) => Some(err),
            Cmd(err) => Some(err),
            Io(err) => Some(err),
        }
    }
}

impl Display for GeneralError {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        use self::GeneralError::*;
        match self {
            Connecting(err) => Display::fmt(err, fter),
            Transmit(err) => Display::fmt(err, fter),
            Cmd(err) => Display::fmt(err, fter),
            Io(err) => Display::fmt(err, fter),
        }
    }
}
