//! The tokio-smtp-transmit crate drives the SMTP mail transaction (`MAIL`, `RCPT`, `DATA`)
//! for one sender and any number of recipients over a tokio based connection.
//!
//! The crate does neither create mails nor retry failed sends. What it does is
//! to send the envelope of a mail, keep track of which recipients the server
//! rejected and decide, based on that, if the mail body can still be send.
//!
//! The crate can be seen from three perspectives:
//!
//! 1. a user of the transport facade (`transport::SmtpTransport` and
//!    `transport::BlockingTransport`), which handles acquiring and releasing
//!    the connection
//!
//! 2. a user of the `transmit` module, which already has a `Connection` and
//!    wants to send an `Envelope` through it
//!
//! 3. a cmd implementation, having to use `Io`, `Socket` etc.
//!
//! # Outcome of sending an envelope
//!
//! - if all recipients are accepted the result is `SendOutcome::Success`
//! - if some, but not all, recipients are rejected the result is
//!   `SendOutcome::PartialFailure` and the body can still be written
//! - if all recipients are rejected `DATA` is never send and the transmission
//!   fails with a (fatal) `TransmitError::Recipients`
//!
//! # Features
//!
//! ## `mock-support`, `mock-impl`
//!
//! Extend the `Socket` abstraction to include a mock socket additional to `Tcp`, `TcpTls`.
//! Also provides a mock socket implementation for simply testing commands and whole
//! mail transactions.
//!
//! ## `log`
//!
//! Logs phase transitions and rejected recipients through the `log` facade.
//!

// I use `{ ...; let fut = ...long multi line; fut }` a lot for better readability.
#![allow(clippy::let_and_return)]

#[macro_use]
extern crate futures;

mod data_types;
#[macro_use]
mod common;
pub mod response;
pub mod error;
pub mod io;
mod connection;
pub mod command;
mod connect;
#[cfg(feature = "mock-impl")]
pub mod mock;
pub mod envelope;
pub mod failure;
pub mod body;
pub mod transmit;
pub mod completion;
pub mod transport;

pub use self::body::BodyStream;
pub use self::common::*;
pub use self::connect::*;
pub use self::connection::*;
pub use self::data_types::*;
pub use self::envelope::{DeliveryNotification, EncodingRequirement, Envelope, MailAddress};
pub use self::failure::{FailureSet, RecipientFailure, RecipientsError, SendOutcome};
pub use self::io::Io;
pub use self::response::Response;
pub use self::transport::{BlockingTransport, SmtpTransport};
