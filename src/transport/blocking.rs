use std::io as std_io;

use futures::Future;
use tokio::runtime::current_thread::Runtime;

use super::SmtpTransport;
use crate::body::BodyStream;
use crate::common::SetupTls;
use crate::connect::ConnectionConfig;
use crate::connection::{Cmd, Connection};
use crate::envelope::Envelope;
use crate::error::GeneralError;
use crate::failure::SendOutcome;
use crate::response::Response;

/// Blocking transport facade
///
/// Runs the operations of a `SmtpTransport` on its own current thread
/// runtime, so it must not be used from within a tokio executor.
///
/// # Example
///
/// ```no_run
/// use std::io::Write;
/// use tokio_smtp_transmit::{BlockingTransport, ConnectionConfig, Envelope, MailAddress};
/// use vec1::Vec1;
///
/// let config = ConnectionConfig::builder_local_unencrypted().build();
/// let mut transport = BlockingTransport::new(config).expect("starting runtime failed");
/// transport.get_connection().expect("connecting failed");
///
/// let envelope = Envelope::new(
///     MailAddress::from("a@x.com"),
///     Vec1::new(MailAddress::from("b@x.com")),
/// );
/// let (mut body, outcome) = transport.send_mail(envelope).expect("mail rejected");
/// body.write_all(b"Subject: hy\r\n\r\nhy there\r\n").unwrap();
/// transport.finish_body(body).expect("body rejected");
/// if let Some(err) = outcome.into_error() {
///     eprintln!("{}", err);
/// }
/// transport.release_connection().expect("quit failed");
/// ```
pub struct BlockingTransport<A, S>
where
    A: Cmd + Clone,
    S: SetupTls + Clone,
{
    inner: SmtpTransport<A, S>,
    runtime: Runtime,
}

impl<A, S> BlockingTransport<A, S>
where
    A: Cmd + Clone,
    S: SetupTls + Clone,
{
    pub fn new(config: ConnectionConfig<A, S>) -> Result<Self, std_io::Error> {
        BlockingTransport::from_transport(SmtpTransport::new(config))
    }

    pub fn from_transport(inner: SmtpTransport<A, S>) -> Result<Self, std_io::Error> {
        let runtime = Runtime::new()?;
        Ok(BlockingTransport { inner, runtime })
    }

    pub fn transport(&self) -> &SmtpTransport<A, S> {
        &self.inner
    }

    pub fn transport_mut(&mut self) -> &mut SmtpTransport<A, S> {
        &mut self.inner
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// connects to the server if there is no connection yet
    pub fn get_connection(&mut self) -> Result<(), GeneralError> {
        if self.inner.is_connected() {
            return Ok(());
        }
        let result = self.runtime.block_on(self.inner.begin_get_connection());
        self.inner.end_get_connection(result)
    }

    /// sends the envelope, see `transmit::transmit`
    ///
    /// The returned body has to be written and then passed to `finish_body`.
    ///
    /// # Panics
    ///
    /// if there is no connection
    pub fn send_mail(&mut self, envelope: Envelope) -> Result<(BodyStream, SendOutcome), GeneralError> {
        let result = self.runtime.block_on(self.inner.begin_send_mail(envelope));
        self.inner.end_send_mail(result)
    }

    /// finishes the body and returns the servers response to the mail
    pub fn finish_body(&mut self, body: BodyStream) -> Result<Response, GeneralError> {
        let result = self.runtime.block_on(self.inner.begin_finish_body(body));
        self.inner.end_body(result)
    }

    /// sends the envelope and then `body` as mail body
    pub fn send_mail_with_body(
        &mut self,
        envelope: Envelope,
        body: &[u8],
    ) -> Result<(Response, SendOutcome), GeneralError> {
        let (mut stream, outcome) = self.send_mail(envelope)?;
        std_io::Write::write_all(&mut stream, body)?;
        let response = self.finish_body(stream)?;
        Ok((response, outcome))
    }

    /// sends `QUIT` and closes the connection, does nothing if there is none
    pub fn release_connection(&mut self) -> Result<(), GeneralError> {
        let fut = self.inner.release_connection();
        self.runtime.block_on(fut)?;
        Ok(())
    }

    /// drops the connection without sending `QUIT`
    pub fn abort(&mut self) {
        self.inner.abort()
    }

    pub fn set_connection(&mut self, con: Connection) -> Option<Connection> {
        self.inner.set_connection(con)
    }

    pub fn take_connection(&mut self) -> Option<Connection> {
        self.inner.take_connection()
    }

    /// runs any other future on the transports runtime
    pub fn block_on<F>(&mut self, fut: F) -> Result<F::Item, F::Error>
    where
        F: Future,
    {
        self.runtime.block_on(fut)
    }
}
