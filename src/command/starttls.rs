use std::io as std_io;

use futures::future::{self, Either, Future};

use native_tls::TlsConnector as NativeTlsConnector;
use tokio_tls::TlsConnector;

use crate::{
    error::MissingCapabilities,
    io::{Io, Socket},
    common::map_tls_err,
    response::{codes, Response},
    Cmd, DefaultTlsSetup, Domain, EhloData, ExecFuture, SetupTls,
};

/// STARTTLS, upgrades the connection to TLS
///
/// The ehlo data is dropped afterwards, a new `EHLO` has to be send.
pub struct StartTls<S = DefaultTlsSetup> {
    pub setup_tls: S,
    pub sni_domain: Domain,
}

impl StartTls<DefaultTlsSetup> {
    pub fn new<I>(sni_domain: I) -> Self
    where
        I: Into<Domain>,
    {
        StartTls {
            sni_domain: sni_domain.into(),
            setup_tls: DefaultTlsSetup,
        }
    }
}

impl<S> StartTls<S>
where
    S: SetupTls,
{
    pub fn new_with_tls_setup<I>(sni_domain: I, setup_tls: S) -> Self
    where
        I: Into<Domain>,
    {
        StartTls {
            setup_tls,
            sni_domain: sni_domain.into(),
        }
    }
}

/// STARTTLS has no "final" response, after the `220` the handshake
/// starts, so the future resolves to a synthetic `"220 Ready"`
fn tls_done_result() -> Response {
    Response::new(codes::READY, vec!["Ready".to_owned()])
}

fn connection_already_secure_error_future() -> ExecFuture {
    let fut = future::err(std_io::Error::new(
        std_io::ErrorKind::AlreadyExists,
        "connection is already TLS encrypted",
    ));
    Box::new(fut)
}

const STARTTLS: &str = "STARTTLS";

impl<S> Cmd for StartTls<S>
where
    S: SetupTls,
{
    fn check_cmd_availability(&self, caps: Option<&EhloData>) -> Result<(), MissingCapabilities> {
        if caps.map(|ehlo| ehlo.has_capability(STARTTLS)).unwrap_or(false) {
            Ok(())
        } else {
            Err(MissingCapabilities::new_from_unchecked(STARTTLS))
        }
    }

    fn exec(self, io: Io) -> ExecFuture {
        let StartTls {
            sni_domain,
            setup_tls,
        } = self;

        let already_secure = match *io.socket() {
            Socket::Insecure(_) => false,
            Socket::Secure(_) => true,
            #[cfg(feature = "mock-support")]
            Socket::Mock(ref socket_mock) => socket_mock.is_secure(),
        };

        if already_secure {
            return connection_already_secure_error_future();
        }

        let fut = io
            .exec_simple_cmd(&[STARTTLS])
            .and_then(move |(io, smtp_result)| match smtp_result {
                Err(err) => Either::A(future::ok((io, Err(err)))),
                Ok(_) => {
                    let (socket, _buffer, _ehlo_data) = io.split();
                    let stream = match socket {
                        Socket::Insecure(stream) => stream,
                        #[cfg(feature = "mock-support")]
                        Socket::Mock(mut socket_mock) => {
                            socket_mock.set_is_secure(true);
                            let io = Io::from(Socket::Mock(socket_mock));
                            return Either::A(future::ok((io, Ok(tls_done_result()))));
                        }
                        _ => unreachable!("[BUG] socket kind changed during STARTTLS"),
                    };

                    let connector = alttry!(
                        {
                            let native = setup_tls.setup(NativeTlsConnector::builder())?;
                            Ok(TlsConnector::from(native))
                        } =>
                        |err| Either::A(future::err(map_tls_err(err)))
                    );

                    let fut = connector
                        .connect(sni_domain.as_str(), stream)
                        .map_err(map_tls_err)
                        .map(|stream| (Io::from(stream), Ok(tls_done_result())));

                    Either::B(fut)
                }
            });

        Box::new(fut)
    }
}
