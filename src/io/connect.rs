use std::io as std_io;
use std::net::SocketAddr;

use futures::future::{self, Future};
use native_tls::TlsConnector as NativeTlsConnector;
use tokio::net::TcpStream;
use tokio_tls::TlsConnector;

use super::Io;
use crate::common::{map_tls_err, SetupTls, TlsConfig};

/// future resolving to a (not yet greeted) `Io`
pub type ConnectingIo = Box<dyn Future<Item = Io, Error = std_io::Error> + Send>;

impl Io {
    /// opens a plain tcp connection
    pub fn connect_insecure(addr: &SocketAddr) -> ConnectingIo {
        let fut = TcpStream::connect(addr).map(Io::from);
        Box::new(fut)
    }

    /// opens a tcp connection and does the tls handshake directly on it
    pub fn connect_secure<S>(addr: &SocketAddr, config: TlsConfig<S>) -> ConnectingIo
    where
        S: SetupTls,
    {
        let TlsConfig { domain, setup } = config;
        let connector = alttry!(
            {
                setup.setup(NativeTlsConnector::builder())
            } =>
            |err| -> ConnectingIo { Box::new(future::err(map_tls_err(err))) }
        );
        let connector = TlsConnector::from(connector);

        let fut = TcpStream::connect(addr)
            .and_then(move |stream| {
                connector
                    .connect(domain.as_str(), stream)
                    .map_err(map_tls_err)
            })
            .map(Io::from);

        Box::new(fut)
    }
}
