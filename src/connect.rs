use std::fmt::Debug;
use std::io as std_io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use futures::future::{self, Either, Future};
use tokio::timer::Timeout;

use crate::{
    command::{Ehlo, Noop, StartTls},
    common::{ClientCertificate, ClientId, DefaultTlsSetup, SetupTls, TlsConfig},
    connection::{Cmd, Connection},
    data_types::Domain,
    error::{ConnectingFailed, LogicError},
    io::{ConnectingIo, Io, SmtpResult},
};

/// A future resolving to an `Connection` instance
pub type ConnectingFuture =
    Box<dyn Future<Item = Connection, Error = ConnectingFailed> + Send + 'static>;

pub const DEFAULT_SMTP_MSA_PORT: u16 = 587;
pub const DEFAULT_SMTP_MX_PORT: u16 = 25;

/// turns the result of a setup command into a connection (or a `ConnectingFailed`)
///
/// If the server rejected the command the connection is closed with QUIT.
fn cmd_future2connecting_future<LE: 'static, E>(
    res: Result<(Connection, SmtpResult), E>,
    new_logic_err: LE,
) -> impl Future<Item = Connection, Error = ConnectingFailed> + Send
where
    LE: Send + FnOnce(LogicError) -> ConnectingFailed,
    E: Into<ConnectingFailed>,
{
    let fut = match res {
        Err(err) => Either::A(future::err(err.into())),
        Ok((con, Ok(_resp))) => Either::A(future::ok(con)),
        Ok((con, Err(err))) => {
            #[cfg(feature = "log")]
            log_facade::warn!("connection setup rejected: {}", err);
            Either::B(con.quit().then(|_| Err(new_logic_err(err))))
        }
    };

    fut
}

impl Connection {
    /// open a connection to an smtp server using given configuration
    ///
    /// The greeting, `EHLO`, optional `STARTTLS` (+ second `EHLO`) and the
    /// auth command are each bounded by `config.timeout`, which is then
    /// also used for all commands send through the returned connection.
    pub fn connect<S, A>(config: ConnectionConfig<A, S>) -> ConnectingFuture
    where
        S: SetupTls,
        A: Cmd,
    {
        let ConnectionConfig {
            addr,
            security,
            client_id,
            auth_cmd,
            syntax_error_handling,
            timeout,
        } = config;

        let ehlo = Ehlo::from(client_id).with_syntax_error_handling(syntax_error_handling);

        #[allow(deprecated)]
        let fut = match security {
            Security::None => Either::A(Either::A(connect_and_greet(
                Io::connect_insecure(&addr),
                ehlo,
                timeout,
            ))),
            Security::DirectTls(tls_config) => Either::A(Either::B(connect_and_greet(
                Io::connect_secure(&addr, tls_config),
                ehlo,
                timeout,
            ))),
            Security::StartTls(tls_config) => {
                let TlsConfig { domain, setup } = tls_config;
                let ehlo_again = ehlo.clone();
                let fut = connect_and_greet(Io::connect_insecure(&addr), ehlo, timeout)
                    .and_then(|con| send_setup_cmd(con, StartTls::new_with_tls_setup(domain, setup)))
                    .and_then(|con| send_setup_cmd(con, ehlo_again));
                Either::B(fut)
            }
        };

        let fut = fut.and_then(|con| {
            con.send(auth_cmd)
                .then(|res| cmd_future2connecting_future(res, ConnectingFailed::Auth))
        });

        Box::new(fut)
    }
}

fn with_timeout<F>(
    fut: F,
    timeout: Option<Duration>,
) -> impl Future<Item = F::Item, Error = ConnectingFailed> + Send
where
    F: Future<Error = std_io::Error> + Send,
{
    let fut = match timeout {
        Some(limit) => Either::A(Timeout::new(fut, limit).map_err(|err| {
            if err.is_elapsed() {
                std_io::Error::new(std_io::ErrorKind::TimedOut, "connecting timed out")
            } else {
                err.into_inner().unwrap_or_else(|| {
                    std_io::Error::new(std_io::ErrorKind::Other, "timer failed")
                })
            }
        })),
        None => Either::B(fut),
    };

    fut.map_err(ConnectingFailed::Io)
}

/// waits for the servers greeting and then sends `EHLO`
fn connect_and_greet(
    connecting: ConnectingIo,
    ehlo: Ehlo,
    timeout: Option<Duration>,
) -> impl Future<Item = Connection, Error = ConnectingFailed> + Send {
    with_timeout(connecting.and_then(Io::parse_response), timeout)
        .and_then(move |(io, res)| {
            let con = Connection::from(io).with_timeout(timeout);
            cmd_future2connecting_future(Ok::<_, ConnectingFailed>((con, res)), ConnectingFailed::Setup)
        })
        .and_then(move |con| send_setup_cmd(con, ehlo))
}

fn send_setup_cmd<C>(
    con: Connection,
    cmd: C,
) -> impl Future<Item = Connection, Error = ConnectingFailed> + Send
where
    C: Cmd,
{
    con.send(cmd)
        .then(|res| cmd_future2connecting_future(res, ConnectingFailed::Setup))
}

/// configure what kind of security is used
#[derive(Debug, Clone, PartialEq)]
pub enum Security<S>
where
    S: SetupTls,
{
    /// use a plain non encrypted connection
    #[deprecated(
        since = "0.0.0",
        note = "it's strongly discourage to use unencrypted connections for private information/auth etc."
    )]
    None,
    /// directly connect with TCP-TLS to smtp server
    DirectTls(TlsConfig<S>),
    /// connect with just TCP and then start TLS with the STARTTLS command
    StartTls(TlsConfig<S>),
}

/// Configuration specifying how to setup an SMTP connection.
///
/// Use the `ConnectionBuilder` to crate it.
/// (Expect if you need a unencrypted connection for testing, in which
///  case use `ConnectionConfig::builder_local_unencrypted`).
///
/// # Example
///
/// ```no_run
/// use tokio_smtp_transmit::{ConnectionBuilder, Domain};
/// use tokio_smtp_transmit::command::auth::Plain;
///
/// // STARTTLS, port 587 and the ip gotten from resolving
/// // the passed in domain/host name as well as the hostname
/// // as client identity.
/// let host = "smtp.1aim.test".parse::<Domain>()
///     .expect("malformed domain/host name");
/// let config = ConnectionBuilder::new(host)
///     .expect("could not resolve host name")
///     .auth(Plain::from_username("user", "password").expect("null byte in credentials"))
///     .timeout(Some(std::time::Duration::from_secs(30)))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig<A, S = DefaultTlsSetup>
where
    S: SetupTls,
    A: Cmd,
{
    /// the address and port to connect to (i.e. the ones of the smtp server)
    pub addr: SocketAddr,
    /// a command used for authentication (use NOOP if you don't auth)
    pub auth_cmd: A,
    /// the kind of TLS mechanism used when setting up the connection
    pub security: Security<S>,
    /// the client identity, i.e. your "identity"
    pub client_id: ClientId,
    /// How strict error handling is done.
    pub syntax_error_handling: SyntaxErrorHandling,
    /// time limit for each command (`None` means no limit)
    pub timeout: Option<Duration>,
}

/// Which method should be used to handle syntax errors.
///
/// (currently only affects the ehlo command during connection setup)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd)]
pub enum SyntaxErrorHandling {
    /// Fail on malformed ehlo lines.
    Strict,
    /// Ignore malformed ehlo lines.
    Lax,
}

impl Default for SyntaxErrorHandling {
    fn default() -> Self {
        SyntaxErrorHandling::Lax
    }
}

impl<A, S> ConnectionConfig<A, S>
where
    A: Cmd,
    S: SetupTls,
{
    /// Calls `Connection::connect(self)`.
    pub fn connect(self) -> ConnectingFuture {
        Connection::connect(self)
    }
}

impl ConnectionConfig<Noop, DefaultTlsSetup> {
    /// Creates a connection to `127.0.0.1` without any form of encryption.
    ///
    /// While this is possible **it is not a good idea use this
    /// for anything but test setups**.
    pub fn builder_local_unencrypted() -> LocalNonSecureBuilder<Noop> {
        LocalNonSecureBuilder {
            client_id: None,
            port: DEFAULT_SMTP_MSA_PORT,
            auth_cmd: Noop,
            syntax_error_handling: Default::default(),
            timeout: None,
        }
    }

    pub fn builder(host: Domain) -> Result<ConnectionBuilder<Noop, DefaultTlsSetup>, std_io::Error> {
        ConnectionBuilder::new(host)
    }

    pub fn builder_with_port(
        host: Domain,
        port: u16,
    ) -> Result<ConnectionBuilder<Noop, DefaultTlsSetup>, std_io::Error> {
        ConnectionBuilder::new_with_port(host, port)
    }

    pub fn builder_with_addr(
        addr: SocketAddr,
        domain: Domain,
    ) -> ConnectionBuilder<Noop, DefaultTlsSetup> {
        ConnectionBuilder::new_with_addr(addr, domain)
    }
}

/// Builder for an `ConnectionConfig` for an unencrypted smtp connection.
///
/// **Should only be used for test setups**
#[derive(Debug)]
pub struct LocalNonSecureBuilder<A>
where
    A: Cmd,
{
    client_id: Option<ClientId>,
    port: u16,
    auth_cmd: A,
    syntax_error_handling: SyntaxErrorHandling,
    timeout: Option<Duration>,
}

impl<A> LocalNonSecureBuilder<A>
where
    A: Cmd,
{
    /// overrides the port to use (default: `DEFAULT_SMTP_MSA_PORT`)
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// overrides the client id to use (default: `ClientId::hostname()`)
    pub fn client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// sets the auth command to use (default no authentication)
    pub fn auth<NA>(self, auth_cmd: NA) -> LocalNonSecureBuilder<NA>
    where
        NA: Cmd,
    {
        let LocalNonSecureBuilder {
            client_id,
            port,
            auth_cmd: _,
            syntax_error_handling,
            timeout,
        } = self;

        LocalNonSecureBuilder {
            client_id,
            port,
            auth_cmd,
            syntax_error_handling,
            timeout,
        }
    }

    /// Sets which SyntaxErrorHandling is used during connection setup.
    pub fn syntax_error_handling(mut self, method: SyntaxErrorHandling) -> Self {
        self.syntax_error_handling = method;
        self
    }

    /// Sets the per command timeout (default: no timeout).
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// builds the connection config
    pub fn build(self) -> ConnectionConfig<A, DefaultTlsSetup> {
        let LocalNonSecureBuilder {
            client_id,
            port,
            auth_cmd,
            syntax_error_handling,
            timeout,
        } = self;

        let client_id = client_id.unwrap_or_else(ClientId::hostname);
        let addr = SocketAddr::new(Ipv4Addr::new(127, 0, 0, 1).into(), port);

        #[allow(deprecated)]
        let security = Security::None;

        ConnectionConfig {
            addr,
            client_id,
            auth_cmd,
            security,
            syntax_error_handling,
            timeout,
        }
    }
}

/// Builder for an `ConnectionConfig` for a encrypted smtp connection.
#[derive(Debug)]
pub struct ConnectionBuilder<A, S = DefaultTlsSetup>
where
    S: SetupTls,
    A: Cmd,
{
    client_id: Option<ClientId>,
    addr: SocketAddr,
    domain: Domain,
    setup_tls: S,
    use_security: UseSecurity,
    auth_cmd: A,
    syntax_error_handling: SyntaxErrorHandling,
    timeout: Option<Duration>,
}

impl ConnectionBuilder<Noop, DefaultTlsSetup> {
    /// Create a new `ConnectionBuilder` based on a domain name/host name.
    ///
    /// The used port will be `DEFAULT_SMTP_MSA_PORT` i.e. 587.
    ///
    /// # Error
    ///
    /// `std::net::ToSocketAddrs` is used internally and can cause an
    /// io error, e.g. if it can not resolve an address for the given
    /// host name.
    pub fn new(host: Domain) -> Result<Self, std_io::Error> {
        Self::new_with_port(host, DEFAULT_SMTP_MSA_PORT)
    }

    /// Create a new `ConnectionBuilder` based on a domain name/host name and port.
    ///
    /// # Error
    ///
    /// `std::net::ToSocketAddrs` is used internally and can cause an
    /// io error, e.g. if it can not resolve an address for the given
    /// host name.
    pub fn new_with_port(host: Domain, port: u16) -> Result<Self, std_io::Error> {
        let addr = get_addr((host.as_str(), port))?;
        Ok(Self::new_with_addr(addr, host))
    }

    /// Crate a new `ConnectionBuilder` based on a ip address, port and domain name.
    ///
    /// The domain name is used for Server Name Identification (SNI) and
    /// Tls hostname verification (hostname of the server).
    pub fn new_with_addr(addr: SocketAddr, domain: Domain) -> Self {
        ConnectionBuilder {
            addr,
            domain,
            use_security: UseSecurity::StartTls,
            client_id: None,
            setup_tls: DefaultTlsSetup,
            auth_cmd: Noop,
            syntax_error_handling: Default::default(),
            timeout: None,
        }
    }
}

impl<A, S> ConnectionBuilder<A, S>
where
    S: SetupTls,
    A: Cmd,
{
    /// Use a different `TlsSetup` implementation.
    ///
    /// This can be used if an advanced Tls configuration is needed,
    /// e.g. to change the min protocol version or add a root certificate.
    pub fn use_tls_setup<S2: SetupTls>(self, setup: S2) -> ConnectionBuilder<A, S2> {
        let ConnectionBuilder {
            addr,
            domain,
            use_security,
            client_id,
            setup_tls: _,
            auth_cmd,
            syntax_error_handling,
            timeout,
        } = self;

        ConnectionBuilder {
            addr,
            domain,
            use_security,
            client_id,
            setup_tls: setup,
            auth_cmd,
            syntax_error_handling,
            timeout,
        }
    }

    /// Present the given client certificate during the tls handshake.
    ///
    /// This replaces any tls setup set before.
    pub fn client_certificate(
        self,
        certificate: ClientCertificate,
    ) -> ConnectionBuilder<A, ClientCertificate> {
        self.use_tls_setup(certificate)
    }

    /// Make the builder use `STARTTLS` security when building.
    pub fn use_start_tls(mut self) -> Self {
        self.use_security = UseSecurity::StartTls;
        self
    }

    /// Make the builder use direct tls security when building.
    ///
    /// This is sometimes known as "wrapped" mode and often
    /// requires a different port (e.g. 465).
    pub fn use_direct_tls(mut self) -> Self {
        self.use_security = UseSecurity::DirectTls;
        self
    }

    /// Set the command to use for authentication.
    ///
    /// If this function is not called `Noop` is used,
    /// i.e. no authentication is done.
    pub fn auth<NA: Cmd>(self, auth_cmd: NA) -> ConnectionBuilder<NA, S> {
        let ConnectionBuilder {
            addr,
            domain,
            use_security,
            client_id,
            setup_tls,
            auth_cmd: _,
            syntax_error_handling,
            timeout,
        } = self;

        ConnectionBuilder {
            addr,
            domain,
            use_security,
            client_id,
            setup_tls,
            auth_cmd,
            syntax_error_handling,
            timeout,
        }
    }

    /// Set's the client identity to the given identity.
    ///
    /// (The default is to use `ClientId::hostname()`)
    pub fn client_id(mut self, id: ClientId) -> Self {
        self.client_id = Some(id);
        self
    }

    /// Set's if syntax errors are handled lax or strict when setting up a connection.
    pub fn syntax_error_handling(mut self, method: SyntaxErrorHandling) -> Self {
        self.syntax_error_handling = method;
        self
    }

    /// Sets the per command timeout (default: no timeout).
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Creates a new connection config.
    ///
    /// If not specified differently, then
    ///
    /// - `ClientId::hostname()` is used as `ClientId`
    /// - `Noop` is used as authentication command, i.e. no auth is done
    /// - `StartTls` is used as security method
    /// - `DefaultTlsSetup` is used for setting up tls (i.e. no special options are set)
    /// - no timeout is used
    pub fn build(self) -> ConnectionConfig<A, S> {
        let ConnectionBuilder {
            addr,
            domain,
            use_security,
            client_id,
            setup_tls: setup,
            auth_cmd,
            syntax_error_handling,
            timeout,
        } = self;

        let tls_config = TlsConfig { domain, setup };
        let security = match use_security {
            UseSecurity::StartTls => Security::StartTls(tls_config),
            UseSecurity::DirectTls => Security::DirectTls(tls_config),
        };

        let client_id = client_id.unwrap_or_else(ClientId::hostname);

        ConnectionConfig {
            addr,
            security,
            auth_cmd,
            client_id,
            syntax_error_handling,
            timeout,
        }
    }
}

#[derive(Debug)]
enum UseSecurity {
    StartTls,
    DirectTls,
}

fn get_addr(tsas: impl ToSocketAddrs + Copy + Debug) -> Result<SocketAddr, std_io::Error> {
    if let Some(addr) = tsas.to_socket_addrs()?.next() {
        Ok(addr)
    } else {
        Err(std_io::Error::new(
            std_io::ErrorKind::AddrNotAvailable,
            format!("{:?} is not associated with any socket address", tsas),
        ))
    }
}
