use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::io as std_io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use hostname::get_hostname;
use native_tls::{self, Identity, TlsConnector, TlsConnectorBuilder};

use crate::data_types::{AddressLiteral, Capability, Domain, EhloParam};

/// The id of the client used in EHLO
#[derive(Debug, Clone, PartialEq)]
pub enum ClientId {
    Domain(Domain),
    AddressLiteral(AddressLiteral),
}

impl ClientId {
    /// creates a client identity based on the hostname of this machine
    ///
    /// falls back to `localhost` if the hostname can not be determined
    pub fn hostname() -> ClientId {
        let name = get_hostname().unwrap_or_else(|| "localhost".to_owned());
        ClientId::Domain(Domain::new_unchecked(name))
    }
}

impl From<Domain> for ClientId {
    fn from(dm: Domain) -> Self {
        ClientId::Domain(dm)
    }
}

impl From<AddressLiteral> for ClientId {
    fn from(adl: AddressLiteral) -> Self {
        ClientId::AddressLiteral(adl)
    }
}

impl From<IpAddr> for ClientId {
    fn from(addr: IpAddr) -> Self {
        ClientId::AddressLiteral(addr.into())
    }
}

impl From<Ipv4Addr> for ClientId {
    fn from(addr: Ipv4Addr) -> Self {
        ClientId::AddressLiteral(addr.into())
    }
}

impl From<Ipv6Addr> for ClientId {
    fn from(addr: Ipv6Addr) -> Self {
        ClientId::AddressLiteral(addr.into())
    }
}

/// The domain used for SNI/hostname verification combined with a way to setup the tls connector
#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig<S = DefaultTlsSetup>
where
    S: SetupTls,
{
    pub domain: Domain,
    pub setup: S,
}

impl From<Domain> for TlsConfig {
    fn from(domain: Domain) -> Self {
        TlsConfig {
            domain,
            setup: DefaultTlsSetup,
        }
    }
}

/// Hook to configure the `TlsConnector` before connecting
pub trait SetupTls: Debug + Send + 'static {
    fn setup(self, builder: TlsConnectorBuilder) -> Result<TlsConnector, native_tls::Error>;
}

/// Builds the connector without changing any settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultTlsSetup;

impl SetupTls for DefaultTlsSetup {
    fn setup(self, builder: TlsConnectorBuilder) -> Result<TlsConnector, native_tls::Error> {
        builder.build()
    }
}

impl<F> SetupTls for F
where
    F: Debug + Send + 'static + FnOnce(&mut TlsConnectorBuilder),
{
    fn setup(self, mut builder: TlsConnectorBuilder) -> Result<TlsConnector, native_tls::Error> {
        (self)(&mut builder);
        builder.build()
    }
}

/// Tls setup presenting a client certificate to the server
#[derive(Clone)]
pub struct ClientCertificate {
    identity: Identity,
}

impl ClientCertificate {
    pub fn new(identity: Identity) -> Self {
        ClientCertificate { identity }
    }

    /// loads the identity from a DER-formatted PKCS #12 archive
    pub fn from_pkcs12(der: &[u8], password: &str) -> Result<Self, native_tls::Error> {
        let identity = Identity::from_pkcs12(der, password)?;
        Ok(ClientCertificate { identity })
    }
}

impl Debug for ClientCertificate {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        fter.write_str("ClientCertificate { .. }")
    }
}

impl SetupTls for ClientCertificate {
    fn setup(self, mut builder: TlsConnectorBuilder) -> Result<TlsConnector, native_tls::Error> {
        builder.identity(self.identity);
        builder.build()
    }
}

//FIXME[rust/catch]: use catch once in stable
macro_rules! alttry {
    ($block:block => $emap:expr) => ({
        let func = move || -> Result<_, _> { $block };
        match func() {
            Ok(ok)  => ok,
            Err(err) => return ($emap)(err)
        }
    });
}

pub(crate) fn map_tls_err(err: native_tls::Error) -> std_io::Error {
    std_io::Error::new(std_io::ErrorKind::Other, err)
}

/// The data returned by the server as response to EHLO
#[derive(Debug, Clone)]
pub struct EhloData {
    domain: Domain,
    data: HashMap<Capability, Vec<EhloParam>>,
}

impl EhloData {
    pub fn new(domain: Domain, data: HashMap<Capability, Vec<EhloParam>>) -> Self {
        EhloData { domain, data }
    }

    /// true if the capability was announced (ignores ascii case)
    pub fn has_capability<A>(&self, cap: A) -> bool
    where
        A: AsRef<str>,
    {
        let cap = cap.as_ref().to_ascii_uppercase();
        self.data.contains_key(cap.as_str())
    }

    pub fn get_capability_params<A>(&self, cap: A) -> Option<&[EhloParam]>
    where
        A: AsRef<str>,
    {
        let cap = cap.as_ref().to_ascii_uppercase();
        self.data.get(cap.as_str()).map(|vec| &**vec)
    }

    pub fn capability_map(&self) -> &HashMap<Capability, Vec<EhloParam>> {
        &self.data
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }
}

impl From<EhloData> for (Domain, HashMap<Capability, Vec<EhloParam>>) {
    fn from(ehlo: EhloData) -> Self {
        let EhloData { domain, data } = ehlo;
        (domain, data)
    }
}
