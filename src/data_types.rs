use std::borrow::Borrow;
use std::error::Error;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::Deref;
use std::str::FromStr;

/// represents a smtp extension/capability indicated through ehlo
///
/// The keyword is stored in uppercase, which allows looking capabilities
/// up by `&str` once the query was uppercased (see `EhloData::has_capability`).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Capability(EsmtpKeyword);

impl Deref for Capability {
    type Target = EsmtpKeyword;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// EsmtpKeyword is a newtype around a String so the derived `Hash`
// hashes exactly like the `str` it borrows as.
impl Borrow<str> for Capability {
    fn borrow(&self) -> &str {
        (self.0).0.as_str()
    }
}

impl From<EsmtpKeyword> for Capability {
    fn from(keyword: EsmtpKeyword) -> Self {
        Capability(keyword)
    }
}

impl FromStr for Capability {
    type Err = SyntaxError;

    fn from_str(inp: &str) -> Result<Self, Self::Err> {
        EsmtpKeyword::from_str(inp).map(Capability)
    }
}

/// represents an EsmtpKeyword (syntax construct in ehlo response and mail parameters)
///
/// Keywords are case insensitive, they are normalized to uppercase.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct EsmtpKeyword(String);

/// represents an EsmtpValue (the value part of a `MAIL`/`RCPT` parameter)
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct EsmtpValue(String);

/// represents an parameter of a capability in the ehlo response
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct EhloParam(String);

/// represents a `Domain`
///
/// Domains compare ascii case insensitive. Non ascii domains are
/// expected to be puny encoded.
#[derive(Debug, Clone, Eq)]
pub struct Domain(String);

/// represents a `AddressLiteral` e.g. `[127.0.0.1]`
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct AddressLiteral(String);

/// represents a forward path, most times this is just a mail address
///
/// Note that this type is not supposed to contain the surrounding `'<'` and `'>'`.
/// They will be added automatically.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ForwardPath(String);

/// represents a reverse path, most times this is just a mail address
///
/// Note that this type is not supposed to contain the surrounding `'<'` and `'>'`.
/// They will be added automatically. It can be empty representing the
/// null reverse path `<>`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ReversePath(String);

macro_rules! impl_str_wrapper {
    ($($name:ident),*) => ($(

        impl $name {
            /// return the inner representation as `&str`
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// create a new instance from a string without validating the input
            pub fn from_unchecked<I>(data: I) -> Self
                where I: Into<String>
            {
                $name(data.into())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(val: $name) -> String {
                val.0
            }
        }

        impl<'a> PartialEq<&'a str> for $name {
            fn eq(&self, other: &&'a str) -> bool {
                self == *other
            }
        }

        impl Display for $name {
            fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
                fter.write_str(&self.0)
            }
        }
    )*);
}

impl_str_wrapper!(
    Domain,
    EhloParam,
    AddressLiteral,
    EsmtpKeyword,
    EsmtpValue,
    ForwardPath,
    ReversePath
);

macro_rules! impl_case_sensitive_eq {
    ($($name:ident),*) => ($(
        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }
    )*);
}

impl_case_sensitive_eq!(EhloParam, AddressLiteral, EsmtpValue, ForwardPath, ReversePath);

impl PartialEq<str> for EsmtpKeyword {
    fn eq(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl PartialEq for Domain {
    fn eq(&self, other: &Domain) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl PartialEq<str> for Domain {
    fn eq(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl Hash for Domain {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for bch in self.0.bytes() {
            state.write_u8(bch.to_ascii_lowercase());
        }
    }
}

impl ReversePath {
    /// creates an empty reverse path
    ///
    /// In a mail command this will lead to `"MAIL FROM:<>"`.
    ///
    /// ```
    /// use tokio_smtp_transmit::ReversePath;
    ///
    /// let rpath = ReversePath::empty();
    /// assert_eq!(rpath.as_str(), "");
    /// ```
    pub fn empty() -> Self {
        ReversePath(String::new())
    }
}

impl FromStr for EhloParam {
    type Err = SyntaxError;

    fn from_str(inp: &str) -> Result<Self, Self::Err> {
        let valid = inp.bytes().all(|bch| 33 <= bch && bch <= 126);

        if valid {
            Ok(EhloParam(inp.into()))
        } else {
            Err(SyntaxError::EhloParam(inp.into()))
        }
    }
}

impl EsmtpKeyword {
    /// create a new `EsmtpKeyword` validating it
    ///
    /// The keyword is turned into uppercase.
    pub fn new<I>(val: I) -> Result<Self, SyntaxError>
    where
        I: Into<String>,
    {
        let mut val = val.into();
        let valid = {
            let mut iter = val.chars();
            iter.next()
                .map(|ch| ch.is_ascii_alphanumeric())
                .unwrap_or(false)
                && iter.all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        };

        if valid {
            val.make_ascii_uppercase();
            Ok(EsmtpKeyword(val))
        } else {
            Err(SyntaxError::EsmtpKeyword(val))
        }
    }
}

impl FromStr for EsmtpKeyword {
    type Err = SyntaxError;

    fn from_str(inp: &str) -> Result<Self, Self::Err> {
        EsmtpKeyword::new(inp)
    }
}

impl EsmtpValue {
    /// create a new `EsmtpValue` validating it
    ///
    /// (any printable ascii char except `'='` and space is allowed)
    pub fn new<I>(val: I) -> Result<Self, SyntaxError>
    where
        I: Into<String>,
    {
        let val = val.into();
        let valid = !val.is_empty()
            && val
                .bytes()
                .all(|bch| 33 <= bch && bch <= 126 && bch != b'=');

        if valid {
            Ok(EsmtpValue(val))
        } else {
            Err(SyntaxError::EsmtpValue(val))
        }
    }
}

impl FromStr for EsmtpValue {
    type Err = SyntaxError;

    fn from_str(inp: &str) -> Result<Self, Self::Err> {
        EsmtpValue::new(inp)
    }
}

impl Domain {
    /// creates a new domain without validating it's correctness
    pub fn new_unchecked(domain: String) -> Self {
        Domain(domain)
    }
}

impl FromStr for Domain {
    type Err = SyntaxError;

    fn from_str(inp: &str) -> Result<Self, Self::Err> {
        let valid = !inp.is_empty() && inp.split('.').all(validate_subdomain);

        if valid {
            Ok(Domain(inp.to_lowercase()))
        } else {
            Err(SyntaxError::Domain(inp.into()))
        }
    }
}

fn validate_subdomain(inp: &str) -> bool {
    let binp = inp.as_bytes();
    match binp.len() {
        0 => false,
        1 => binp[0].is_ascii_alphanumeric(),
        len => {
            binp[0].is_ascii_alphanumeric()
                && binp[1..len - 1]
                    .iter()
                    .all(|bch| bch.is_ascii_alphanumeric() || *bch == b'-')
                && binp[len - 1].is_ascii_alphanumeric()
        }
    }
}

impl From<IpAddr> for AddressLiteral {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(addr) => AddressLiteral::from(addr),
            IpAddr::V6(addr) => AddressLiteral::from(addr),
        }
    }
}

impl From<Ipv4Addr> for AddressLiteral {
    fn from(addr: Ipv4Addr) -> Self {
        AddressLiteral(format!("[{}]", addr))
    }
}

impl From<Ipv6Addr> for AddressLiteral {
    fn from(addr: Ipv6Addr) -> Self {
        AddressLiteral(format!("[IPv6:{}]", addr))
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum SyntaxError {
    Domain(String),
    EhloParam(String),
    EsmtpValue(String),
    EsmtpKeyword(String),
}

impl Display for SyntaxError {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        use self::SyntaxError::*;
        match self {
            Domain(bad) => write!(fter, "syntax error parsing Domain in {:?}", bad),
            EhloParam(bad) => write!(fter, "syntax error parsing EhloParam in {:?}", bad),
            EsmtpKeyword(bad) => write!(fter, "syntax error parsing esmtp-keyword in {:?}", bad),
            EsmtpValue(bad) => write!(fter, "syntax error parsing esmtp-value in {:?}", bad),
        }
    }
}

impl Error for SyntaxError {}
