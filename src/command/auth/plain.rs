use std::error::Error as ErrorTrait;
use std::fmt::{self, Display};
use std::sync::Arc;

use base64::encode;

use crate::{error::MissingCapabilities, Cmd, EhloData, ExecFuture, Io};

use super::validate_auth_capability;

/// AUTH PLAIN smtp authentication based on rfc4954/rfc4616
#[derive(Clone)]
pub struct Plain {
    authorization_identity: String,
    authentication_identity: String,
    password: String,
}

impl Plain {
    /// Create a auth plain command from a given username and password.
    pub fn from_username<I1, I2>(user: I1, password: I2) -> Result<Self, NullCodePointError>
    where
        I1: Into<String> + AsRef<str>,
        I2: Into<String> + AsRef<str>,
    {
        let user = user.into();
        Plain::new(user.clone(), user, password)
    }

    /// Create a auth plain command from a authorization identity a authentication identity and a password.
    pub fn new<I1, I2, I3>(
        authorization_identity: I1,
        authentication_identity: I2,
        password: I3,
    ) -> Result<Self, NullCodePointError>
    where
        I1: Into<String> + AsRef<str>,
        I2: Into<String> + AsRef<str>,
        I3: Into<String> + AsRef<str>,
    {
        validate_no_null_cps(&authorization_identity)?;
        validate_no_null_cps(&authentication_identity)?;
        validate_no_null_cps(&password)?;

        Ok(Plain {
            authentication_identity: authentication_identity.into(),
            authorization_identity: authorization_identity.into(),
            password: password.into(),
        })
    }

    pub fn authorization_identity(&self) -> &str {
        &self.authorization_identity
    }

    pub fn authentication_identity(&self) -> &str {
        &self.authentication_identity
    }

    fn auth_string(&self) -> String {
        encode(&format!(
            "{}\0{}\0{}",
            &self.authorization_identity, &self.authentication_identity, &self.password
        ))
    }

    fn exec_ref(&self, io: Io) -> ExecFuture {
        let auth_str = self.auth_string();
        io.exec_simple_cmd(&["AUTH PLAIN ", auth_str.as_str()])
    }
}

// never print the password
impl fmt::Debug for Plain {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        fter.debug_struct("Plain")
            .field("authorization_identity", &self.authorization_identity)
            .field("authentication_identity", &self.authentication_identity)
            .finish()
    }
}

impl Cmd for Plain {
    fn check_cmd_availability(&self, caps: Option<&EhloData>) -> Result<(), MissingCapabilities> {
        validate_auth_capability(caps, "PLAIN")
    }

    fn exec(self, io: Io) -> ExecFuture {
        self.exec_ref(io)
    }
}

/// allows reusing the credentials for multiple connections without cloning them
impl Cmd for Arc<Plain> {
    fn check_cmd_availability(&self, caps: Option<&EhloData>) -> Result<(), MissingCapabilities> {
        validate_auth_capability(caps, "PLAIN")
    }

    fn exec(self, io: Io) -> ExecFuture {
        self.exec_ref(io)
    }
}

fn validate_no_null_cps<R>(inp: R) -> Result<(), NullCodePointError>
where
    R: AsRef<str>,
{
    if inp.as_ref().bytes().any(|bch| bch == b'\0') {
        Err(NullCodePointError)
    } else {
        Ok(())
    }
}

/// Error returned by auth plain if identity or password contained a null code point.
#[derive(Copy, Clone, Debug)]
pub struct NullCodePointError;

impl Display for NullCodePointError {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        write!(fter, "input (username/password) contained null byte")
    }
}

impl ErrorTrait for NullCodePointError {}
