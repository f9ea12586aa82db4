use std::collections::HashMap;
use std::io as std_io;

use futures::Future;

use crate::{
    error::MissingCapabilities, AddressLiteral, Capability, ClientId, Cmd, Domain, EhloData, EhloParam,
    ExecFuture, Io, Response, SyntaxError, SyntaxErrorHandling,
};

/// EHLO, identifies the client and requests the servers capabilities
///
/// On success the parsed capabilities are stored in the `Io`, replacing
/// any previous ehlo data (e.g. from before STARTTLS).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Ehlo {
    identity: ClientIdentity,
    syntax_error_handling: SyntaxErrorHandling,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum ClientIdentity {
    Domain(Domain),
    AddressLiteral(AddressLiteral),
}

impl Ehlo {
    pub fn new(client_id: ClientId) -> Self {
        let identity = match client_id {
            ClientId::Domain(domain) => ClientIdentity::Domain(domain),
            ClientId::AddressLiteral(addr) => ClientIdentity::AddressLiteral(addr),
        };

        Ehlo {
            identity,
            syntax_error_handling: Default::default(),
        }
    }

    /// sets how malformed capability lines are handled
    pub fn with_syntax_error_handling(mut self, method: SyntaxErrorHandling) -> Self {
        self.syntax_error_handling = method;
        self
    }

    fn identity_str(&self) -> &str {
        match &self.identity {
            ClientIdentity::Domain(domain) => domain.as_str(),
            ClientIdentity::AddressLiteral(addr) => addr.as_str(),
        }
    }
}

impl From<ClientId> for Ehlo {
    fn from(client_id: ClientId) -> Self {
        Ehlo::new(client_id)
    }
}

impl Cmd for Ehlo {
    fn check_cmd_availability(&self, _caps: Option<&EhloData>) -> Result<(), MissingCapabilities> {
        Ok(())
    }

    fn exec(self, io: Io) -> ExecFuture {
        let syntax_error_handling = self.syntax_error_handling.clone();
        let fut = io
            .exec_simple_cmd(&["EHLO ", self.identity_str()])
            .and_then(move |(mut io, result)| match result {
                Err(err) => Ok((io, Err(err))),
                Ok(response) => {
                    let ehlo = parse_ehlo_response(&response, &syntax_error_handling)
                        .map_err(|err| std_io::Error::new(std_io::ErrorKind::InvalidData, err))?;
                    io.set_ehlo_data(ehlo);
                    Ok((io, Ok(response)))
                }
            });

        Box::new(fut)
    }
}

fn parse_ehlo_response(
    response: &Response,
    syntax_error_handling: &SyntaxErrorHandling,
) -> Result<EhloData, SyntaxError> {
    let strict = *syntax_error_handling == SyntaxErrorHandling::Strict;
    let lines = response.msg();
    let first = lines.first().map(String::as_str).unwrap_or("");
    let domain_part = first.split(' ').next().unwrap_or("");
    let domain = match domain_part.parse::<Domain>() {
        Ok(domain) => domain,
        Err(err) => {
            if strict {
                return Err(err);
            }
            Domain::new_unchecked(domain_part.to_owned())
        }
    };

    let mut caps = HashMap::new();
    for line in lines.iter().skip(1) {
        let mut parts = line.split(' ').filter(|part| !part.is_empty());
        let capability = match parts.next() {
            Some(cap) => cap,
            None => continue,
        };

        let parsed = capability.parse::<Capability>().and_then(|capability| {
            let params = parts
                .map(str::parse)
                .collect::<Result<Vec<EhloParam>, _>>()?;
            Ok((capability, params))
        });

        match parsed {
            Ok((capability, params)) => {
                caps.insert(capability, params);
            }
            Err(err) => {
                if strict {
                    return Err(err);
                }
                #[cfg(feature = "log")]
                log_facade::warn!("ignoring malformed ehlo line {:?}: {}", line, err);
            }
        }
    }

    Ok(EhloData::new(domain, caps))
}
