use crate::{
    error::MissingCapabilities, Capability, Cmd, EhloData, EsmtpKeyword, EsmtpValue, ExecFuture,
    ForwardPath, Io, ReversePath,
};

/// Parameters of `MAIL`/`RCPT`, send in the order they were added
pub type Params = Vec<(EsmtpKeyword, Option<EsmtpValue>)>;

/// MAIL FROM, starts a mail transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    reverse_path: ReversePath,
    params: Params,
}

impl Mail {
    pub fn new(reverse_path: ReversePath) -> Self {
        Mail {
            reverse_path,
            params: Params::new(),
        }
    }

    /// adds a parameter, e.g. `SMTPUTF8` or `BODY=8BITMIME`
    ///
    /// Keywords which are also capabilities (like `SMTPUTF8`) are checked
    /// against the servers ehlo data before sending the command.
    pub fn with_param(mut self, keyword: EsmtpKeyword, value: Option<EsmtpValue>) -> Self {
        self.params.push((keyword, value));
        self
    }

    pub fn reverse_path(&self) -> &ReversePath {
        &self.reverse_path
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl Cmd for Mail {
    fn check_cmd_availability(&self, caps: Option<&EhloData>) -> Result<(), MissingCapabilities> {
        let missing = self
            .params
            .iter()
            .filter_map(|(keyword, value)| required_capability(keyword, value.as_ref()))
            .filter(|cap| !caps.map(|ehlo| ehlo.has_capability(cap)).unwrap_or(false))
            .map(|cap| Capability::from(EsmtpKeyword::from_unchecked(cap)))
            .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingCapabilities::new(missing))
        }
    }

    fn exec(self, io: Io) -> ExecFuture {
        let params = format_params(&self.params);
        io.exec_simple_cmd(&["MAIL FROM:<", self.reverse_path.as_str(), ">", params.as_str()])
    }
}

/// RCPT TO, adds a recipient to the current mail transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    forward_path: ForwardPath,
    params: Params,
}

impl Recipient {
    pub fn new(forward_path: ForwardPath) -> Self {
        Recipient {
            forward_path,
            params: Params::new(),
        }
    }

    /// adds a parameter, e.g. `NOTIFY=SUCCESS,FAILURE`
    pub fn with_param(mut self, keyword: EsmtpKeyword, value: Option<EsmtpValue>) -> Self {
        self.params.push((keyword, value));
        self
    }

    pub fn forward_path(&self) -> &ForwardPath {
        &self.forward_path
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl Cmd for Recipient {
    fn check_cmd_availability(&self, caps: Option<&EhloData>) -> Result<(), MissingCapabilities> {
        let needs_dsn = self
            .params
            .iter()
            .any(|(keyword, _)| *keyword == "NOTIFY" || *keyword == "ORCPT");

        if needs_dsn && !caps.map(|ehlo| ehlo.has_capability("DSN")).unwrap_or(false) {
            Err(MissingCapabilities::new_from_unchecked("DSN"))
        } else {
            Ok(())
        }
    }

    fn exec(self, io: Io) -> ExecFuture {
        let params = format_params(&self.params);
        io.exec_simple_cmd(&["RCPT TO:<", self.forward_path.as_str(), ">", params.as_str()])
    }
}

/// the capability a `MAIL` parameter depends on (if any)
fn required_capability(keyword: &EsmtpKeyword, value: Option<&EsmtpValue>) -> Option<&'static str> {
    if *keyword == "SMTPUTF8" {
        Some("SMTPUTF8")
    } else if *keyword == "BODY" && value.map(|val| val.as_str().eq_ignore_ascii_case("8BITMIME")).unwrap_or(false) {
        Some("8BITMIME")
    } else if *keyword == "RET" || *keyword == "ENVID" {
        Some("DSN")
    } else {
        None
    }
}

/// formats the parameters including a leading space, `""` if there are none
fn format_params(params: &Params) -> String {
    let mut out = String::new();
    for (keyword, value) in params {
        out.push(' ');
        out.push_str(keyword.as_str());
        if let Some(value) = value {
            out.push('=');
            out.push_str(value.as_str());
        }
    }
    out
}
