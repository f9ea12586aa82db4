//! The envelope of a mail: who sends it, to whom and how
use std::fmt::{self, Display};

use vec1::Vec1;

use crate::command::{Mail, Recipient};
use crate::{EsmtpKeyword, EsmtpValue, ForwardPath, ReversePath};

/// A mailbox as used in the envelope
///
/// The address is not validated, it is send as is inside of `<` `>`.
/// Non ascii addresses need the servers `SMTPUTF8` capability.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct MailAddress {
    raw: String,
    needs_smtputf8: bool,
}

impl MailAddress {
    /// create a new address without validating it
    pub fn from_unchecked<I>(raw: I) -> Self
    where
        I: Into<String>,
    {
        let raw = raw.into();
        let needs_smtputf8 = !raw.is_ascii();
        MailAddress {
            raw,
            needs_smtputf8,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// true if the address contains non ascii characters
    pub fn needs_smtputf8(&self) -> bool {
        self.needs_smtputf8
    }
}

impl AsRef<str> for MailAddress {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Display for MailAddress {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        fter.write_str(&self.raw)
    }
}

impl<'a> From<&'a str> for MailAddress {
    fn from(raw: &'a str) -> Self {
        MailAddress::from_unchecked(raw)
    }
}

impl From<String> for MailAddress {
    fn from(raw: String) -> Self {
        MailAddress::from_unchecked(raw)
    }
}

impl From<MailAddress> for ForwardPath {
    fn from(addr: MailAddress) -> Self {
        ForwardPath::from_unchecked(addr.raw)
    }
}

impl From<MailAddress> for ReversePath {
    fn from(addr: MailAddress) -> Self {
        ReversePath::from_unchecked(addr.raw)
    }
}

/// which delivery status notifications are requested (rfc 3461 `NOTIFY`)
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum DeliveryNotification {
    /// don't send a `NOTIFY` parameter, the server decides
    Off,
    /// `NOTIFY=NEVER`
    Never,
    /// `NOTIFY=` with the selected subset (at last one should be set)
    Notify {
        success: bool,
        failure: bool,
        delay: bool,
    },
}

impl Default for DeliveryNotification {
    fn default() -> Self {
        DeliveryNotification::Off
    }
}

impl DeliveryNotification {
    /// the value of the `NOTIFY` parameter, `None` for `Off` (or an empty subset)
    pub fn notify_value(&self) -> Option<EsmtpValue> {
        match *self {
            DeliveryNotification::Off => None,
            DeliveryNotification::Never => Some(EsmtpValue::from_unchecked("NEVER")),
            DeliveryNotification::Notify {
                success,
                failure,
                delay,
            } => {
                let parts = [(success, "SUCCESS"), (failure, "FAILURE"), (delay, "DELAY")]
                    .iter()
                    .filter(|(enabled, _)| *enabled)
                    .map(|(_, name)| *name)
                    .collect::<Vec<_>>();

                if parts.is_empty() {
                    None
                } else {
                    Some(EsmtpValue::from_unchecked(parts.join(",")))
                }
            }
        }
    }
}

/// what the mail body needs from the server
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum EncodingRequirement {
    /// 7bit ascii body, nothing special needed
    None,
    /// body (headers) contain utf8, sends `SMTPUTF8` (implies 8bit)
    Smtputf8,
    /// body is 8bit MIME, sends `BODY=8BITMIME`
    Mime8bit,
}

impl Default for EncodingRequirement {
    fn default() -> Self {
        EncodingRequirement::None
    }
}

/// The envelope of a mail transaction
///
/// It's moved into the transmission and can not be changed while it's
/// used. Recipients are handled in the order they were added.
#[derive(Debug, Clone)]
pub struct Envelope {
    sender: Option<MailAddress>,
    recipients: Vec1<MailAddress>,
    notify: DeliveryNotification,
    body: EncodingRequirement,
}

impl Envelope {
    pub fn new(sender: MailAddress, recipients: Vec1<MailAddress>) -> Self {
        Envelope {
            sender: Some(sender),
            recipients,
            notify: Default::default(),
            body: Default::default(),
        }
    }

    /// creates a envelope with the null reverse path (`MAIL FROM:<>`), e.g. for bounces
    pub fn without_reverse_path(recipients: Vec1<MailAddress>) -> Self {
        Envelope {
            sender: None,
            recipients,
            notify: Default::default(),
            body: Default::default(),
        }
    }

    /// sets which delivery status notifications are requested for all recipients
    pub fn with_notify(mut self, notify: DeliveryNotification) -> Self {
        self.notify = notify;
        self
    }

    /// sets the encoding requirement of the body
    pub fn with_body_encoding(mut self, body: EncodingRequirement) -> Self {
        self.body = body;
        self
    }

    pub fn sender(&self) -> Option<&MailAddress> {
        self.sender.as_ref()
    }

    pub fn recipients(&self) -> &Vec1<MailAddress> {
        &self.recipients
    }

    pub fn notify(&self) -> DeliveryNotification {
        self.notify
    }

    pub fn body_encoding(&self) -> EncodingRequirement {
        self.body
    }

    /// true if any `NOTIFY` setting other then `Off` was selected
    pub fn delivery_notification_requested(&self) -> bool {
        self.notify != DeliveryNotification::Off
    }

    /// true if any address or the body needs `SMTPUTF8`
    pub fn needs_smtputf8(&self) -> bool {
        self.body == EncodingRequirement::Smtputf8
            || self.sender.iter().any(MailAddress::needs_smtputf8)
            || self.recipients.iter().any(MailAddress::needs_smtputf8)
    }

    /// creates the `MAIL` command for this envelope
    pub(crate) fn mail_cmd(&self) -> Mail {
        let reverse_path = self
            .sender
            .clone()
            .map(ReversePath::from)
            .unwrap_or_else(ReversePath::empty);

        let mut mail = Mail::new(reverse_path);
        if self.needs_smtputf8() {
            mail = mail.with_param(EsmtpKeyword::from_unchecked("SMTPUTF8"), None);
        }
        if self.body == EncodingRequirement::Mime8bit {
            mail = mail.with_param(
                EsmtpKeyword::from_unchecked("BODY"),
                Some(EsmtpValue::from_unchecked("8BITMIME")),
            );
        }
        mail
    }

    /// creates the `RCPT` command for the given recipient
    ///
    /// `NOTIFY` is only added if the server supports `DSN`.
    pub(crate) fn recipient_cmd(&self, recipient: &MailAddress, with_dsn: bool) -> Recipient {
        let rcpt = Recipient::new(ForwardPath::from(recipient.clone()));
        match self.notify.notify_value() {
            Some(value) if with_dsn => rcpt.with_param(EsmtpKeyword::from_unchecked("NOTIFY"), Some(value)),
            _ => rcpt,
        }
    }
}
