//! Collecting the rejected recipients of a single send attempt
use std::error::Error;
use std::fmt::{self, Display};
use std::slice;

use crate::envelope::MailAddress;
use crate::response::Response;

/// A recipient the server rejected with the response it rejected it with
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientFailure {
    recipient: MailAddress,
    response: Response,
}

impl RecipientFailure {
    pub fn new(recipient: MailAddress, response: Response) -> Self {
        RecipientFailure {
            recipient,
            response,
        }
    }

    pub fn recipient(&self) -> &MailAddress {
        &self.recipient
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    /// the numeric status code, e.g. `550`
    pub fn code(&self) -> u16 {
        self.response.code().as_u16()
    }

    /// the text of the response, lines joined by `"\n"`
    pub fn text(&self) -> String {
        self.response.text()
    }
}

impl Display for RecipientFailure {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        write!(fter, "<{}>: {}", self.recipient, self.response)
    }
}

/// The failures of one send attempt, in the order the recipients were send
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureSet(Vec<RecipientFailure>);

impl FailureSet {
    pub fn new() -> Self {
        FailureSet(Vec::new())
    }

    pub fn record(&mut self, recipient: MailAddress, response: Response) {
        self.0.push(RecipientFailure::new(recipient, response));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, RecipientFailure> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<RecipientFailure> {
        self.0
    }

    /// classifies the failures given the total number of recipients
    ///
    /// # Panics
    ///
    /// if more failures were recorded then there are recipients
    pub fn classify(self, total_recipients: usize) -> SendOutcome {
        let failed = self.len();
        assert!(
            failed <= total_recipients,
            "[BUG] more failed recipients than recipients"
        );

        if failed == 0 {
            SendOutcome::Success
        } else if failed == total_recipients {
            SendOutcome::TotalFailure(self)
        } else {
            SendOutcome::PartialFailure(self)
        }
    }
}

impl IntoIterator for FailureSet {
    type Item = RecipientFailure;
    type IntoIter = ::std::vec::IntoIter<RecipientFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FailureSet {
    type Item = &'a RecipientFailure;
    type IntoIter = slice::Iter<'a, RecipientFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Outcome of the recipient phase
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// all recipients were accepted
    Success,
    /// some, but not all recipients were rejected, the mail is still send
    PartialFailure(FailureSet),
    /// all recipients were rejected, no `DATA` is send
    TotalFailure(FailureSet),
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            SendOutcome::Success => true,
            _ => false,
        }
    }

    pub fn failures(&self) -> Option<&FailureSet> {
        match self {
            SendOutcome::Success => None,
            SendOutcome::PartialFailure(failures) | SendOutcome::TotalFailure(failures) => {
                Some(failures)
            }
        }
    }

    /// turns a failure outcome into the matching error, `None` on success
    pub fn into_error(self) -> Option<RecipientsError> {
        match self {
            SendOutcome::Success => None,
            SendOutcome::PartialFailure(failures) => Some(RecipientsError::new(false, failures)),
            SendOutcome::TotalFailure(failures) => Some(RecipientsError::new(true, failures)),
        }
    }
}

/// Error representing rejected recipients
///
/// It's fatal if all recipients where rejected (no mail was send).
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientsError {
    fatal: bool,
    failures: FailureSet,
}

impl RecipientsError {
    pub(crate) fn new(fatal: bool, failures: FailureSet) -> Self {
        debug_assert!(!failures.is_empty(), "[BUG] recipients error without failures");
        RecipientsError { fatal, failures }
    }

    /// true if no recipient was accepted
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn failures(&self) -> &FailureSet {
        &self.failures
    }

    pub fn into_failures(self) -> FailureSet {
        self.failures
    }

    /// the failure if exactly one recipient was rejected
    pub fn single(&self) -> Option<&RecipientFailure> {
        if self.failures.len() == 1 {
            self.failures.iter().next()
        } else {
            None
        }
    }
}

impl Display for RecipientsError {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        if let Some(failure) = self.single() {
            return write!(fter, "recipient rejected: {}", failure);
        }

        let kind = if self.fatal { "all" } else { "some" };
        write!(fter, "{} recipients rejected:", kind)?;
        for failure in &self.failures {
            write!(fter, " {};", failure)?;
        }
        Ok(())
    }
}

impl Error for RecipientsError {}
