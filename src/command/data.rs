use futures::Future;

use crate::{
    error::{LogicError, MissingCapabilities},
    response::codes,
    Cmd, EhloData, ExecFuture, Io,
};

/// DATA, asks the server to accept the mail body
///
/// This only sends the verb, on success (`354`) the body can be written
/// to the connection (see `BodyStream`). Any other positive response is
/// turned into a `LogicError::UnexpectedCode`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Data;

impl Cmd for Data {
    fn check_cmd_availability(&self, _caps: Option<&EhloData>) -> Result<(), MissingCapabilities> {
        Ok(())
    }

    fn exec(self, io: Io) -> ExecFuture {
        let fut = io
            .exec_simple_cmd(&["DATA"])
            .map(|(io, result)| match result {
                Ok(response) => {
                    if response.code() == codes::START_MAIL_DATA {
                        (io, Ok(response))
                    } else {
                        (io, Err(LogicError::UnexpectedCode(response)))
                    }
                }
                Err(err) => (io, Err(err)),
            });

        Box::new(fut)
    }
}
