use std::io as std_io;

use futures::Future;

use crate::{
    error::{LogicError, MissingCapabilities},
    Cmd, EhloData, ExecFuture, Io,
};

/// RSET, aborts the current mail transaction
///
/// A server failing to reset is treated as a broken connection, as the
/// state of the session is unknown afterwards.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Reset;

impl Cmd for Reset {
    fn check_cmd_availability(&self, _caps: Option<&EhloData>) -> Result<(), MissingCapabilities> {
        Ok(())
    }

    fn exec(self, io: Io) -> ExecFuture {
        let fut = io
            .exec_simple_cmd(&["RSET"])
            .and_then(|(io, result)| match result {
                Ok(response) => {
                    if response.code().is_positive() {
                        Ok((io, Ok(response)))
                    } else {
                        let logic_err = LogicError::UnexpectedCode(response);
                        Err(std_io::Error::new(std_io::ErrorKind::Other, logic_err))
                    }
                }
                Err(logic_err) => Err(std_io::Error::new(std_io::ErrorKind::Other, logic_err)),
            });

        Box::new(fut)
    }
}
