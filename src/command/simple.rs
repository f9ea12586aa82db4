use crate::{error::MissingCapabilities, Cmd, EhloData, ExecFuture, Io};

/// QUIT, ends the session (the server closes the connection afterwards)
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Quit;

/// NOOP, also used as "no authentication" command during connection setup
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Noop;

macro_rules! impl_verb_only_cmd {
    ($($name:ident => $verb:expr;)*) => ($(
        impl Cmd for $name {
            fn check_cmd_availability(&self, _caps: Option<&EhloData>)
                -> Result<(), MissingCapabilities>
            {
                Ok(())
            }

            fn exec(self, io: Io) -> ExecFuture {
                io.exec_simple_cmd(&[$verb])
            }
        }
    )*);
}

impl_verb_only_cmd! {
    Quit => "QUIT";
    Noop => "NOOP";
}
