//! Authentication commands used during connection setup
use crate::{error::MissingCapabilities, EhloData};

mod plain;
pub use self::plain::*;

const CAP_AUTH: &str = "AUTH";

/// checks that the server announced `AUTH` with the given mechanism
fn validate_auth_capability(
    caps: Option<&EhloData>,
    auth_kind: &'static str,
) -> Result<(), MissingCapabilities> {
    caps.and_then(|ehlo_data| ehlo_data.get_capability_params(CAP_AUTH))
        .and_then(|auth_methods| {
            auth_methods
                .iter()
                .find(|method| method.as_str().eq_ignore_ascii_case(auth_kind))
        })
        .map(|_| ())
        .ok_or_else(|| MissingCapabilities::new_from_unchecked(CAP_AUTH))
}
