//! Module containing all commands provided by this crate
mod ehlo;
pub use self::ehlo::Ehlo;

mod simple;
pub use self::simple::*;

mod starttls;
pub use self::starttls::*;

mod mail;
pub use self::mail::*;

mod data;
pub use self::data::*;

pub mod auth;

mod reset;
pub use self::reset::*;
