#![allow(non_snake_case)]

use futures::Future;

use tokio_smtp_transmit::command;
use tokio_smtp_transmit::error::LogicError;
use tokio_smtp_transmit::mock::{ActionData, Actor};

use self::ActionData::*;
use self::Actor::*;

use super::{client_id, mock, mock_always_ready, mock_with_caps};

mod Ehlo {
    use super::*;

    #[test]
    fn parsed_response_into_ehlo_data() {
        let con = mock(vec![
            (Client, Lines(vec!["EHLO me.test"])),
            (
                Server,
                Lines(vec!["250-they.test greets you", "250-SMTPUTF8", "250 XBLA sSpecial"]),
            ),
        ]);

        let (con, result) = con.send(command::Ehlo::new(client_id())).wait().unwrap();
        assert!(result.is_ok());

        assert!(con.has_capability("SMTPUTF8"));
        assert!(con.has_capability("xbla"));
        let params = con.ehlo_data().unwrap().get_capability_params("XBLA").unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0], "sSpecial");
        assert_eq!(con.ehlo_data().unwrap().domain().as_str(), "they.test");
    }

    #[test]
    fn rejected_ehlo_keeps_connection() {
        let con = mock_always_ready(vec![
            (Client, Lines(vec!["EHLO me.test"])),
            (Server, Lines(vec!["550 go away"])),
        ]);

        let (con, result) = con.send(command::Ehlo::new(client_id())).wait().unwrap();
        match result {
            Err(LogicError::Code(response)) => assert_eq!(response.code().as_u16(), 550),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(con.ehlo_data().is_none());
    }
}

mod Mail {
    use super::*;
    use tokio_smtp_transmit::{EsmtpKeyword, ReversePath};

    #[test]
    fn sends_reverse_path_and_params() {
        let con = mock_with_caps(
            &["SMTPUTF8"],
            vec![
                (Client, Lines(vec!["MAIL FROM:<a@x.com> SMTPUTF8"])),
                (Server, Lines(vec!["250 Ok"])),
            ],
            false,
        );

        let cmd = command::Mail::new(ReversePath::from_unchecked("a@x.com"))
            .with_param(EsmtpKeyword::from_unchecked("SMTPUTF8"), None);

        let (_con, result) = con.send(cmd).wait().unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn missing_capability_is_not_send() {
        let con = mock_always_ready(vec![]);

        let cmd = command::Mail::new(ReversePath::from_unchecked("a@x.com"))
            .with_param(EsmtpKeyword::from_unchecked("SMTPUTF8"), None);

        let (_con, result) = con.send(cmd).wait().unwrap();
        match result {
            Err(LogicError::MissingCapabilities(missing)) => {
                assert_eq!(missing.capabilities()[0].as_str(), "SMTPUTF8")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

mod Recipient {
    use super::*;
    use tokio_smtp_transmit::ForwardPath;

    #[test]
    fn rejection_is_a_logic_error() {
        let con = mock(vec![
            (Client, Lines(vec!["RCPT TO:<c@x.com>"])),
            (Server, Lines(vec!["550 no such user"])),
        ]);

        let cmd = command::Recipient::new(ForwardPath::from_unchecked("c@x.com"));
        let (_con, result) = con.send(cmd).wait().unwrap();
        let err = result.unwrap_err();
        assert_eq!(err.response().unwrap().code().as_u16(), 550);
        assert_eq!(err.response().unwrap().text(), "no such user");
    }
}

mod Data {
    use super::*;

    #[test]
    fn accepts_start_mail_data() {
        let con = mock(vec![
            (Client, Lines(vec!["DATA"])),
            (Server, Lines(vec!["354 go ahead"])),
        ]);

        let (_con, result) = con.send(command::Data).wait().unwrap();
        assert_eq!(result.unwrap().code().as_u16(), 354);
    }

    #[test]
    fn other_positive_code_is_unexpected() {
        let con = mock(vec![
            (Client, Lines(vec!["DATA"])),
            (Server, Lines(vec!["250 Ok"])),
        ]);

        let (_con, result) = con.send(command::Data).wait().unwrap();
        match result {
            Err(LogicError::UnexpectedCode(response)) => assert_eq!(response.code().as_u16(), 250),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

mod Reset {
    use super::*;

    #[test]
    fn failing_reset_is_fatal() {
        let con = mock(vec![
            (Client, Lines(vec!["RSET"])),
            (Server, Lines(vec!["420 server messed up"])),
        ]);

        let res = con.send(command::Reset).wait();
        assert!(res.is_err());
    }

    #[test]
    fn reset_ok() {
        let con = mock(vec![
            (Client, Lines(vec!["RSET"])),
            (Server, Lines(vec!["250 Ok"])),
        ]);

        let (_con, result) = con.send(command::Reset).wait().unwrap();
        assert!(result.is_ok());
    }
}

mod StartTls {
    use super::*;
    use tokio_smtp_transmit::Domain;

    #[test]
    fn mock_socket_becomes_secure() {
        let con = mock_with_caps(
            &["STARTTLS"],
            vec![
                (Client, Lines(vec!["STARTTLS"])),
                (Server, Lines(vec!["220 go ahead"])),
            ],
            true,
        );

        let cmd = command::StartTls::new("they.test".parse::<Domain>().unwrap());
        let (con, result) = con.send(cmd).wait().unwrap();
        assert!(result.is_ok());
        assert!(con.ehlo_data().is_none());

        let io = con.into_inner();
        assert!(io.is_secure());
    }

    #[test]
    fn requires_capability() {
        let con = mock_with_caps(&[], vec![], true);
        let cmd = command::StartTls::new("they.test".parse::<Domain>().unwrap());
        let (_con, result) = con.send(cmd).wait().unwrap();
        assert!(result.is_err());
    }
}

mod AuthPlain {
    use std::collections::HashMap;

    use super::*;
    use tokio_smtp_transmit::command::auth::Plain;
    use tokio_smtp_transmit::mock::MockSocket;
    use tokio_smtp_transmit::{Capability, Connection, EhloData, EhloParam, Io};

    fn con_with_auth(methods: &[&str], conv: Vec<(Actor, ActionData)>) -> Connection {
        let mut caps = HashMap::new();
        let methods = methods
            .iter()
            .map(|method| method.parse::<EhloParam>().unwrap())
            .collect::<Vec<_>>();
        caps.insert("AUTH".parse::<Capability>().unwrap(), methods);

        let mut io = Io::from(MockSocket::new(conv));
        io.set_ehlo_data(EhloData::new("they.test".parse().unwrap(), caps));
        Connection::from(io)
    }

    #[test]
    fn sends_encoded_credentials() {
        let con = con_with_auth(
            &["PLAIN", "LOGIN"],
            vec![
                (Client, Lines(vec!["AUTH PLAIN dGltAHRpbQB0YW5zdGFhZnRhbnN0YWFm"])),
                (Server, Lines(vec!["235 Authentication successful"])),
            ],
        );

        let auth = Plain::from_username("tim", "tanstaaftanstaaf").unwrap();
        let (_con, result) = con.send(auth).wait().unwrap();
        assert_eq!(result.unwrap().code().as_u16(), 235);
    }

    #[test]
    fn requires_plain_mechanism() {
        let con = con_with_auth(&["LOGIN"], vec![]);

        let auth = Plain::from_username("tim", "tanstaaftanstaaf").unwrap();
        let (_con, result) = con.send(auth).wait().unwrap();
        match result {
            Err(LogicError::MissingCapabilities(missing)) => {
                assert_eq!(missing.capabilities()[0].as_str(), "AUTH")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

mod Quit {
    use super::*;

    #[test]
    fn quit_and_shutdown() {
        let con = mock(vec![
            (Client, Lines(vec!["QUIT"])),
            (Server, Lines(vec!["221 bye"])),
        ]);

        con.quit().wait().unwrap();
    }
}
