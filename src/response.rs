//! Provides access to `Response`, `ResponseCode` and parsing parts (for impl `Cmd`'s)
use std::fmt::{self, Display};

/// response of a smtp server
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Response {
    code: ResponseCode,
    lines: Vec<String>,
}

impl Response {
    /// crate a new Response from a response code and a number of lines
    ///
    /// If lines is empty a single empty line will be pushed to the
    /// lines `Vec`.
    pub fn new(code: ResponseCode, mut lines: Vec<String>) -> Self {
        if lines.is_empty() {
            lines.push(String::new());
        }
        Response { code, lines }
    }

    /// true if the response code is unknown or indicates an error
    pub fn is_erroneous(&self) -> bool {
        self.code.is_erroneous()
    }

    /// return the response code
    pub fn code(&self) -> ResponseCode {
        self.code
    }

    /// returns the lines of the msg/payload
    ///
    /// this will have at last one line, through
    /// this line might be empty
    pub fn msg(&self) -> &[String] {
        &self.lines
    }

    /// the response text, multiple lines are joined with `"\n"`
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl Display for Response {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        write!(fter, "{} {}", self.code, self.lines.join(" "))
    }
}

/// The response code of used by smtp server.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ResponseCode([u8; 3]);

impl ResponseCode {
    /// true if the code starts with `2`
    pub fn is_positive(&self) -> bool {
        self.0[0] == b'2'
    }

    /// true if the code starts with `3`
    pub fn is_intermediate(&self) -> bool {
        self.0[0] == b'3'
    }

    /// true if the code starts with `4`
    pub fn is_transient_failure(&self) -> bool {
        self.0[0] == b'4'
    }

    /// true if the code starts with `5`
    pub fn is_permanent_failure(&self) -> bool {
        self.0[0] == b'5'
    }

    /// true if the code doesn't start with `2` or `3`
    pub fn is_erroneous(&self) -> bool {
        !self.is_positive() && !self.is_intermediate()
    }

    /// The actual ascii digits of the code e.g. `*b"250"`.
    pub fn as_byte_string(&self) -> [u8; 3] {
        self.0
    }

    /// The code as a number e.g. `550`
    pub fn as_u16(&self) -> u16 {
        self.0
            .iter()
            .fold(0, |acc, digit| acc * 10 + u16::from(digit - b'0'))
    }
}

impl Display for ResponseCode {
    fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
        write!(fter, "{}", self.as_u16())
    }
}

impl PartialEq<u16> for ResponseCode {
    fn eq(&self, other: &u16) -> bool {
        self.as_u16() == *other
    }
}

pub mod parser {
    use super::{Response, ResponseCode};

    use std::error::Error;
    use std::fmt::{self, Display};
    use std::str::{self, Utf8Error};

    #[derive(Debug, Clone)]
    pub enum ParseError {
        LineLength,
        CodeMsgSeparator,
        Utf8(Utf8Error),
        CodeFormat { kind: u8, category: u8, detail: u8 },
        Code { expected: ResponseCode, got: ResponseCode },
    }

    impl Display for ParseError {
        fn fmt(&self, fter: &mut fmt::Formatter) -> fmt::Result {
            use self::ParseError::*;
            match self {
                LineLength => write!(fter, "response line too short"),
                CodeMsgSeparator => write!(fter, "malformed separator after response code"),
                Utf8(err) => write!(fter, "response is not utf-8: {}", err),
                CodeFormat { .. } => write!(fter, "response code is not made of digits"),
                Code { expected, got } => write!(
                    fter,
                    "multi line response switched code from {} to {}",
                    expected, got
                ),
            }
        }
    }

    impl Error for ParseError {}

    pub struct ResponseLine {
        pub code: ResponseCode,
        pub last_line: bool,
        pub msg: String,
    }

    /// parses a single response line (without the trailing `"\r\n"`)
    ///
    /// A line only containing the code (e.g. `"250"`) is accepted as
    /// last line with an empty message.
    pub fn parse_line(line: &[u8]) -> Result<ResponseLine, ParseError> {
        if line.len() < 3 {
            return Err(ParseError::LineLength);
        }
        let (code, tail) = line.split_at(3);
        let code = parse_code(code[0], code[1], code[2])?;

        if tail.is_empty() {
            return Ok(ResponseLine {
                code,
                last_line: true,
                msg: String::new(),
            });
        }

        let (sep, msg) = tail.split_at(1);
        let last_line = parse_separator(sep[0])?;
        let msg = str::from_utf8(msg).map_err(ParseError::Utf8)?.to_owned();

        Ok(ResponseLine {
            code,
            last_line,
            msg,
        })
    }

    /// A non-strict response code parser, as long as the code is made of digits it accepts it
    ///
    /// RFC 5321 is more strict, but extensions could use other codes and
    /// commands mostly check the kind (first digit) or the whole code anyway.
    pub fn parse_code(kind: u8, category: u8, detail: u8) -> Result<ResponseCode, ParseError> {
        if kind.is_ascii_digit() && category.is_ascii_digit() && detail.is_ascii_digit() {
            Ok(ResponseCode([kind, category, detail]))
        } else {
            Err(ParseError::CodeFormat {
                kind,
                category,
                detail,
            })
        }
    }

    fn parse_separator(sep: u8) -> Result<bool, ParseError> {
        match sep {
            b' ' => Ok(true),
            b'-' => Ok(false),
            _ => Err(ParseError::CodeMsgSeparator),
        }
    }

    /// Creates a response from all lines of it.
    ///
    /// Ignores the `last_line` field, the caller is required to
    /// check if the last line (and no previous line) has the field set to `true`.
    ///
    /// # Panics
    ///
    /// Panics if the lines iterator does not return at last one line.
    pub fn response_from_parsed_lines<I>(lines: I) -> Result<Response, ParseError>
    where
        I: IntoIterator<Item = ResponseLine>,
    {
        let mut iter = lines.into_iter();
        let first = iter.next().expect("[BUG] called with zero lines");
        let code = first.code;
        let mut messages = vec![first.msg];

        for line in iter {
            if code != line.code {
                return Err(ParseError::Code {
                    expected: code,
                    got: line.code,
                });
            }
            messages.push(line.msg);
        }

        Ok(Response {
            code,
            lines: messages,
        })
    }
}

/// Predefined Codes based on RFC 5321
pub mod codes {
    use super::ResponseCode;

    /// RFC 5321: <domain> Service ready
    pub static READY: ResponseCode = ResponseCode(*b"220");

    /// RFC 5321: Requested mail action okay, completed
    pub static OK: ResponseCode = ResponseCode(*b"250");

    /// RFC 5321: Start mail input; end with <CRLF>.<CRLF>
    pub static START_MAIL_DATA: ResponseCode = ResponseCode(*b"354");

    /// RFC 5321: <domain> Service not available, closing transmission channel
    pub static SERVICE_UNAVAILABLE: ResponseCode = ResponseCode(*b"421");

    /// RFC 5321: Requested mail action not taken: mailbox unavailable
    pub static MAILBOX_TEMP_UNAVAILABLE: ResponseCode = ResponseCode(*b"450");

    /// RFC 5321: Requested action not taken: mailbox unavailable
    pub static MAILBOX_UNAVAILABLE: ResponseCode = ResponseCode(*b"550");

    /// RFC 5321: Transaction failed
    pub static TRANSACTION_FAILED: ResponseCode = ResponseCode(*b"554");
}
