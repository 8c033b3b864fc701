//! The decoded reply type.
//!
//! For more information, see the [`Reply`](self::Reply) type.

use std::fmt;

use bstr::BString;

/// A single reply decoded off the wire.
///
/// Nil bulk strings and nil arrays are distinct from their empty
/// counterparts; the protocol uses nil to mean "key absent" and the
/// empty value to mean "empty collection".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK\r\n`
    Status(BString),
    /// `:42\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n`, or `None` for the nil bulk `$-1\r\n`.
    Bulk(Option<BString>),
    /// `*2\r\n...`, or `None` for the nil array `*-1\r\n`.
    Array(Option<Vec<Reply>>),
    /// `-WRONGTYPE Operation against ...\r\n`
    Error(ServerError),
}

/// An error reply sent by the server.
///
/// Server errors are not transport problems. They never tear down the
/// connection and never trigger a reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// Leading all-caps token of the message, e.g. `ERR` or `WRONGTYPE`.
    pub code: Option<String>,
    /// The full message as sent, code included.
    pub message: String,
}

impl ServerError {
    /// Splits the error line into an optional all-caps code and the message.
    pub fn parse(line: &[u8]) -> Self {
        let message = String::from_utf8_lossy(line).into_owned();
        let code = message
            .split(' ')
            .next()
            .filter(|tok| !tok.is_empty() && tok.bytes().all(|b| b.is_ascii_uppercase()))
            .map(str::to_owned);
        ServerError { code, message }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServerError {}

impl Reply {
    /// Whether this reply is a server error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Turns a server error reply into `Err`, passing every other variant through.
    pub fn into_result(self) -> Result<Reply, ServerError> {
        match self {
            Reply::Error(err) => Err(err),
            reply => Ok(reply),
        }
    }

    /// The status line, if this is a status reply.
    pub fn status(&self) -> Option<&BString> {
        match self {
            Reply::Status(status) => Some(status),
            _ => None,
        }
    }

    /// Whether this is the status reply `+OK`.
    pub fn is_ok_status(&self) -> bool {
        self.status().map_or(false, |status| status == "OK")
    }

    /// The integer value, if this is an integer reply.
    pub fn integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The bulk payload, if this is a bulk reply. The outer `Option`
    /// distinguishes the reply shape, the inner one nil from data.
    pub fn into_bulk(self) -> Option<Option<BString>> {
        match self {
            Reply::Bulk(bulk) => Some(bulk),
            // a status line answers where a bulk is documented, e.g. PING
            Reply::Status(status) => Some(Some(status)),
            _ => None,
        }
    }

    /// The elements, if this is an array reply. Nil arrays yield `Some(None)`.
    pub fn into_array(self) -> Option<Option<Vec<Reply>>> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_split() {
        let err = ServerError::parse(b"WRONGTYPE Operation against a key");
        assert_eq!(err.code.as_deref(), Some("WRONGTYPE"));
        assert_eq!(err.message, "WRONGTYPE Operation against a key");
    }

    #[test]
    fn error_without_code() {
        let err = ServerError::parse(b"unknown problem");
        assert_eq!(err.code, None);
        assert_eq!(err.message, "unknown problem");
    }

    #[test]
    fn nil_bulk_is_not_empty_bulk() {
        assert_ne!(
            Reply::Bulk(None),
            Reply::Bulk(Some(BString::from("")))
        );
        assert_ne!(Reply::Array(None), Reply::Array(Some(vec![])));
    }

    #[test]
    fn status_counts_as_bulk() {
        let reply = Reply::Status(BString::from("PONG"));
        assert_eq!(reply.into_bulk(), Some(Some(BString::from("PONG"))));
    }
}
