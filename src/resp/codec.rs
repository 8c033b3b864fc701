//! Encode commands and decode replies.

use bytes::BufMut;
use memchr::memmem::Finder;
use once_cell::sync::Lazy;

use super::value::{Reply, ServerError};

static CRLF: Lazy<Finder<'static>> = Lazy::new(|| Finder::new(b"\r\n"));

const STATUS: u8 = b'+';
const ERROR: u8 = b'-';
const INTEGER: u8 = b':';
const BULK: u8 = b'$';
const ARRAY: u8 = b'*';

/// Errors that occur while decoding the reply stream.
///
/// All of them leave the stream position unknown, so the connection
/// carrying it must be torn down rather than read again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The reply started with a byte that is not a known type tag.
    #[error("invalid reply type byte {0:#04x}")]
    InvalidPrefix(u8),
    /// A length-prefixed payload was not terminated by `\r\n`.
    #[error("expected \\r\\n terminator")]
    ExpectedCrlf,
    /// A length or integer field did not parse.
    #[error("failed to parse integer field")]
    ParseIntFailed,
}

/// Encodes one command as an array of bulk strings:
/// `*<argc>\r\n` then `$<len>\r\n<bytes>\r\n` per argument.
///
/// Lengths are byte counts, so multi-byte text is handled correctly.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], buf: &mut Vec<u8>) {
    let mut nbuf = itoa::Buffer::new();
    buf.put_u8(ARRAY);
    buf.put_slice(nbuf.format(args.len()).as_bytes());
    buf.put_slice(b"\r\n");
    for arg in args {
        let arg = arg.as_ref();
        buf.put_u8(BULK);
        buf.put_slice(nbuf.format(arg.len()).as_bytes());
        buf.put_slice(b"\r\n");
        buf.put_slice(arg);
        buf.put_slice(b"\r\n");
    }
}

/// Tries to decode one complete reply from the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, otherwise the reply
/// and the number of bytes consumed.
///
/// ```
/// # use respline::resp::codec::decode;
/// # use respline::resp::Reply;
/// assert_eq!(None, decode(b"$5\r\nhel")?);
/// let (reply, used) = decode(b"$5\r\nhello\r\n:1\r\n")?.unwrap();
/// assert_eq!(Reply::Bulk(Some("hello".into())), reply);
/// assert_eq!(11, used);
/// # Ok::<_, respline::resp::ProtocolError>(())
/// ```
pub fn decode(buf: &[u8]) -> Result<Option<(Reply, usize)>, ProtocolError> {
    let mut pos = 0;
    match decode_at(buf, &mut pos)? {
        Some(reply) => Ok(Some((reply, pos))),
        None => Ok(None),
    }
}

fn decode_at(buf: &[u8], pos: &mut usize) -> Result<Option<Reply>, ProtocolError> {
    let line = match next_line(buf, pos) {
        Some(line) => line,
        None => return Ok(None),
    };
    let (tag, rest) = match line.split_first() {
        Some(split) => split,
        None => return Err(ProtocolError::ExpectedCrlf),
    };

    match *tag {
        STATUS => Ok(Some(Reply::Status(rest.into()))),
        ERROR => Ok(Some(Reply::Error(ServerError::parse(rest)))),
        INTEGER => Ok(Some(Reply::Integer(parse_int(rest)?))),
        BULK => {
            let len = parse_int(rest)?;
            if len < 0 {
                return Ok(Some(Reply::Bulk(None)));
            }
            let len = len as usize;
            if buf.len() < *pos + len + 2 {
                return Ok(None);
            }
            let payload = &buf[*pos..*pos + len];
            if &buf[*pos + len..*pos + len + 2] != b"\r\n" {
                return Err(ProtocolError::ExpectedCrlf);
            }
            *pos += len + 2;
            Ok(Some(Reply::Bulk(Some(payload.into()))))
        }
        ARRAY => {
            let len = parse_int(rest)?;
            if len < 0 {
                return Ok(Some(Reply::Array(None)));
            }
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                match decode_at(buf, pos)? {
                    Some(item) => items.push(item),
                    None => return Ok(None),
                }
            }
            Ok(Some(Reply::Array(Some(items))))
        }
        other => Err(ProtocolError::InvalidPrefix(other)),
    }
}

/// Returns the next CRLF-terminated line after `*pos`, advancing past it.
fn next_line<'a>(buf: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let end = CRLF.find(&buf[*pos..])?;
    let line = &buf[*pos..*pos + end];
    *pos += end + 2;
    Some(line)
}

fn parse_int(digits: &[u8]) -> Result<i64, ProtocolError> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ProtocolError::ParseIntFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(bytes: &[u8]) -> Reply {
        let (reply, used) = decode(bytes).unwrap().unwrap();
        assert_eq!(used, bytes.len(), "decode must consume the whole frame");
        reply
    }

    #[test]
    fn encodes_command() {
        let mut buf = Vec::new();
        encode_command(&[b"SET".as_slice(), b"key", b"value"], &mut buf);
        assert_eq!(&buf[..], b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n");
    }

    #[test]
    fn encodes_byte_lengths_not_char_counts() {
        let mut buf = Vec::new();
        encode_command(&["ECHO", "héllo"], &mut buf);
        assert_eq!(&buf[..], "*2\r\n$4\r\nECHO\r\n$6\r\nhéllo\r\n".as_bytes());
    }

    #[test]
    fn decodes_status() {
        assert_eq!(one(b"+OK\r\n"), Reply::Status("OK".into()));
    }

    #[test]
    fn decodes_error_with_code() {
        let err = match one(b"-ERR unknown command\r\n") {
            Reply::Error(err) => err,
            other => panic!("expected error, got {other:?}"),
        };
        assert_eq!(err.code.as_deref(), Some("ERR"));
    }

    #[test]
    fn decodes_integers() {
        assert_eq!(one(b":42\r\n"), Reply::Integer(42));
        assert_eq!(one(b":-7\r\n"), Reply::Integer(-7));
    }

    #[test]
    fn decodes_bulk_and_nil_bulk() {
        assert_eq!(one(b"$5\r\nhello\r\n"), Reply::Bulk(Some("hello".into())));
        assert_eq!(one(b"$0\r\n\r\n"), Reply::Bulk(Some("".into())));
        assert_eq!(one(b"$-1\r\n"), Reply::Bulk(None));
    }

    #[test]
    fn decodes_binary_bulk() {
        assert_eq!(
            one(b"$4\r\n\x00\xff\r\n\r\n"),
            Reply::Bulk(Some(b"\x00\xff\r\n".as_slice().into()))
        );
    }

    #[test]
    fn decodes_nested_arrays() {
        let reply = one(b"*2\r\n*2\r\n:1\r\n:2\r\n*1\r\n$1\r\na\r\n");
        assert_eq!(
            reply,
            Reply::Array(Some(vec![
                Reply::Array(Some(vec![Reply::Integer(1), Reply::Integer(2)])),
                Reply::Array(Some(vec![Reply::Bulk(Some("a".into()))])),
            ]))
        );
    }

    #[test]
    fn decodes_nil_and_empty_array() {
        assert_eq!(one(b"*-1\r\n"), Reply::Array(None));
        assert_eq!(one(b"*0\r\n"), Reply::Array(Some(vec![])));
    }

    #[test]
    fn partial_input_wants_more() {
        assert_eq!(decode(b"").unwrap(), None);
        assert_eq!(decode(b"$5\r\nhel").unwrap(), None);
        assert_eq!(decode(b"*2\r\n:1\r\n").unwrap(), None);
        assert_eq!(decode(b"+OK\r").unwrap(), None);
    }

    #[test]
    fn consumes_one_reply_only() {
        let (reply, used) = decode(b":1\r\n:2\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Integer(1));
        assert_eq!(used, 4);
    }

    #[test]
    fn invalid_prefix_is_fatal() {
        assert_eq!(
            decode(b"!boom\r\n").unwrap_err(),
            ProtocolError::InvalidPrefix(b'!')
        );
    }

    #[test]
    fn bulk_missing_terminator_is_fatal() {
        assert_eq!(
            decode(b"$5\r\nhelloXX").unwrap_err(),
            ProtocolError::ExpectedCrlf
        );
    }

    #[test]
    fn command_roundtrip_as_echo_reply() {
        // A command is itself an array of bulks, so the decoder must
        // read back what the encoder wrote.
        let mut buf = Vec::new();
        encode_command(&[b"LPUSH".as_slice(), b"list", b"\xde\xad"], &mut buf);
        assert_eq!(
            one(&buf),
            Reply::Array(Some(vec![
                Reply::Bulk(Some("LPUSH".into())),
                Reply::Bulk(Some("list".into())),
                Reply::Bulk(Some(b"\xde\xad".as_slice().into())),
            ]))
        );
    }
}
