//! RESP wire format: command encoding and reply decoding.
//!
//! The codec is pure: it never touches a socket. [`Connection`](crate::connection::Connection)
//! owns the fill-until-complete read loop and feeds the decoder from its buffer.

pub mod codec;
pub mod value;

pub use codec::ProtocolError;
pub use value::{Reply, ServerError};

/// A single command: an ordered sequence of byte-string arguments,
/// the first being the command name. Immutable once queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Vec<u8>>,
}

impl Command {
    /// Builds a command from a slice of byte-string arguments.
    pub fn new<A: AsRef<[u8]>>(args: &[A]) -> Self {
        Command {
            args: args.iter().map(|arg| arg.as_ref().to_vec()).collect(),
        }
    }

    /// Appends one argument.
    pub fn arg<A: AsRef<[u8]>>(mut self, arg: A) -> Self {
        self.args.push(arg.as_ref().to_vec());
        self
    }

    /// The command name, when present.
    pub fn name(&self) -> Option<&[u8]> {
        self.args.first().map(Vec::as_slice)
    }

    /// Encodes this command onto `buf` in the wire format.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        codec::encode_command(&self.args, buf);
    }
}

impl<A: AsRef<[u8]>> FromIterator<A> for Command {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Command {
            args: iter.into_iter().map(|arg| arg.as_ref().to_vec()).collect(),
        }
    }
}
