//! A single connection: transport stream + codec.
//!
//! `Connection` composes the byte stream produced by a
//! [`Connector`](crate::connector::Connector) with the wire codec. It has no
//! retry logic; every I/O failure surfaces immediately and the
//! [`Client`](crate::Client) decides what survives a reconnect.

use std::future::Future;
use std::marker::Unpin;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::resp::{codec, Command, ProtocolError, Reply};

/// Errors raised by one connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level I/O failure.
    #[error("io error")]
    Io(#[from] std::io::Error),
    /// The peer closed the stream.
    #[error("connection closed by peer")]
    Closed,
    /// A read or write did not finish within the configured timeout.
    #[error("socket operation timed out")]
    Timeout,
    /// The reply stream is not valid RESP. The stream position is unknown
    /// afterwards, so the connection must be discarded, never read again.
    #[error("protocol error")]
    Protocol(#[from] ProtocolError),
}

impl Error {
    /// Whether this failure is recoverable by reconnecting.
    ///
    /// Protocol errors are not: resynchronization is impossible in place,
    /// and retrying the operation on the same stream would misattribute
    /// replies. The connection still gets dropped, but the error propagates.
    pub fn is_connection_failure(&self) -> bool {
        !matches!(self, Error::Protocol(_))
    }
}

/// One open connection to the server.
///
/// Tracks `pending_reads`: commands written whose replies have not been
/// consumed yet. A non-zero count outside an operation means the reply
/// stream no longer lines up with the next command — the desync detector
/// the client checks before every dispatch.
#[derive(Debug)]
pub struct Connection<T> {
    transport: T,
    read_buf: BytesMut,
    write_buf: Vec<u8>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    pending_reads: usize,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Wraps a fresh transport stream.
    pub fn new(transport: T, read_timeout: Option<Duration>, write_timeout: Option<Duration>) -> Self {
        Connection {
            transport,
            read_buf: BytesMut::with_capacity(4 * 1024),
            write_buf: Vec::new(),
            read_timeout,
            write_timeout,
            pending_reads: 0,
        }
    }

    /// Writes one command and marks one reply pending.
    pub async fn write_command(&mut self, command: &Command) -> Result<(), Error> {
        self.write_commands(std::slice::from_ref(command)).await
    }

    /// Writes a batch of commands in one transport write, marking one
    /// pending reply per command.
    ///
    /// The pending count is raised before the write: a failed or partial
    /// write leaves the stream just as misaligned as an unread reply.
    pub async fn write_commands(&mut self, commands: &[Command]) -> Result<(), Error> {
        self.write_buf.clear();
        for command in commands {
            command.encode_into(&mut self.write_buf);
        }
        self.pending_reads += commands.len();

        let transport = &mut self.transport;
        let buf = &self.write_buf;
        with_timeout(self.write_timeout, async move {
            transport.write_all(buf).await?;
            transport.flush().await
        })
        .await
    }

    /// Reads exactly one reply, blocking up to the read timeout per fill.
    pub async fn read_reply(&mut self) -> Result<Reply, Error> {
        loop {
            if let Some((reply, used)) = codec::decode(&self.read_buf)? {
                self.read_buf.advance(used);
                self.pending_reads = self.pending_reads.saturating_sub(1);
                return Ok(reply);
            }

            let transport = &mut self.transport;
            let buf = &mut self.read_buf;
            let read = with_timeout(self.read_timeout, transport.read_buf(buf)).await?;
            if read == 0 {
                return Err(Error::Closed);
            }
        }
    }

    /// Marks one more reply as expected without writing anything.
    ///
    /// Used by read loops (blocking commands, subscriptions) where the
    /// server keeps pushing replies for a single written command.
    pub fn expect_reply(&mut self) {
        self.pending_reads += 1;
    }

    /// Commands written but not yet fully read back.
    pub fn pending_reads(&self) -> usize {
        self.pending_reads
    }

    /// Whether any reply is still owed by the server.
    pub fn has_pending_reads(&self) -> bool {
        self.pending_reads > 0
    }

    /// Overrides the read timeout, returning the previous value.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Option<Duration> {
        std::mem::replace(&mut self.read_timeout, timeout)
    }

    /// The current read timeout.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }
}

async fn with_timeout<F, O>(limit: Option<Duration>, op: F) -> Result<O, Error>
where
    F: Future<Output = std::io::Result<O>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, op).await {
            Ok(done) => Ok(done?),
            Err(_) => Err(Error::Timeout),
        },
        None => Ok(op.await?),
    }
}
