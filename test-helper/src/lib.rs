//! A scripted fake RESP server.
//!
//! Tests describe the server side of a conversation as a list of
//! [`Session`]s (one per accepted connection) made of [`Step`]s: read and
//! assert a command, send raw bytes, idle, or hang up. Anything the client
//! does that the script did not anticipate fails the session, and
//! [`FakeServer::finish`] surfaces that failure in the test.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One scripted action within a session.
#[derive(Debug, Clone)]
pub enum Step {
    /// Read one command and assert its arguments.
    Recv(Vec<Vec<u8>>),
    /// Send raw bytes to the client.
    Send(Vec<u8>),
    /// Do nothing for a while; provokes client-side read timeouts.
    Idle(Duration),
    /// Close the connection, ending the session early.
    Hangup,
}

impl Step {
    /// Shorthand for [`Step::Recv`] from string-ish arguments.
    pub fn recv<A: AsRef<[u8]>>(args: &[A]) -> Self {
        Step::Recv(args.iter().map(|arg| arg.as_ref().to_vec()).collect())
    }
}

/// The script for one accepted connection.
#[derive(Debug, Clone, Default)]
pub struct Session(pub Vec<Step>);

impl Session {
    /// An empty session script.
    pub fn new() -> Self {
        Session(Vec::new())
    }

    /// Appends one step.
    pub fn step(mut self, step: Step) -> Self {
        self.0.push(step);
        self
    }

    /// Appends a read-and-assert followed by a canned reply.
    pub fn exchange<A: AsRef<[u8]>>(mut self, args: &[A], reply: Vec<u8>) -> Self {
        self.0.push(Step::recv(args));
        self.0.push(Step::Send(reply));
        self
    }
}

/// A listener serving scripted sessions, one per accepted connection.
#[derive(Debug)]
pub struct FakeServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    handle: JoinHandle<Result<(), String>>,
}

impl FakeServer {
    /// Binds an ephemeral port and starts serving `sessions` in order.
    pub async fn start(sessions: Vec<Session>) -> Result<FakeServer, BoxError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        let handle = tokio::spawn(async move {
            // accept eagerly and drive every session in its own task, so a
            // slow or idling session never blocks the next reconnect
            let mut running = Vec::new();
            for (index, session) in sessions.into_iter().enumerate() {
                let (stream, _) = listener
                    .accept()
                    .await
                    .map_err(|err| format!("accept failed: {err}"))?;
                counter.fetch_add(1, Ordering::SeqCst);
                running.push(tokio::spawn(async move {
                    drive(stream, session)
                        .await
                        .map_err(|err| format!("session {index}: {err}"))
                }));
            }
            for session in running {
                session.await.map_err(|err| err.to_string())??;
            }
            Ok(())
        });

        Ok(FakeServer {
            addr,
            accepted,
            handle,
        })
    }

    /// The address to hand to the client, e.g. `127.0.0.1:39123`.
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    /// How many connections have been accepted so far. Lets tests assert
    /// that a reconnect (or no reconnect) actually happened.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Waits for every scripted session to run to completion and
    /// propagates any script violation.
    pub async fn finish(self) -> Result<(), BoxError> {
        self.handle.await??;
        Ok(())
    }
}

async fn drive(stream: TcpStream, Session(steps): Session) -> Result<(), String> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    for step in steps {
        match step {
            Step::Recv(expected) => {
                let got = read_command(&mut reader)
                    .await
                    .map_err(|err| format!("reading command: {err}"))?;
                if got != expected {
                    return Err(format!(
                        "expected {}, got {}",
                        render(&expected),
                        render(&got)
                    ));
                }
            }
            Step::Send(bytes) => {
                write_half
                    .write_all(&bytes)
                    .await
                    .map_err(|err| format!("writing reply: {err}"))?;
            }
            Step::Idle(pause) => tokio::time::sleep(pause).await,
            Step::Hangup => return Ok(()),
        }
    }
    Ok(())
}

/// Reads one `*N` command frame of `$len` bulk arguments.
async fn read_command(reader: &mut BufReader<OwnedReadHalf>) -> Result<Vec<Vec<u8>>, BoxError> {
    let mut line = Vec::new();
    read_line(reader, &mut line).await?;
    if line.first() != Some(&b'*') {
        return Err("expected array header".into());
    }
    let count = parse_usize(&line[1..])?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line).await?;
        if line.first() != Some(&b'$') {
            return Err("expected bulk header".into());
        }
        let len = parse_usize(&line[1..])?;

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data).await?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).await?;
        if crlf != [b'\r', b'\n'] {
            return Err("missing bulk terminator".into());
        }
        args.push(data);
    }
    Ok(args)
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>, buf: &mut Vec<u8>) -> Result<(), BoxError> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf).await?;
    if bytes == 0 {
        return Err("unexpected end of stream".into());
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err("line not CRLF-terminated".into());
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_usize(digits: &[u8]) -> Result<usize, BoxError> {
    std::str::from_utf8(digits)?
        .parse()
        .map_err(|err| format!("bad length field: {err}").into())
}

fn render(args: &[Vec<u8>]) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect();
    format!("[{}]", parts.join(" "))
}

// Raw reply builders, composable through `array`.

/// `+text\r\n`
pub fn simple(text: &str) -> Vec<u8> {
    format!("+{text}\r\n").into_bytes()
}

/// `-message\r\n`
pub fn error(message: &str) -> Vec<u8> {
    format!("-{message}\r\n").into_bytes()
}

/// `:value\r\n`
pub fn integer(value: i64) -> Vec<u8> {
    format!(":{value}\r\n").into_bytes()
}

/// `$len\r\ndata\r\n`
pub fn bulk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

/// `$-1\r\n`
pub fn nil_bulk() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

/// `*N\r\n` followed by the pre-encoded parts.
pub fn array(parts: &[Vec<u8>]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", parts.len()).into_bytes();
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// `*-1\r\n`
pub fn nil_array() -> Vec<u8> {
    b"*-1\r\n".to_vec()
}
