//! The command-execution engine.
//!
//! For more information, see the [`Client`](self::Client) type.

use std::fmt;
use std::ops::{ControlFlow, Deref, DerefMut};
use std::time::Duration;

use tokio::io;

use crate::connection::{self, Connection};
use crate::connector::{Connector, LookupError, TcpConnector};
use crate::resp::{Command, Reply, ServerError};


/// Extra read-timeout slack granted to blocking commands, on top of the
/// server-side timeout they carry, so the server answers first.
const BLOCKING_MARGIN: Duration = Duration::from_millis(100);

/// A client for one RESP server: a single connection plus the dispatch,
/// handshake, and reconnect state machine around it.
///
/// A client is either `Disconnected` or `Connected`; it connects lazily on
/// the first dispatch and reconnects according to its [`ReconnectPolicy`].
/// Replies always come back in the order commands were written. One client
/// supports exactly one in-flight operation: every dispatch method takes
/// `&mut self`, so concurrent use requires handing out whole clients (e.g.
/// from a pool), never sharing one.
///
/// ```no_run
/// # async fn run() -> Result<(), respline::Error> {
/// use respline::Client;
///
/// let mut client = Client::new("localhost:6379").await?;
/// client.set("greeting", "hello").await?;
/// assert_eq!(Some("hello".into()), client.get("greeting").await?);
/// # Ok(()) }
/// ```
pub struct Client<C: Connector = TcpConnector> {
    connector: C,
    config: Config,
    check: Option<Check>,
    conn: Option<Connection<C::Stream>>,
    read_timeout: Option<Duration>,
    owner_pid: u32,
    reconnect_enabled: bool,
    pub(crate) subscribed: bool,
}

#[derive(Debug)]
struct Config {
    username: Option<String>,
    password: Option<String>,
    db: u32,
    setname: Option<String>,
    connect_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    reconnect: ReconnectPolicy,
    allow_inherited_socket: bool,
}

/// When and how often a failed connection is re-established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Up to `attempts` retries, sleeping `min(base_delay * 2^(n-1), max_delay)`
    /// before the n-th one.
    Exponential {
        /// Retry attempts before the failure propagates.
        attempts: u32,
        /// Delay before the first retry.
        base_delay: Duration,
        /// Upper bound on the delay.
        max_delay: Duration,
    },
    /// One retry per listed delay, in order.
    Fixed(Vec<Duration>),
}

/// A post-handshake connection check: one command sent on every (re)connect
/// whose reply must satisfy the validator before the connection is used.
///
/// Higher layers use this to verify server identity, e.g. that a failover
/// endpoint really reports `master` for `ROLE`.
pub struct Check {
    command: Command,
    validate: Box<dyn Fn(&Reply) -> Result<(), String> + Send + Sync>,
}

/// Configures and builds a [`Client`].
#[derive(Debug)]
pub struct Builder {
    config: Config,
    read_timeout: Option<Duration>,
    check: Option<Check>,
}

/// Options for one batch dispatch, set by [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BatchOptions {
    pub(crate) expect_shutdown: bool,
    pub(crate) reconnect: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(#[from] pub Box<ErrorKind>);

/// Everything a dispatch can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// The server could not be reached at connect time.
    #[error("cannot connect to {target}")]
    CannotConnect {
        /// Description of the connect target.
        target: String,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The connection failed mid-operation (I/O error, peer reset, timeout,
    /// or protocol desync).
    #[error("connection error")]
    Connection(#[from] connection::Error),
    /// The server answered with an error reply.
    #[error("server error: {0}")]
    Command(#[from] ServerError),
    /// The post-handshake connection check rejected the server.
    #[error("connection check failed: {0}")]
    CheckFailed(String),
    /// The connected socket was created by another process. Using it from
    /// two processes would interleave two reply streams on one socket.
    #[error("connection inherited from another process (pid changed since connect)")]
    InheritedConnection,
    /// A deferred value was read before its pipeline executed.
    #[error("deferred value is not ready until the pipeline executes")]
    NotReady,
    /// The transaction was aborted because a watched key changed.
    #[error("transaction aborted by a watched-key change")]
    TransactionAborted,
    /// An unsubscribe was requested without an active subscription.
    #[error("not subscribed to any channel")]
    NotSubscribed,
    /// The reply type did not match what the command promises.
    #[error("unexpected reply shape")]
    UnexpectedReply,
    /// DNS lookup failed.
    #[error("DNS lookup failed")]
    Lookup(#[from] LookupError),
}

impl Error {
    /// The error classification.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Whether reconnecting could help: connect failures and mid-operation
    /// transport failures. Protocol desync and server errors are not.
    pub fn is_connection_failure(&self) -> bool {
        match self.kind() {
            ErrorKind::CannotConnect { .. } => true,
            ErrorKind::Connection(err) => err.is_connection_failure(),
            _ => false,
        }
    }

    /// Whether this is a read/write timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connection(connection::Error::Timeout)
        )
    }

    /// The server error reply, if that is what this is.
    pub fn as_server_error(&self) -> Option<&ServerError> {
        match self.kind() {
            ErrorKind::Command(err) => Some(err),
            _ => None,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Exponential {
            attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl ReconnectPolicy {
    /// Never reconnect automatically.
    pub fn none() -> Self {
        ReconnectPolicy::Exponential {
            attempts: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// How many retries are allowed.
    pub fn attempts(&self) -> u32 {
        match self {
            ReconnectPolicy::Exponential { attempts, .. } => *attempts,
            ReconnectPolicy::Fixed(delays) => delays.len() as u32,
        }
    }

    /// The delay before the n-th retry (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            ReconnectPolicy::Exponential {
                base_delay,
                max_delay,
                ..
            } => {
                let factor = 2f64.powi(attempt.saturating_sub(1).min(i32::MAX as u32) as i32);
                let delay = base_delay.as_secs_f64() * factor;
                Duration::from_secs_f64(delay.min(max_delay.as_secs_f64()))
            }
            ReconnectPolicy::Fixed(delays) => delays
                .get(attempt.saturating_sub(1) as usize)
                .copied()
                .unwrap_or(Duration::ZERO),
        }
    }
}

impl Check {
    /// Builds a check from the command to send and the reply validator.
    pub fn new<A, F>(args: &[A], validate: F) -> Self
    where
        A: AsRef<[u8]>,
        F: Fn(&Reply) -> Result<(), String> + Send + Sync + 'static,
    {
        Check {
            command: Command::new(args),
            validate: Box::new(validate),
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl Client<TcpConnector> {
    /// Creates a client with default configuration, resolving `addr` first.
    ///
    /// The connection itself is opened lazily, on the first dispatch.
    /// If you need more tweaks use [`Client::builder()`](Self::builder) instead.
    pub async fn new(addr: &str) -> Result<Self, Error> {
        Client::builder().bind(addr).await
    }

    /// Creates a client builder.
    ///
    /// The builder from this method is not limited to the `TcpConnector`.
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// A builder with the default configuration: database 0, no
    /// authentication, no timeouts, one immediate reconnect attempt.
    pub fn new() -> Builder {
        Builder {
            config: Config {
                username: None,
                password: None,
                db: 0,
                setname: None,
                connect_timeout: None,
                write_timeout: None,
                reconnect: ReconnectPolicy::default(),
                allow_inherited_socket: false,
            },
            read_timeout: None,
            check: None,
        }
    }

    /// Authenticates with `AUTH <password>` during the handshake.
    pub fn password(mut self, password: &str) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Authenticates as an ACL user, `AUTH <username> <password>`.
    /// Only meaningful together with [`password`](Self::password).
    pub fn username(mut self, username: &str) -> Self {
        self.config.username = Some(username.into());
        self
    }

    /// Selects a database during the handshake. Database 0 is the server
    /// default, so no `SELECT` is sent for it.
    pub fn select(mut self, db: u32) -> Self {
        self.config.db = db;
        self
    }

    /// Names the connection via `CLIENT SETNAME` during the handshake.
    pub fn setname(mut self, clientname: &str) -> Self {
        self.config.setname = Some(clientname.into());
        self
    }

    /// Bounds how long opening the transport may take, handshake commands
    /// excluded (those run under the read/write timeouts).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Bounds every socket read.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Bounds every socket write.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = Some(timeout);
        self
    }

    /// Sets the reconnect policy.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Permits using a connection whose socket was opened by another
    /// process, e.g. after a fork. Off by default because two processes
    /// reading one reply stream corrupt each other silently.
    pub fn allow_inherited_socket(mut self, allow: bool) -> Self {
        self.config.allow_inherited_socket = allow;
        self
    }

    /// Installs a post-handshake [`Check`] run on every (re)connect.
    pub fn check(mut self, check: Check) -> Self {
        self.check = Some(check);
        self
    }

    /// Resolves `addr` and builds a TCP-connected client.
    pub async fn bind(self, addr: &str) -> Result<Client<TcpConnector>, Error> {
        let connector = TcpConnector::lookup(addr)
            .await
            .map_err(ErrorKind::Lookup)?;
        Ok(self.build(connector))
    }

    /// Builds a client over any [`Connector`]. No I/O happens here; the
    /// connection opens on the first dispatch or an explicit
    /// [`connect`](Client::connect).
    pub fn build<C: Connector>(self, connector: C) -> Client<C> {
        Client {
            connector,
            config: self.config,
            check: self.check,
            conn: None,
            read_timeout: self.read_timeout,
            owner_pid: std::process::id(),
            reconnect_enabled: true,
            subscribed: false,
        }
    }
}

impl<C: Connector> Client<C> {
    /// Opens the connection and runs the handshake, retrying per the
    /// reconnect policy. A no-op when already connected.
    pub async fn connect(&mut self) -> Result<(), Error> {
        let mut attempt = 0;
        loop {
            match self.ensure_connected().await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    attempt += 1;
                    if !self.backoff(&err, 0, self.reconnect_enabled, attempt).await {
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Drops the connection, if any. The next dispatch reconnects.
    pub fn disconnect(&mut self) {
        if self.conn.take().is_some() {
            tracing::debug!(server = %self.connector.describe(), "disconnected");
        }
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Replies owed by the server for commands already written.
    /// Non-zero outside a dispatch means the stream is desynchronized and
    /// will be torn down before the next command.
    pub fn pending_reads(&self) -> usize {
        self.conn.as_ref().map_or(0, Connection::pending_reads)
    }

    /// Writes one command and reads its reply.
    ///
    /// A server error reply is raised as [`ErrorKind::Command`]; use
    /// [`call_raw`](Self::call_raw) to receive it as a value instead.
    pub async fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<Reply, Error> {
        let reply = self.call_raw(&Command::new(args)).await?;
        Ok(reply.into_result()?)
    }

    /// Like [`call`](Self::call), but hands server error replies back as
    /// `Reply::Error` values, giving the caller first refusal on them.
    pub async fn call_raw(&mut self, command: &Command) -> Result<Reply, Error> {
        let mut replies = self
            .run_batch(std::slice::from_ref(command), BatchOptions::default())
            .await?;
        match replies.pop() {
            Some(reply) => Ok(reply),
            None => Err(ErrorKind::UnexpectedReply.into()),
        }
    }

    /// Writes all commands, then reads exactly one reply per command, in
    /// order.
    ///
    /// Reconnect-and-resend is only permitted while no reply of the batch
    /// has been read; afterwards the side effects of early commands have
    /// landed and a resend would execute them twice, so the failure
    /// propagates instead. If any reply is a server error, the first one is
    /// raised after all replies were collected, keeping the stream aligned.
    pub async fn call_pipelined(&mut self, commands: &[Command]) -> Result<Vec<Reply>, Error> {
        let replies = self.run_batch(commands, BatchOptions::default()).await?;
        for reply in &replies {
            if let Reply::Error(err) = reply {
                return Err(err.clone().into());
            }
        }
        Ok(replies)
    }

    /// Writes one command, then keeps reading replies until `on_reply`
    /// breaks. Used for blocking commands, where the server may take up to
    /// its own `timeout` to answer.
    ///
    /// `timeout` is the server-side timeout the command carries: the socket
    /// read timeout is raised to it plus a small margin for the duration of
    /// the loop, and `Some(Duration::ZERO)` (block forever) lifts the read
    /// timeout entirely. A server error reply terminates the loop and is
    /// raised.
    pub async fn call_loop<A, R, F>(
        &mut self,
        args: &[A],
        timeout: Option<Duration>,
        mut on_reply: F,
    ) -> Result<R, Error>
    where
        A: AsRef<[u8]>,
        F: FnMut(Reply) -> Result<ControlFlow<R>, Error>,
    {
        let command = Command::new(args);
        let read_override = match timeout {
            None => self.read_timeout,
            Some(t) if t.is_zero() => None,
            Some(t) => Some(t + BLOCKING_MARGIN),
        };

        let mut scope = self.with_read_timeout(read_override);
        scope.run_loop(&command, &mut on_reply).await
    }

    /// Scoped override of whether dispatches may reconnect-and-retry.
    /// The previous setting is restored when the returned guard drops.
    pub fn with_reconnect(&mut self, enabled: bool) -> ReconnectScope<'_, C> {
        let prev = std::mem::replace(&mut self.reconnect_enabled, enabled);
        ReconnectScope { client: self, prev }
    }

    /// Shorthand for [`with_reconnect(false)`](Self::with_reconnect).
    pub fn without_reconnect(&mut self) -> ReconnectScope<'_, C> {
        self.with_reconnect(false)
    }

    /// Scoped override of the socket read timeout, applied to the live
    /// connection and to any connection opened while the guard is held.
    pub fn with_read_timeout(&mut self, timeout: Option<Duration>) -> ReadTimeoutScope<'_, C> {
        let prev = self.override_read_timeout(timeout);
        ReadTimeoutScope { client: self, prev }
    }

    fn override_read_timeout(&mut self, timeout: Option<Duration>) -> Option<Duration> {
        let prev = std::mem::replace(&mut self.read_timeout, timeout);
        if let Some(conn) = self.conn.as_mut() {
            conn.set_read_timeout(timeout);
        }
        prev
    }

    pub(crate) async fn run_batch(
        &mut self,
        commands: &[Command],
        opts: BatchOptions,
    ) -> Result<Vec<Reply>, Error> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let reconnect_allowed = opts.reconnect.unwrap_or(self.reconnect_enabled);
        let mut attempt = 0;
        loop {
            let mut replies_read = 0;
            match self.try_batch(commands, &mut replies_read).await {
                Ok(replies) => return Ok(replies),
                Err(err) if opts.expect_shutdown && err.is_connection_failure() => {
                    // the server legitimately drops the link while executing
                    // SHUTDOWN, so there is nothing to read back
                    self.disconnect();
                    return Ok(Vec::new());
                }
                Err(err) => {
                    attempt += 1;
                    if !self.backoff(&err, replies_read, reconnect_allowed, attempt).await {
                        return Err(err);
                    }
                }
            }
        }
    }

    async fn try_batch(
        &mut self,
        commands: &[Command],
        replies_read: &mut usize,
    ) -> Result<Vec<Reply>, Error> {
        let conn = self.ensure_connected().await?;
        conn.write_commands(commands).await?;

        let mut replies = Vec::with_capacity(commands.len());
        for _ in 0..commands.len() {
            replies.push(conn.read_reply().await?);
            *replies_read += 1;
        }
        Ok(replies)
    }

    async fn run_loop<R, F>(&mut self, command: &Command, on_reply: &mut F) -> Result<R, Error>
    where
        F: FnMut(Reply) -> Result<ControlFlow<R>, Error>,
    {
        let reconnect_allowed = self.reconnect_enabled;
        let mut attempt = 0;
        loop {
            let mut replies_read = 0;
            match self.try_loop(command, &mut replies_read, on_reply).await {
                Ok(done) => return Ok(done),
                Err(err) => {
                    attempt += 1;
                    if !self.backoff(&err, replies_read, reconnect_allowed, attempt).await {
                        return Err(err);
                    }
                }
            }
        }
    }

    async fn try_loop<R, F>(
        &mut self,
        command: &Command,
        replies_read: &mut usize,
        on_reply: &mut F,
    ) -> Result<R, Error>
    where
        F: FnMut(Reply) -> Result<ControlFlow<R>, Error>,
    {
        let conn = self.ensure_connected().await?;
        conn.write_command(command).await?;
        loop {
            let reply = conn.read_reply().await?;
            *replies_read += 1;
            let reply = reply.into_result()?;
            match on_reply(reply)? {
                ControlFlow::Break(done) => return Ok(done),
                ControlFlow::Continue(()) => conn.expect_reply(),
            }
        }
    }

    pub(crate) fn reconnect_enabled(&self) -> bool {
        self.reconnect_enabled
    }

    pub(crate) fn conn_mut(&mut self) -> Option<&mut Connection<C::Stream>> {
        self.conn.as_mut()
    }

    /// Handles one dispatch failure: tears the connection down when the
    /// transport is suspect, then decides whether another attempt may run,
    /// sleeping the policy delay if so.
    ///
    /// `replies_read` guards the at-most-once boundary: once any reply of
    /// the attempt was consumed, the batch must not be resent.
    pub(crate) async fn backoff(
        &mut self,
        err: &Error,
        replies_read: usize,
        reconnect_allowed: bool,
        attempt: u32,
    ) -> bool {
        if matches!(
            err.kind(),
            ErrorKind::Connection(_) | ErrorKind::CannotConnect { .. }
        ) {
            self.disconnect();
        }

        let retry = err.is_connection_failure()
            && reconnect_allowed
            && replies_read == 0
            && attempt <= self.config.reconnect.attempts();
        if retry {
            let delay = self.config.reconnect.delay(attempt);
            tracing::warn!(
                server = %self.connector.describe(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "connection failed, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        retry
    }

    /// The gate in front of every dispatch: tears down a desynchronized
    /// connection, connects when disconnected, and refuses to use a socket
    /// inherited from another process.
    pub(crate) async fn ensure_connected(&mut self) -> Result<&mut Connection<C::Stream>, Error> {
        if self.conn.as_ref().map_or(false, Connection::has_pending_reads) {
            tracing::warn!(
                pending = self.pending_reads(),
                "unread replies left on the wire, dropping desynchronized connection"
            );
            self.conn = None;
        }

        if self.conn.is_some() {
            if std::process::id() != self.owner_pid && !self.config.allow_inherited_socket {
                return Err(ErrorKind::InheritedConnection.into());
            }
        } else {
            let conn = self.establish().await?;
            self.owner_pid = std::process::id();
            self.conn = Some(conn);
        }

        Ok(self
            .conn
            .as_mut()
            .expect("connection was just established"))
    }

    /// Opens the transport and runs the handshake: AUTH, SELECT,
    /// CLIENT SETNAME, then the configured check, in that order. Any step
    /// failing aborts the connect.
    async fn establish(&mut self) -> Result<Connection<C::Stream>, Error> {
        let target = self.connector.describe();
        tracing::debug!(server = %target, "connecting");

        let opened = match self.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, self.connector.connect())
                .await
                .unwrap_or_else(|_| {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))
                }),
            None => self.connector.connect().await,
        };
        let stream = opened.map_err(|source| {
            Error::from(ErrorKind::CannotConnect {
                target: target.clone(),
                source,
            })
        })?;

        let mut conn = Connection::new(stream, self.read_timeout, self.config.write_timeout);

        if let Some(password) = &self.config.password {
            let command = match &self.config.username {
                Some(username) => Command::new(&[
                    b"AUTH".as_slice(),
                    username.as_bytes(),
                    password.as_bytes(),
                ]),
                None => Command::new(&[b"AUTH".as_slice(), password.as_bytes()]),
            };
            exchange(&mut conn, &command).await?;
        }

        if self.config.db != 0 {
            let mut nbuf = itoa::Buffer::new();
            let command = Command::new(&["SELECT", nbuf.format(self.config.db)]);
            exchange(&mut conn, &command).await?;
        }

        if let Some(name) = &self.config.setname {
            let command = Command::new(&["CLIENT", "SETNAME", name.as_str()]);
            exchange(&mut conn, &command).await?;
        }

        if let Some(check) = &self.check {
            let reply = exchange(&mut conn, &check.command).await?;
            (check.validate)(&reply).map_err(|reason| Error::from(ErrorKind::CheckFailed(reason)))?;
        }

        tracing::debug!(server = %target, "connected");
        Ok(conn)
    }
}

/// One request/response exchange on a raw connection, raising server
/// error replies. Only used for handshake traffic, which must not go
/// through the retry machinery.
async fn exchange<T>(conn: &mut Connection<T>, command: &Command) -> Result<Reply, Error>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    conn.write_command(command).await?;
    Ok(conn.read_reply().await?.into_result()?)
}

impl<C: Connector> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.connector.describe())
            .field("connected", &self.is_connected())
            .field("pending_reads", &self.pending_reads())
            .field("subscribed", &self.subscribed)
            .finish_non_exhaustive()
    }
}

/// Restores the client's previous reconnect setting on drop.
#[derive(Debug)]
pub struct ReconnectScope<'a, C: Connector> {
    client: &'a mut Client<C>,
    prev: bool,
}

/// Restores the client's previous read timeout on drop.
#[derive(Debug)]
pub struct ReadTimeoutScope<'a, C: Connector> {
    client: &'a mut Client<C>,
    prev: Option<Duration>,
}

impl<C: Connector> Deref for ReconnectScope<'_, C> {
    type Target = Client<C>;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}

impl<C: Connector> DerefMut for ReconnectScope<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client
    }
}

impl<C: Connector> Drop for ReconnectScope<'_, C> {
    fn drop(&mut self) {
        self.client.reconnect_enabled = self.prev;
    }
}

impl<C: Connector> Deref for ReadTimeoutScope<'_, C> {
    type Target = Client<C>;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}

impl<C: Connector> DerefMut for ReadTimeoutScope<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client
    }
}

impl<C: Connector> Drop for ReadTimeoutScope<'_, C> {
    fn drop(&mut self) {
        self.client.override_read_timeout(self.prev);
    }
}

impl From<ErrorKind> for Error {
    fn from(err: ErrorKind) -> Self {
        Box::new(err).into()
    }
}

impl From<connection::Error> for Error {
    fn from(err: connection::Error) -> Self {
        ErrorKind::from(err).into()
    }
}

impl From<ServerError> for Error {
    fn from(err: ServerError) -> Self {
        ErrorKind::from(err).into()
    }
}

impl From<LookupError> for Error {
    fn from(err: LookupError) -> Self {
        ErrorKind::from(err).into()
    }
}
