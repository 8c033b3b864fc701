//! Pipelining and transactions.
//!
//! A [`Pipeline`] queues commands without touching the socket and hands the
//! caller a [`Deferred`] per command; one [`execute`](Pipeline::execute)
//! flushes the whole batch in a single round trip and resolves every handle
//! positionally. [`Transaction`] is the same queue framed by `MULTI`/`EXEC`.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::client::{BatchOptions, Client, Error, ErrorKind};
use crate::connector::Connector;
use crate::resp::{Command, Reply, ServerError};

type Transform = Box<dyn Fn(Reply) -> Reply + Send + Sync>;
type Slot = Arc<OnceLock<Resolution>>;

/// A batch of commands flushed in one round trip.
pub struct Pipeline {
    commands: Vec<Command>,
    transforms: Vec<Option<Transform>>,
    slots: Vec<Slot>,
    shutdown: bool,
    reconnect: Option<bool>,
}

/// A `MULTI`/`EXEC`-framed batch: the server queues the commands and runs
/// them atomically on `EXEC`, or discards them all when a watched key
/// changed in between.
pub struct Transaction {
    inner: Pipeline,
}

/// A value that becomes available once its batch executes.
///
/// Reading it earlier is a usage error ([`ErrorKind::NotReady`]); reading it
/// after the batch resolves re-raises a server error reply, exactly as a
/// direct [`call`](Client::call) would have.
#[derive(Debug, Clone)]
pub struct Deferred {
    slot: Slot,
}

#[derive(Debug, Clone)]
enum Resolution {
    Reply(Reply),
    Aborted,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Pipeline {
            commands: Vec::new(),
            transforms: Vec::new(),
            slots: Vec::new(),
            shutdown: false,
            reconnect: None,
        }
    }

    /// Queues one command and returns its unresolved handle.
    pub fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Deferred {
        self.push(Command::new(args), None)
    }

    /// Queues one command with a transform applied to its (non-error) reply
    /// at resolution time, e.g. reshaping a flat array into pairs.
    pub fn call_with<A, F>(&mut self, args: &[A], transform: F) -> Deferred
    where
        A: AsRef<[u8]>,
        F: Fn(Reply) -> Reply + Send + Sync + 'static,
    {
        self.push(Command::new(args), Some(Box::new(transform)))
    }

    fn push(&mut self, command: Command, transform: Option<Transform>) -> Deferred {
        let slot: Slot = Arc::new(OnceLock::new());
        self.commands.push(command);
        self.transforms.push(transform);
        self.slots.push(Arc::clone(&slot));
        Deferred { slot }
    }

    /// Declares that this batch intentionally shuts the server down.
    ///
    /// The server drops the connection while executing `SHUTDOWN`, so with
    /// this flag set a connection reset after the batch was written makes
    /// [`execute`](Self::execute) return an empty result instead of raising.
    /// The flag is never inferred from queued command names; a user command
    /// that merely looks like `SHUTDOWN` keeps strict error reporting.
    pub fn expect_shutdown(&mut self) {
        self.shutdown = true;
    }

    /// Overrides, for this batch only, whether the client may
    /// reconnect-and-resend on a connection failure.
    pub fn with_reconnect(&mut self, enabled: bool) {
        self.reconnect = Some(enabled);
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Flushes the batch through the client and resolves every handle.
    ///
    /// Returns the resolved (transformed) replies in queue order. If any
    /// reply is a server error the first one is raised, but only after all
    /// replies were collected and all handles resolved, so the others are
    /// still readable through their [`Deferred`]s.
    pub async fn execute<C: Connector>(self, client: &mut Client<C>) -> Result<Vec<Reply>, Error> {
        let opts = BatchOptions {
            expect_shutdown: self.shutdown,
            reconnect: self.reconnect,
        };
        let replies = client.run_batch(&self.commands, opts).await?;
        if replies.is_empty() && !self.commands.is_empty() {
            // the expected shutdown swallowed the batch; handles stay unresolved
            return Ok(Vec::new());
        }

        let (values, first_error) = resolve(&self.transforms, &self.slots, replies);
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(values),
        }
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    /// An empty transaction.
    pub fn new() -> Self {
        Transaction {
            inner: Pipeline::new(),
        }
    }

    /// Queues one command inside the transaction.
    pub fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Deferred {
        self.inner.call(args)
    }

    /// Queues one command with a resolution transform.
    pub fn call_with<A, F>(&mut self, args: &[A], transform: F) -> Deferred
    where
        A: AsRef<[u8]>,
        F: Fn(Reply) -> Reply + Send + Sync + 'static,
    {
        self.inner.call_with(args, transform)
    }

    /// Number of queued commands, the `MULTI`/`EXEC` frame excluded.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Runs the transaction: `MULTI`, the queued commands, `EXEC`, in one
    /// round trip.
    ///
    /// Returns `None` when the server aborted the transaction because a
    /// `WATCH`ed key changed; every handle then resolves to the aborted
    /// state rather than to a stale reply. A command rejected at queueing
    /// time (e.g. wrong arity) raises that rejection as the governing error.
    pub async fn execute<C: Connector>(
        self,
        client: &mut Client<C>,
    ) -> Result<Option<Vec<Reply>>, Error> {
        let Transaction { inner } = self;

        let mut framed = Vec::with_capacity(inner.commands.len() + 2);
        framed.push(Command::new(&["MULTI"]));
        framed.extend(inner.commands.iter().cloned());
        framed.push(Command::new(&["EXEC"]));

        let opts = BatchOptions {
            expect_shutdown: inner.shutdown,
            reconnect: inner.reconnect,
        };
        let mut replies = client.run_batch(&framed, opts).await?;

        let exec = match replies.pop() {
            Some(reply) => reply,
            None => return Err(ErrorKind::UnexpectedReply.into()),
        };
        // the MULTI ack and one QUEUED ack per command; a rejected command
        // answers with an error here and governs over the EXEC failure
        for ack in &replies {
            if let Reply::Error(err) = ack {
                return Err(err.clone().into());
            }
        }

        match exec {
            Reply::Error(err) => Err(err.into()),
            Reply::Array(None) => {
                for slot in &inner.slots {
                    let _ = slot.set(Resolution::Aborted);
                }
                Ok(None)
            }
            Reply::Array(Some(results)) => {
                if results.len() != inner.commands.len() {
                    return Err(ErrorKind::UnexpectedReply.into());
                }
                let (values, first_error) = resolve(&inner.transforms, &inner.slots, results);
                match first_error {
                    Some(err) => Err(err.into()),
                    None => Ok(Some(values)),
                }
            }
            _ => Err(ErrorKind::UnexpectedReply.into()),
        }
    }
}

impl<C: Connector> Client<C> {
    /// Opens an empty [`Transaction`] to queue commands into.
    ///
    /// Pair with [`watch`](Client::watch) to make the `EXEC` conditional on
    /// the watched keys staying untouched.
    pub fn multi(&self) -> Transaction {
        Transaction::new()
    }
}

/// Resolves each slot positionally, applying transforms to non-error
/// replies. Returns the resolved values and the first server error, if any.
fn resolve(
    transforms: &[Option<Transform>],
    slots: &[Slot],
    replies: Vec<Reply>,
) -> (Vec<Reply>, Option<ServerError>) {
    let mut values = Vec::with_capacity(replies.len());
    let mut first_error = None;

    for (idx, reply) in replies.into_iter().enumerate() {
        let resolved = match &reply {
            Reply::Error(err) => {
                if first_error.is_none() {
                    first_error = Some(err.clone());
                }
                reply
            }
            _ => match transforms.get(idx).and_then(Option::as_ref) {
                Some(transform) => transform(reply),
                None => reply,
            },
        };
        if let Some(slot) = slots.get(idx) {
            let _ = slot.set(Resolution::Reply(resolved.clone()));
        }
        values.push(resolved);
    }

    (values, first_error)
}

impl Deferred {
    /// Whether the batch carrying this value has executed.
    pub fn ready(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Whether the owning transaction was aborted.
    pub fn aborted(&self) -> bool {
        matches!(self.slot.get(), Some(Resolution::Aborted))
    }

    /// The resolved reply.
    ///
    /// Fails with [`ErrorKind::NotReady`] before the batch executed, with
    /// [`ErrorKind::TransactionAborted`] when the owning transaction was
    /// discarded, and re-raises a server error reply as
    /// [`ErrorKind::Command`].
    pub fn value(&self) -> Result<Reply, Error> {
        match self.slot.get() {
            None => Err(ErrorKind::NotReady.into()),
            Some(Resolution::Aborted) => Err(ErrorKind::TransactionAborted.into()),
            Some(Resolution::Reply(Reply::Error(err))) => Err(err.clone().into()),
            Some(Resolution::Reply(reply)) => Ok(reply.clone()),
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("commands", &self.commands.len())
            .field("shutdown", &self.shutdown)
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("commands", &self.inner.commands.len())
            .finish_non_exhaustive()
    }
}
