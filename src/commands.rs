//! Typed command wrappers.
//!
//! Every method here is a thin, explicit shim: build the argument array,
//! dispatch through [`call`](Client::call) (or
//! [`call_loop`](Client::call_loop) for the blocking variants), convert the
//! reply. The engine underneath never interprets command names; this table
//! is the only place that knows what a command means. Commands not covered
//! here go through [`call`](Client::call) directly.

use std::ops::ControlFlow;
use std::time::Duration;

use bstr::BString;

use crate::client::{Client, Error, ErrorKind};
use crate::connector::Connector;
use crate::pipeline::Pipeline;
use crate::resp::Reply;

/// TTL state of a key, lifting the protocol's `-2`/`-1` sentinels into a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist (or just expired).
    Missing,
    /// The key exists and never expires.
    NoExpiry,
    /// The key expires after this long.
    ExpiresIn(Duration),
}

impl<C: Connector> Client<C> {
    /// <https://redis.io/commands/ping>
    pub async fn ping(&mut self) -> Result<BString, Error> {
        let reply = self.call(&["PING"]).await?;
        expect_bulk(reply)?.ok_or_else(|| ErrorKind::UnexpectedReply.into())
    }

    /// <https://redis.io/commands/echo>
    pub async fn echo<M: AsRef<[u8]>>(&mut self, message: M) -> Result<BString, Error> {
        let reply = self.call(&[b"ECHO".as_slice(), message.as_ref()]).await?;
        expect_bulk(reply)?.ok_or_else(|| ErrorKind::UnexpectedReply.into())
    }

    /// <https://redis.io/commands/get>
    ///
    /// Returns `None` when the key is absent.
    pub async fn get<K: AsRef<[u8]>>(&mut self, key: K) -> Result<Option<BString>, Error> {
        let reply = self.call(&[b"GET".as_slice(), key.as_ref()]).await?;
        expect_bulk(reply)
    }

    /// <https://redis.io/commands/set>
    pub async fn set<K, V>(&mut self, key: K, value: V) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let reply = self
            .call(&[b"SET".as_slice(), key.as_ref(), value.as_ref()])
            .await?;
        expect_ok(reply)
    }

    /// <https://redis.io/commands/setex>
    pub async fn setex<K, V>(&mut self, key: K, seconds: u64, value: V) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut nbuf = itoa::Buffer::new();
        let reply = self
            .call(&[
                b"SETEX".as_slice(),
                key.as_ref(),
                nbuf.format(seconds).as_bytes(),
                value.as_ref(),
            ])
            .await?;
        expect_ok(reply)
    }

    /// <https://redis.io/commands/del>
    ///
    /// Returns how many of the keys existed and were removed.
    pub async fn del<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<i64, Error> {
        let args = prepend(b"DEL", keys);
        let reply = self.call(&args).await?;
        expect_integer(reply)
    }

    /// <https://redis.io/commands/exists>
    pub async fn exists<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<i64, Error> {
        let args = prepend(b"EXISTS", keys);
        let reply = self.call(&args).await?;
        expect_integer(reply)
    }

    /// <https://redis.io/commands/incr>
    pub async fn incr<K: AsRef<[u8]>>(&mut self, key: K) -> Result<i64, Error> {
        let reply = self.call(&[b"INCR".as_slice(), key.as_ref()]).await?;
        expect_integer(reply)
    }

    /// <https://redis.io/commands/incrby>
    pub async fn incrby<K: AsRef<[u8]>>(&mut self, key: K, delta: i64) -> Result<i64, Error> {
        let mut nbuf = itoa::Buffer::new();
        let reply = self
            .call(&[
                b"INCRBY".as_slice(),
                key.as_ref(),
                nbuf.format(delta).as_bytes(),
            ])
            .await?;
        expect_integer(reply)
    }

    /// <https://redis.io/commands/decr>
    pub async fn decr<K: AsRef<[u8]>>(&mut self, key: K) -> Result<i64, Error> {
        let reply = self.call(&[b"DECR".as_slice(), key.as_ref()]).await?;
        expect_integer(reply)
    }

    /// <https://redis.io/commands/expire>
    ///
    /// Returns whether a timeout was set (false when the key is absent).
    pub async fn expire<K: AsRef<[u8]>>(&mut self, key: K, seconds: u64) -> Result<bool, Error> {
        let mut nbuf = itoa::Buffer::new();
        let reply = self
            .call(&[
                b"EXPIRE".as_slice(),
                key.as_ref(),
                nbuf.format(seconds).as_bytes(),
            ])
            .await?;
        Ok(expect_integer(reply)? == 1)
    }

    /// <https://redis.io/commands/ttl>
    pub async fn ttl<K: AsRef<[u8]>>(&mut self, key: K) -> Result<Ttl, Error> {
        let reply = self.call(&[b"TTL".as_slice(), key.as_ref()]).await?;
        match expect_integer(reply)? {
            -2 => Ok(Ttl::Missing),
            -1 => Ok(Ttl::NoExpiry),
            n if n >= 0 => Ok(Ttl::ExpiresIn(Duration::from_secs(n as u64))),
            _ => Err(ErrorKind::UnexpectedReply.into()),
        }
    }

    /// <https://redis.io/commands/lpush>
    ///
    /// Returns the list length after the push.
    pub async fn lpush<K, V>(&mut self, key: K, values: &[V]) -> Result<i64, Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut args: Vec<&[u8]> = vec![b"LPUSH", key.as_ref()];
        args.extend(values.iter().map(|value| value.as_ref()));
        let reply = self.call(&args).await?;
        expect_integer(reply)
    }

    /// <https://redis.io/commands/rpush>
    pub async fn rpush<K, V>(&mut self, key: K, values: &[V]) -> Result<i64, Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut args: Vec<&[u8]> = vec![b"RPUSH", key.as_ref()];
        args.extend(values.iter().map(|value| value.as_ref()));
        let reply = self.call(&args).await?;
        expect_integer(reply)
    }

    /// <https://redis.io/commands/lpop>
    pub async fn lpop<K: AsRef<[u8]>>(&mut self, key: K) -> Result<Option<BString>, Error> {
        let reply = self.call(&[b"LPOP".as_slice(), key.as_ref()]).await?;
        expect_bulk(reply)
    }

    /// <https://redis.io/commands/rpop>
    pub async fn rpop<K: AsRef<[u8]>>(&mut self, key: K) -> Result<Option<BString>, Error> {
        let reply = self.call(&[b"RPOP".as_slice(), key.as_ref()]).await?;
        expect_bulk(reply)
    }

    /// <https://redis.io/commands/lrange>
    pub async fn lrange<K: AsRef<[u8]>>(
        &mut self,
        key: K,
        start: i64,
        stop: i64,
    ) -> Result<Vec<BString>, Error> {
        let mut start_buf = itoa::Buffer::new();
        let mut stop_buf = itoa::Buffer::new();
        let reply = self
            .call(&[
                b"LRANGE".as_slice(),
                key.as_ref(),
                start_buf.format(start).as_bytes(),
                stop_buf.format(stop).as_bytes(),
            ])
            .await?;

        let items = match reply.into_array() {
            Some(Some(items)) => items,
            Some(None) => Vec::new(),
            None => return Err(ErrorKind::UnexpectedReply.into()),
        };
        items
            .into_iter()
            .map(|item| expect_bulk(item)?.ok_or_else(|| ErrorKind::UnexpectedReply.into()))
            .collect()
    }

    /// <https://redis.io/commands/blpop>
    ///
    /// Blocks server-side until an element arrives on one of `keys` or
    /// `timeout` passes; `Duration::ZERO` blocks forever. Returns the key
    /// it popped from and the element, or `None` on timeout.
    pub async fn blpop<K: AsRef<[u8]>>(
        &mut self,
        keys: &[K],
        timeout: Duration,
    ) -> Result<Option<(BString, BString)>, Error> {
        self.bpop(b"BLPOP", keys, timeout).await
    }

    /// <https://redis.io/commands/brpop>
    pub async fn brpop<K: AsRef<[u8]>>(
        &mut self,
        keys: &[K],
        timeout: Duration,
    ) -> Result<Option<(BString, BString)>, Error> {
        self.bpop(b"BRPOP", keys, timeout).await
    }

    async fn bpop<K: AsRef<[u8]>>(
        &mut self,
        name: &[u8],
        keys: &[K],
        timeout: Duration,
    ) -> Result<Option<(BString, BString)>, Error> {
        let mut nbuf = itoa::Buffer::new();
        let mut args: Vec<&[u8]> = vec![name];
        args.extend(keys.iter().map(|key| key.as_ref()));
        args.push(nbuf.format(timeout.as_secs()).as_bytes());

        self.call_loop(&args, Some(timeout), |reply| {
            let popped = match reply {
                Reply::Array(None) => None,
                Reply::Array(Some(items)) => {
                    let mut items = items.into_iter();
                    match (items.next(), items.next()) {
                        (Some(Reply::Bulk(Some(key))), Some(Reply::Bulk(Some(value)))) => {
                            Some((key, value))
                        }
                        _ => return Err(ErrorKind::UnexpectedReply.into()),
                    }
                }
                _ => return Err(ErrorKind::UnexpectedReply.into()),
            };
            Ok(ControlFlow::Break(popped))
        })
        .await
    }

    /// <https://redis.io/commands/publish>
    ///
    /// Returns how many subscribers received the message.
    pub async fn publish<Ch, M>(&mut self, channel: Ch, message: M) -> Result<i64, Error>
    where
        Ch: AsRef<[u8]>,
        M: AsRef<[u8]>,
    {
        let reply = self
            .call(&[b"PUBLISH".as_slice(), channel.as_ref(), message.as_ref()])
            .await?;
        expect_integer(reply)
    }

    /// <https://redis.io/commands/watch>
    ///
    /// Marks keys whose change before `EXEC` aborts the next
    /// [`Transaction`](crate::Transaction).
    pub async fn watch<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<(), Error> {
        let args = prepend(b"WATCH", keys);
        let reply = self.call(&args).await?;
        expect_ok(reply)
    }

    /// <https://redis.io/commands/unwatch>
    pub async fn unwatch(&mut self) -> Result<(), Error> {
        let reply = self.call(&["UNWATCH"]).await?;
        expect_ok(reply)
    }

    /// <https://redis.io/commands/info>
    pub async fn info(&mut self, section: Option<&str>) -> Result<BString, Error> {
        let reply = match section {
            Some(section) => {
                self.call(&[b"INFO".as_slice(), section.as_bytes()])
                    .await?
            }
            None => self.call(&["INFO"]).await?,
        };
        expect_bulk(reply)?.ok_or_else(|| ErrorKind::UnexpectedReply.into())
    }

    /// <https://redis.io/commands/flushdb>
    pub async fn flushdb(&mut self) -> Result<(), Error> {
        let reply = self.call(&["FLUSHDB"]).await?;
        expect_ok(reply)
    }

    /// <https://redis.io/commands/shutdown>
    ///
    /// Asks the server to persist and exit. A successful shutdown drops
    /// the connection instead of replying, so a reset here is success; a
    /// reply only comes back when the server refused, and is raised.
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        let mut pipe = Pipeline::new();
        pipe.call(&["SHUTDOWN"]);
        pipe.expect_shutdown();
        pipe.with_reconnect(false);
        pipe.execute(self).await?;
        Ok(())
    }
}

/// Builds `[name, keys...]` argument arrays for the variadic-key commands.
fn prepend<'a, K: AsRef<[u8]>>(name: &'a [u8], keys: &'a [K]) -> Vec<&'a [u8]> {
    let mut args: Vec<&[u8]> = Vec::with_capacity(keys.len() + 1);
    args.push(name);
    args.extend(keys.iter().map(|key| key.as_ref()));
    args
}

fn expect_ok(reply: Reply) -> Result<(), Error> {
    if reply.is_ok_status() {
        Ok(())
    } else {
        Err(ErrorKind::UnexpectedReply.into())
    }
}

fn expect_integer(reply: Reply) -> Result<i64, Error> {
    reply
        .integer()
        .ok_or_else(|| ErrorKind::UnexpectedReply.into())
}

fn expect_bulk(reply: Reply) -> Result<Option<BString>, Error> {
    reply
        .into_bulk()
        .ok_or_else(|| ErrorKind::UnexpectedReply.into())
}
