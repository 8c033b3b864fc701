//! Publish/subscribe: the subscription read loop.
//!
//! After `SUBSCRIBE`/`PSUBSCRIBE` the connection stops being
//! request/response: the server pushes frames whenever it likes, and only
//! subscription commands may be written. The loop here owns the client for
//! its whole lifetime, dispatches every push to the caller's handler, and
//! hands the connection back in a clean state only when the subscription
//! count has dropped to zero.

use std::ops::ControlFlow;
use std::time::Duration;

use bstr::BString;

use crate::client::{Client, Error, ErrorKind};
use crate::connection;
use crate::connector::Connector;
use crate::resp::{Command, Reply};

/// One frame pushed by the server while subscribed.
///
/// Subscribe/unsubscribe acknowledgements carry the number of
/// subscriptions held *after* the action, not a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Acknowledges a `SUBSCRIBE` for one channel.
    Subscribe {
        /// The channel subscribed to.
        channel: BString,
        /// Subscriptions held after this one.
        count: i64,
    },
    /// Acknowledges an `UNSUBSCRIBE`. The channel is `None` when the
    /// server had nothing to unsubscribe.
    Unsubscribe {
        /// The channel unsubscribed from, if any.
        channel: Option<BString>,
        /// Subscriptions still held.
        count: i64,
    },
    /// A message published to a subscribed channel.
    Message {
        /// The channel it was published to.
        channel: BString,
        /// The published payload.
        payload: BString,
    },
    /// Acknowledges a `PSUBSCRIBE` for one pattern.
    PSubscribe {
        /// The pattern subscribed to.
        pattern: BString,
        /// Subscriptions held after this one.
        count: i64,
    },
    /// Acknowledges a `PUNSUBSCRIBE`.
    PUnsubscribe {
        /// The pattern unsubscribed from, if any.
        pattern: Option<BString>,
        /// Subscriptions still held.
        count: i64,
    },
    /// A message published to a channel matching a subscribed pattern.
    PMessage {
        /// The pattern that matched.
        pattern: BString,
        /// The channel it was published to.
        channel: BString,
        /// The published payload.
        payload: BString,
    },
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Channels,
    Patterns,
}

impl PushEvent {
    /// Parses one push frame: `[kind, channel, payload-or-count]`, or
    /// `[pmessage, pattern, channel, payload]`.
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        let items = match reply {
            Reply::Array(Some(items)) => items,
            _ => return Err(ErrorKind::UnexpectedReply.into()),
        };
        let mut items = items.into_iter();

        let kind = bulk(items.next())?;
        let event = if kind == "subscribe" {
            PushEvent::Subscribe {
                channel: bulk(items.next())?,
                count: integer(items.next())?,
            }
        } else if kind == "unsubscribe" {
            PushEvent::Unsubscribe {
                channel: nilable_bulk(items.next())?,
                count: integer(items.next())?,
            }
        } else if kind == "message" {
            PushEvent::Message {
                channel: bulk(items.next())?,
                payload: bulk(items.next())?,
            }
        } else if kind == "psubscribe" {
            PushEvent::PSubscribe {
                pattern: bulk(items.next())?,
                count: integer(items.next())?,
            }
        } else if kind == "punsubscribe" {
            PushEvent::PUnsubscribe {
                pattern: nilable_bulk(items.next())?,
                count: integer(items.next())?,
            }
        } else if kind == "pmessage" {
            PushEvent::PMessage {
                pattern: bulk(items.next())?,
                channel: bulk(items.next())?,
                payload: bulk(items.next())?,
            }
        } else {
            return Err(ErrorKind::UnexpectedReply.into());
        };
        Ok(event)
    }

    /// The post-action subscription count, for the frames that carry one.
    fn remaining(&self) -> Option<i64> {
        match self {
            PushEvent::Subscribe { count, .. }
            | PushEvent::Unsubscribe { count, .. }
            | PushEvent::PSubscribe { count, .. }
            | PushEvent::PUnsubscribe { count, .. } => Some(*count),
            _ => None,
        }
    }

    fn is_unsubscribe(&self) -> bool {
        matches!(
            self,
            PushEvent::Unsubscribe { .. } | PushEvent::PUnsubscribe { .. }
        )
    }
}

fn bulk(item: Option<Reply>) -> Result<BString, Error> {
    match item {
        Some(Reply::Bulk(Some(data))) => Ok(data),
        Some(Reply::Status(data)) => Ok(data),
        _ => Err(ErrorKind::UnexpectedReply.into()),
    }
}

fn nilable_bulk(item: Option<Reply>) -> Result<Option<BString>, Error> {
    match item {
        Some(Reply::Bulk(data)) => Ok(data),
        Some(Reply::Status(data)) => Ok(Some(data)),
        _ => Err(ErrorKind::UnexpectedReply.into()),
    }
}

fn integer(item: Option<Reply>) -> Result<i64, Error> {
    match item {
        Some(Reply::Integer(n)) => Ok(n),
        _ => Err(ErrorKind::UnexpectedReply.into()),
    }
}

impl<C: Connector> Client<C> {
    /// Subscribes to `channels` and dispatches every pushed frame to
    /// `handler` until the subscription count drops to zero.
    ///
    /// Returning `ControlFlow::Break` from the handler unsubscribes from
    /// everything and drains the remaining acknowledgements before the
    /// call returns. Reads are unbounded; use
    /// [`subscribe_with_timeout`](Self::subscribe_with_timeout) to cap the
    /// wait for the next frame.
    pub async fn subscribe<A, F>(&mut self, channels: &[A], handler: F) -> Result<(), Error>
    where
        A: AsRef<[u8]>,
        F: FnMut(PushEvent) -> Result<ControlFlow<()>, Error>,
    {
        self.subscription(Mode::Channels, channels, None, handler)
            .await
    }

    /// Like [`subscribe`](Self::subscribe), but a read waiting longer than
    /// `timeout` for the next frame raises a timeout error to the caller
    /// instead of blocking forever.
    pub async fn subscribe_with_timeout<A, F>(
        &mut self,
        timeout: Duration,
        channels: &[A],
        handler: F,
    ) -> Result<(), Error>
    where
        A: AsRef<[u8]>,
        F: FnMut(PushEvent) -> Result<ControlFlow<()>, Error>,
    {
        self.subscription(Mode::Channels, channels, Some(timeout), handler)
            .await
    }

    /// Subscribes to channel `patterns`; otherwise as [`subscribe`](Self::subscribe).
    pub async fn psubscribe<A, F>(&mut self, patterns: &[A], handler: F) -> Result<(), Error>
    where
        A: AsRef<[u8]>,
        F: FnMut(PushEvent) -> Result<ControlFlow<()>, Error>,
    {
        self.subscription(Mode::Patterns, patterns, None, handler)
            .await
    }

    /// Like [`psubscribe`](Self::psubscribe) with a bounded wait per frame.
    pub async fn psubscribe_with_timeout<A, F>(
        &mut self,
        timeout: Duration,
        patterns: &[A],
        handler: F,
    ) -> Result<(), Error>
    where
        A: AsRef<[u8]>,
        F: FnMut(PushEvent) -> Result<ControlFlow<()>, Error>,
    {
        self.subscription(Mode::Patterns, patterns, Some(timeout), handler)
            .await
    }

    /// Unsubscribing is driven from inside a subscription handler by
    /// returning `ControlFlow::Break`. A client outside the loop holds no
    /// subscriptions, so this is the usage error the protocol reserves for
    /// it; no round trip is made.
    pub fn unsubscribe(&self) -> Result<(), Error> {
        debug_assert!(!self.subscribed);
        Err(ErrorKind::NotSubscribed.into())
    }

    /// Pattern counterpart of [`unsubscribe`](Self::unsubscribe).
    pub fn punsubscribe(&self) -> Result<(), Error> {
        debug_assert!(!self.subscribed);
        Err(ErrorKind::NotSubscribed.into())
    }

    async fn subscription<A, F>(
        &mut self,
        mode: Mode,
        targets: &[A],
        timeout: Option<Duration>,
        mut handler: F,
    ) -> Result<(), Error>
    where
        A: AsRef<[u8]>,
        F: FnMut(PushEvent) -> Result<ControlFlow<()>, Error>,
    {
        let keyword: &[u8] = match mode {
            Mode::Channels => b"SUBSCRIBE",
            Mode::Patterns => b"PSUBSCRIBE",
        };
        let command = std::iter::once(keyword)
            .chain(targets.iter().map(|target| target.as_ref()))
            .collect::<Command>();

        self.subscribed = true;
        let result = {
            let mut scope = self.with_read_timeout(timeout);
            scope.drive_subscription(&command, mode, &mut handler).await
        };
        self.subscribed = false;

        // a broken-off loop leaves the connection in subscribed mode
        // server-side, useless for request/response traffic
        if result.is_err() {
            self.disconnect();
        }
        result
    }

    async fn drive_subscription<F>(
        &mut self,
        command: &Command,
        mode: Mode,
        handler: &mut F,
    ) -> Result<(), Error>
    where
        F: FnMut(PushEvent) -> Result<ControlFlow<()>, Error>,
    {
        // entering the subscription runs under the usual retry envelope;
        // once frames started flowing, failures propagate
        let mut attempt = 0;
        loop {
            let entered = async {
                let conn = self.ensure_connected().await?;
                conn.write_command(command).await?;
                Ok::<_, Error>(())
            }
            .await;
            match entered {
                Ok(()) => break,
                Err(err) => {
                    attempt += 1;
                    let reconnect = self.reconnect_enabled();
                    if !self.backoff(&err, 0, reconnect, attempt).await {
                        return Err(err);
                    }
                }
            }
        }

        let conn = match self.conn_mut() {
            Some(conn) => conn,
            None => return Err(connection::Error::Closed.into()),
        };

        let mut unsubscribing = false;
        loop {
            if !conn.has_pending_reads() {
                conn.expect_reply();
            }
            let reply = conn.read_reply().await?.into_result()?;
            let event = PushEvent::from_reply(reply)?;
            let finished = event.is_unsubscribe() && event.remaining() == Some(0);

            let flow = handler(event)?;
            if finished {
                tracing::debug!("subscription drained, leaving the read loop");
                return Ok(());
            }
            if matches!(flow, ControlFlow::Break(())) && !unsubscribing {
                unsubscribing = true;
                let keyword = match mode {
                    Mode::Channels => "UNSUBSCRIBE",
                    Mode::Patterns => "PUNSUBSCRIBE",
                };
                tracing::debug!(command = keyword, "handler broke off, unsubscribing");
                conn.write_command(&Command::new(&[keyword])).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(parts: &[Reply]) -> Reply {
        Reply::Array(Some(parts.to_vec()))
    }

    #[test]
    fn parses_message() {
        let event = PushEvent::from_reply(push(&[
            Reply::Bulk(Some("message".into())),
            Reply::Bulk(Some("news".into())),
            Reply::Bulk(Some("hello".into())),
        ]))
        .unwrap();

        assert_eq!(
            PushEvent::Message {
                channel: "news".into(),
                payload: "hello".into(),
            },
            event,
        );
        assert_eq!(None, event.remaining());
    }

    #[test]
    fn parses_pmessage_with_four_elements() {
        let event = PushEvent::from_reply(push(&[
            Reply::Bulk(Some("pmessage".into())),
            Reply::Bulk(Some("news.*".into())),
            Reply::Bulk(Some("news.tech".into())),
            Reply::Bulk(Some("hello".into())),
        ]))
        .unwrap();

        assert_eq!(
            PushEvent::PMessage {
                pattern: "news.*".into(),
                channel: "news.tech".into(),
                payload: "hello".into(),
            },
            event,
        );
    }

    #[test]
    fn subscribe_ack_carries_the_count() {
        let event = PushEvent::from_reply(push(&[
            Reply::Bulk(Some("subscribe".into())),
            Reply::Bulk(Some("news".into())),
            Reply::Integer(1),
        ]))
        .unwrap();

        assert_eq!(Some(1), event.remaining());
        assert!(!event.is_unsubscribe());
    }

    #[test]
    fn unsubscribe_with_nil_channel() {
        let event = PushEvent::from_reply(push(&[
            Reply::Bulk(Some("unsubscribe".into())),
            Reply::Bulk(None),
            Reply::Integer(0),
        ]))
        .unwrap();

        assert_eq!(
            PushEvent::Unsubscribe {
                channel: None,
                count: 0,
            },
            event,
        );
        assert!(event.is_unsubscribe());
        assert_eq!(Some(0), event.remaining());
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(PushEvent::from_reply(Reply::Integer(1)).is_err());
        assert!(PushEvent::from_reply(push(&[Reply::Bulk(Some("bogus".into()))])).is_err());
        assert!(PushEvent::from_reply(push(&[
            Reply::Bulk(Some("message".into())),
            Reply::Integer(1),
            Reply::Integer(2),
        ]))
        .is_err());
    }
}
