//! respline
//! ========
//!
//! Respline is a client-side engine for the RESP wire protocol: one
//! connection, strict request/response, pipelining with deferred values,
//! `MULTI`/`EXEC` transactions, blocking commands, pub/sub, and a reconnect
//! policy that never re-executes a command whose side effects already
//! landed.
//!
//! ## Making a query
//!
//! For most use cases the [`Client`](crate::Client) is the only thing you need to know.
//!
//! ```no_run
//! # #[tokio::main(flavor = "current_thread")] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use respline::Client;
//!
//! let mut client = Client::new("localhost:6379").await?;
//!
//! client.set("my-key", "some value").await?;
//! let fetched = client.get("my-key").await?;
//!
//! assert_eq!(Some("some value".into()), fetched);
//! # Ok(()) }
//! ```
//!
//! ## Pipelining
//!
//! A [`Pipeline`](crate::Pipeline) amortizes round trips: queue any number
//! of commands, get a [`Deferred`](crate::Deferred) handle per command, and
//! flush them all in one write.
//!
//! ```no_run
//! # #[tokio::main(flavor = "current_thread")] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use respline::{Client, Pipeline};
//!
//! let mut client = Client::new("localhost:6379").await?;
//!
//! let mut pipe = Pipeline::new();
//! pipe.call(&["SET", "counter", "1"]);
//! let bumped = pipe.call(&["INCR", "counter"]);
//! pipe.execute(&mut client).await?;
//!
//! assert_eq!(respline::Reply::Integer(2), bumped.value()?);
//! # Ok(()) }
//! ```
//!
//! ## Making a custom query
//!
//! Commands without a typed wrapper go through the same primitive every
//! wrapper uses:
//!
//! ```no_run
//! # #[tokio::main(flavor = "current_thread")] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut client = respline::Client::new("localhost:6379").await?;
//! let reply = client.call(&["OBJECT", "ENCODING", "my-key"]).await?;
//! # Ok(()) }
//! ```

// #![deny(missing_docs)]
#![deny(missing_debug_implementations)]

pub mod client;
pub mod commands;
pub mod connection;
pub mod connector;
pub mod pipeline;
pub mod pubsub;
pub mod resp;

pub use client::{Builder, Check, Client, Error, ErrorKind, ReconnectPolicy};
pub use commands::Ttl;
pub use pipeline::{Deferred, Pipeline, Transaction};
pub use pubsub::PushEvent;
pub use resp::{Command, Reply, ServerError};
