//! Request/reply ports over arbitrary duplex channels.
//!
//! A [`Port`] wraps an adapter from `portwire-adapter` and exchanges named
//! calls with whatever sits on the other end: requests that settle with a
//! value or an error, fire-and-forget posts, and callbacks that travel
//! inside arguments and stay invocable across the wire.
//!
//! Handlers are registered by exact name or wildcard pattern and reply
//! either by returning or by taking a [`Responder`] and settling later.
//! Teardown is idempotent from both sides and observable through
//! [`Port::ended`].

mod callbacks;
pub mod context;
mod dispatch;
pub mod error;
mod mapper;
pub mod pattern;
pub mod port;
pub mod registry;
pub mod table;
pub mod value;

pub use context::{CallContext, Handler, HandlerResult, Reply, Responder};
pub use error::{PortError, RemoteError, RemoteErrorKind, Result};
pub use pattern::NamePattern;
pub use port::{Ended, Port, PortConfig};
pub use registry::Handlers;
pub use table::PendingReply;
pub use value::{Arg, Callback};
