use std::sync::Weak;

use portwire_adapter::ReplyFn;
use serde_json::Value;

use crate::dispatch::Dispatcher;
use crate::error::{PortError, RemoteError, Result};
use crate::port::Port;
use crate::table::ReplySender;
use crate::value::Arg;

/// What a handler produces: an immediate reply value, a deferral, or an
/// error that becomes an error reply.
pub type HandlerResult = std::result::Result<Reply, RemoteError>;

/// A registered message handler.
///
/// Handlers run on whatever thread delivers the frame. State they need is
/// captured in the closure; the [`CallContext`] carries the per-call facts.
/// Stream transports deliver every frame from one read thread, so a handler
/// that blocks on a nested reply there stalls delivery; take the responder
/// and settle off-thread instead.
pub type Handler = dyn Fn(&mut CallContext, Vec<Arg>) -> HandlerResult + Send + Sync;

/// A handler's immediate outcome.
#[derive(Debug)]
pub enum Reply {
    /// Reply with this value right away (ignored for posts).
    Now(Arg),
    /// The reply comes later, through the [`Responder`] the handler took.
    Later,
}

impl Reply {
    /// Shorthand for `Reply::Now(value.into())`.
    pub fn now(value: impl Into<Arg>) -> Self {
        Reply::Now(value.into())
    }
}

/// Per-call facts handed to a handler.
pub struct CallContext {
    name: String,
    is_request: bool,
    sender: Option<Value>,
    port: Option<Port>,
    responder: Option<Responder>,
}

impl CallContext {
    pub(crate) fn new(
        name: String,
        is_request: bool,
        sender: Option<Value>,
        port: Option<Port>,
        responder: Option<Responder>,
    ) -> Self {
        Self {
            name,
            is_request,
            sender,
            port,
            responder,
        }
    }

    /// The name the frame was addressed to. For wildcard handlers this is
    /// how the concrete name reaches the handler; for direct callback
    /// invocations it is empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the caller is waiting on a reply. Posts return `false`; for
    /// them any reply value is discarded and errors are reported locally.
    pub fn is_request(&self) -> bool {
        self.is_request
    }

    /// Transport-supplied sender description, when the adapter knows one.
    pub fn sender(&self) -> Option<&Value> {
        self.sender.as_ref()
    }

    /// The port this call arrived on, for issuing requests from inside a
    /// handler. Detached callback invocations have no port.
    pub fn port(&self) -> Result<&Port> {
        self.port.as_ref().ok_or(PortError::Disconnected)
    }

    /// Take the responder to reply later. Works once; the handler then
    /// returns [`Reply::Later`] and settles the responder from wherever it
    /// ends up, on any thread.
    pub fn responder(&mut self) -> Result<Responder> {
        self.responder.take().ok_or(PortError::ResponderTaken)
    }

    pub(crate) fn take_responder(&mut self) -> Option<Responder> {
        self.responder.take()
    }
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("name", &self.name)
            .field("is_request", &self.is_request)
            .field("sender", &self.sender)
            .field("responder", &self.responder.is_some())
            .finish()
    }
}

/// Where a responder delivers its verdict.
pub(crate) enum ReplyDest {
    /// Reply on the wire to request `id`, through the port (or the frame's
    /// own reply route when the adapter supplied one).
    Request {
        dispatcher: Weak<Dispatcher>,
        id: i64,
        reply_via: Option<ReplyFn>,
    },
    /// The call was a post: values are discarded, errors reported locally.
    Post { label: String, name: String },
    /// Settle a local waiter directly. Used for in-process callback
    /// invocations that never touch the wire.
    Channel { tx: ReplySender },
}

/// The one-shot right to answer a call.
///
/// Exactly one verdict reaches the caller: [`resolve`](Self::resolve),
/// [`reject`](Self::reject), or, if the responder is dropped unfulfilled,
/// an error reply saying so. It is `Send`, so deferred handlers can carry
/// it to worker threads.
pub struct Responder {
    dest: Option<ReplyDest>,
}

impl Responder {
    pub(crate) fn new(dest: ReplyDest) -> Self {
        Self { dest: Some(dest) }
    }

    /// Answer the call with a value.
    pub fn resolve(mut self, value: impl Into<Arg>) {
        self.complete(Ok(value.into()));
    }

    /// Answer the call with an error.
    pub fn reject(mut self, error: RemoteError) {
        self.complete(Err(error));
    }

    /// Forget the call without answering. Only for frames that may be
    /// ignored outright; a dropped (rather than disarmed) responder answers
    /// with an error.
    pub(crate) fn disarm(mut self) {
        self.dest = None;
    }

    fn complete(&mut self, result: std::result::Result<Arg, RemoteError>) {
        let Some(dest) = self.dest.take() else {
            return;
        };
        match dest {
            ReplyDest::Request {
                dispatcher,
                id,
                reply_via,
            } => match dispatcher.upgrade() {
                Some(dispatcher) => dispatcher.send_reply(id, result, reply_via),
                None => tracing::debug!(id, "reply dropped, port is gone"),
            },
            ReplyDest::Post { label, name } => {
                if let Err(error) = result {
                    tracing::warn!(
                        port = %label,
                        handler = %name,
                        error = %error,
                        "post handler failed"
                    );
                }
            }
            ReplyDest::Channel { tx } => {
                let _ = tx.send(result.map_err(PortError::Remote));
            }
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.dest.is_some() {
            self.complete(Err(RemoteError::generic("reply dropped before fulfillment")));
        }
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("fulfilled", &self.dest.is_none())
            .finish()
    }
}
