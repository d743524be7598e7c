use std::sync::Arc;

use portwire_frame::Frame;
use serde_json::{Map, Value};

use crate::error::Result;

/// Callback an adapter can attach to a frame to collect the reply itself,
/// bypassing the normal outbound path. Used by transports whose inbound
/// messages carry their own response channel.
pub type ReplyFn = Box<dyn FnOnce(Frame) + Send>;

/// Where inbound frames and the end-of-channel signal are delivered.
///
/// The port installs itself as the sink when it takes ownership of an
/// adapter. Implementations must tolerate delivery from any thread.
pub trait InboundSink: Send + Sync {
    /// A complete frame arrived.
    fn on_frame(&self, frame: Frame, meta: InboundMeta);

    /// The channel ended. Delivered at most once; the port tears down.
    fn on_end(&self);
}

/// Per-frame delivery metadata supplied by the adapter.
#[derive(Default)]
pub struct InboundMeta {
    /// The frame may be ignored if no handler matches, instead of producing
    /// a "no such handler" error. Set by broadcast-style transports.
    pub optional: bool,
    /// Transport-level description of who sent the frame, if the transport
    /// knows. Handlers see it as their sender.
    pub sender: Option<Value>,
    /// Route the reply through this instead of `Adapter::send`.
    pub reply_via: Option<ReplyFn>,
}

impl InboundMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_sender(mut self, sender: Value) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_reply_via(mut self, reply_via: impl FnOnce(Frame) + Send + 'static) -> Self {
        self.reply_via = Some(Box::new(reply_via));
        self
    }
}

impl std::fmt::Debug for InboundMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundMeta")
            .field("optional", &self.optional)
            .field("sender", &self.sender)
            .field("reply_via", &self.reply_via.is_some())
            .finish()
    }
}

/// Opaque per-send options forwarded from the caller to the adapter.
///
/// The port never interprets these; adapters document the keys they honor.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    entries: Map<String, Value>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What became of an outbound frame.
#[derive(Debug)]
pub enum SendOutcome {
    /// The frame left (or was queued by) the transport.
    Sent,
    /// The transport answered the request inline. The value is the reply
    /// payload, still in wire form; no reply frame will follow.
    Reply(Value),
}

/// A duplex channel endpoint the port can drive.
///
/// Adapters bridge the port to whatever actually moves bytes: an in-process
/// pair, a socket, a child process, a message bus. The contract is small on
/// purpose; everything protocol-shaped stays in the port.
pub trait Adapter: Send + Sync {
    /// Begin delivering inbound traffic to `sink`. Called exactly once,
    /// before any `send`.
    fn start(&self, sink: Arc<dyn InboundSink>) -> Result<()>;

    /// Transmit one frame. May short-circuit a request by returning
    /// [`SendOutcome::Reply`].
    fn send(&self, frame: Frame, options: &SendOptions) -> Result<SendOutcome>;

    /// Tear the channel down. Idempotent; the peer should observe an end of
    /// channel. Errors are reported by the port, not surfaced to callers.
    fn destroy(&self) -> Result<()>;
}
