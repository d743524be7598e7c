use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::{Mutex, MutexGuard};
use portwire_adapter::{Adapter, InboundMeta, InboundSink, ReplyFn, SendOptions, SendOutcome};
use portwire_frame::{Frame, FrameKind, FIRST_REQUEST_ID, POST_ID};
use serde_json::Value;

use crate::callbacks::CallbackMap;
use crate::context::{CallContext, Handler, Reply, ReplyDest, Responder};
use crate::error::{PortError, RemoteError, RemoteErrorKind, Result};
use crate::mapper;
use crate::pattern::NamePattern;
use crate::port::{Ended, Port, PortConfig};
use crate::registry::{HandlerRegistry, Handlers};
use crate::table::{PendingReply, RequestTable};
use crate::value::{Arg, Callback};

/// Everything that must stay consistent across threads, behind one lock.
struct State {
    destroyed: bool,
    next_id: i64,
    table: RequestTable,
    registry: HandlerRegistry,
    callbacks: CallbackMap,
}

impl State {
    fn alloc_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// The engine behind a [`Port`]: owns the adapter, classifies inbound
/// frames, tracks pending requests, and runs handlers.
///
/// Lock discipline: the state lock is never held while calling into the
/// adapter or into a handler. Synchronous adapters (the in-process pair)
/// deliver frames re-entrantly on the sending thread, and handlers issue
/// requests of their own; either would deadlock otherwise.
pub(crate) struct Dispatcher {
    adapter: Box<dyn Adapter>,
    label: String,
    ended: Ended,
    state: Mutex<State>,
    self_weak: Weak<Dispatcher>,
}

impl Dispatcher {
    pub(crate) fn new(adapter: Box<dyn Adapter>, config: PortConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            adapter,
            label: config.label,
            ended: Ended::new(),
            state: Mutex::new(State {
                destroyed: false,
                next_id: FIRST_REQUEST_ID,
                table: RequestTable::new(),
                registry: HandlerRegistry::new(),
                callbacks: CallbackMap::new(),
            }),
            self_weak: Weak::clone(weak),
        })
    }

    /// Install this dispatcher as the adapter's sink. Called once, by the
    /// port constructor.
    pub(crate) fn start(self: &Arc<Self>) -> Result<()> {
        let sink: Arc<Self> = Arc::clone(self);
        self.adapter.start(sink)?;
        Ok(())
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn ended(&self) -> Ended {
        self.ended.clone()
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    fn weak(&self) -> Weak<Dispatcher> {
        Weak::clone(&self.self_weak)
    }

    /// The state lock, or `Disconnected` once destroyed. Every public
    /// operation goes through this gate.
    fn lock_live(&self) -> Result<MutexGuard<'_, State>> {
        let state = self.state.lock();
        if state.destroyed {
            return Err(PortError::Disconnected);
        }
        Ok(state)
    }

    // Registration

    pub(crate) fn add_handler(&self, name: &str, handler: Arc<Handler>) -> Result<()> {
        self.lock_live()?.registry.add(name, handler)
    }

    pub(crate) fn add_handler_matching(
        &self,
        pattern: NamePattern,
        handler: Arc<Handler>,
    ) -> Result<()> {
        self.lock_live()?.registry.add_pattern(pattern, handler)
    }

    pub(crate) fn add_handlers(&self, prefix: &str, handlers: Handlers) -> Result<()> {
        self.lock_live()?
            .registry
            .add_bulk(prefix, handlers.into_entries())
    }

    pub(crate) fn remove_handler(&self, name: &str) -> Result<bool> {
        Ok(self.lock_live()?.registry.remove(name))
    }

    pub(crate) fn has_handler(&self, name: &str) -> Result<bool> {
        Ok(self.lock_live()?.registry.has(name))
    }

    pub(crate) fn release_callback(&self, callback: &Callback) -> Result<bool> {
        Ok(self.lock_live()?.callbacks.release(callback))
    }

    // Outbound

    pub(crate) fn request(
        &self,
        name: &str,
        args: Vec<Arg>,
        options: &SendOptions,
    ) -> Result<PendingReply> {
        if name.is_empty() {
            return Err(PortError::InvalidName(name.to_owned()));
        }
        self.send_tracked(args, options, |id, wire_args| {
            Frame::request(name, id, wire_args)
        })
    }

    pub(crate) fn post(&self, name: &str, args: Vec<Arg>, options: &SendOptions) -> Result<()> {
        if name.is_empty() {
            return Err(PortError::InvalidName(name.to_owned()));
        }
        let frame = {
            let mut state = self.lock_live()?;
            let wire_args = mapper::map_args(&mut state.callbacks, args);
            Frame::post(name, wire_args)
        };
        self.adapter.send(frame, options)?;
        Ok(())
    }

    /// Invoke callback `callback_id` interned on the peer. Same tracking as
    /// a request; the reply comes back to a fresh id from the same counter.
    pub(crate) fn invoke_remote(&self, callback_id: i64, args: Vec<Arg>) -> Result<PendingReply> {
        self.send_tracked(args, &SendOptions::default(), |id, wire_args| {
            Frame::nested_invoke(id, callback_id, wire_args)
        })
    }

    /// Allocate an id, park a table entry, then send outside the lock.
    ///
    /// The entry is parked before sending because a synchronous adapter can
    /// deliver the reply during `send`. If the send fails or the adapter
    /// short-circuits, the entry is taken back out.
    fn send_tracked(
        &self,
        args: Vec<Arg>,
        options: &SendOptions,
        build: impl FnOnce(i64, Vec<Value>) -> Frame,
    ) -> Result<PendingReply> {
        let (id, frame, rx) = {
            let mut state = self.lock_live()?;
            let id = state.alloc_id();
            let wire_args = mapper::map_args(&mut state.callbacks, args);
            let rx = state.table.insert(id);
            (id, build(id, wire_args), rx)
        };

        match self.adapter.send(frame, options) {
            Ok(SendOutcome::Sent) => Ok(PendingReply::waiting(rx)),
            Ok(SendOutcome::Reply(value)) => {
                let _ = self.state.lock().table.remove(id);
                Ok(PendingReply::ready(mapper::unmap_value(&self.weak(), value)))
            }
            Err(error) => {
                let _ = self.state.lock().table.remove(id);
                Err(error.into())
            }
        }
    }

    /// Map and send a reply frame for request `id`. Called by responders,
    /// possibly long after the handler returned and from any thread.
    pub(crate) fn send_reply(
        &self,
        id: i64,
        result: std::result::Result<Arg, RemoteError>,
        reply_via: Option<ReplyFn>,
    ) {
        let frame = {
            let mut state = self.state.lock();
            if state.destroyed {
                tracing::debug!(port = %self.label, id, "reply after destroy dropped");
                return;
            }
            match result {
                Ok(value) => Frame::reply(id, mapper::map_arg(&mut state.callbacks, value)),
                Err(error) => {
                    Frame::error_reply(id, mapper::map_arg(&mut state.callbacks, Arg::Error(error)))
                }
            }
        };

        match reply_via {
            Some(reply) => reply(frame),
            None => {
                if let Err(error) = self.adapter.send(frame, &SendOptions::default()) {
                    tracing::warn!(port = %self.label, id, error = %error, "failed to send reply");
                }
            }
        }
    }

    // Teardown

    /// Tear the port down: reject everything pending, clear the maps,
    /// resolve `ended`, then destroy the adapter. Safe to call any number
    /// of times, from any thread, including from inside a handler.
    pub(crate) fn destroy(&self) {
        let senders = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.registry.clear();
            state.callbacks.clear();
            state.table.drain()
        };

        tracing::debug!(port = %self.label, pending = senders.len(), "port destroyed");
        for sender in senders {
            let _ = sender.send(Err(PortError::Destroyed));
        }
        self.ended.set();

        if let Err(error) = self.adapter.destroy() {
            tracing::warn!(port = %self.label, error = %error, "adapter destroy failed");
        }
    }

    // Inbound

    fn handle_call(&self, name: String, id: i64, args: Vec<Value>, meta: InboundMeta) {
        let handler = self.state.lock().registry.resolve(&name);
        let is_request = id != POST_ID;
        let responder = if is_request {
            Responder::new(ReplyDest::Request {
                dispatcher: self.weak(),
                id,
                reply_via: meta.reply_via,
            })
        } else {
            Responder::new(ReplyDest::Post {
                label: self.label.clone(),
                name: name.clone(),
            })
        };

        let Some(handler) = handler else {
            if meta.optional {
                tracing::debug!(port = %self.label, handler = %name, "optional frame ignored");
                responder.disarm();
            } else {
                responder.reject(RemoteError::generic(format!("no such handler {name:?}")));
            }
            return;
        };

        self.dispatch_invocation(&*handler, name, is_request, meta.sender, responder, args);
    }

    fn handle_reply(&self, id: i64, is_error: bool, payload: Value) {
        let sender = self.state.lock().table.remove(id);
        let Some(sender) = sender else {
            tracing::warn!(port = %self.label, id, "bad or duplicate response id");
            return;
        };

        let result = if is_error {
            Err(self.unmap_rejection(payload))
        } else {
            mapper::unmap_value(&self.weak(), payload)
        };
        let _ = sender.send(result);
    }

    fn handle_nested(&self, nested_id: i64, callback_id: i64, args: Vec<Value>, meta: InboundMeta) {
        let callback = self.state.lock().callbacks.get(callback_id);
        let responder = Responder::new(ReplyDest::Request {
            dispatcher: self.weak(),
            id: nested_id,
            reply_via: meta.reply_via,
        });

        let Some(callback) = callback else {
            responder.reject(RemoteError::new(
                RemoteErrorKind::ReferenceError,
                format!("callback destroyed (id {callback_id})"),
            ));
            return;
        };

        if let Some(handler) = callback.local_handler() {
            self.dispatch_invocation(handler, String::new(), true, meta.sender, responder, args);
            return;
        }

        // The interned entry is itself a proxy (the callback took a detour
        // through us). Forward the invocation and relay the outcome from a
        // helper thread; the callback owner may be a third port.
        let args = match mapper::unmap_args(&self.weak(), args) {
            Ok(args) => args,
            Err(error) => {
                responder.reject(RemoteError::new(RemoteErrorKind::TypeError, error.to_string()));
                return;
            }
        };
        match callback.invoke(args) {
            Ok(pending) => {
                thread::spawn(move || relay_pending(pending, responder));
            }
            Err(error) => responder.reject(RemoteError::from(error)),
        }
    }

    /// Unmap arguments and run the handler with a fully wired context.
    fn dispatch_invocation(
        &self,
        handler: &Handler,
        name: String,
        is_request: bool,
        sender: Option<Value>,
        responder: Responder,
        wire_args: Vec<Value>,
    ) {
        let args = match mapper::unmap_args(&self.weak(), wire_args) {
            Ok(args) => args,
            Err(error) => {
                responder.reject(RemoteError::new(RemoteErrorKind::TypeError, error.to_string()));
                return;
            }
        };

        let port = self.self_weak.upgrade().map(Port::from_dispatcher);
        let ctx = CallContext::new(name, is_request, sender, port, Some(responder));
        run_handler(handler, ctx, args);
    }

    fn unmap_rejection(&self, payload: Value) -> PortError {
        match mapper::unmap_value(&self.weak(), payload) {
            Ok(Arg::Error(error)) => PortError::Remote(error),
            Ok(Arg::Value(value)) => PortError::Remote(RemoteError::generic(value.to_string())),
            Ok(Arg::Callback(_)) => {
                PortError::Remote(RemoteError::generic("request rejected with a callback"))
            }
            Err(error) => error,
        }
    }
}

impl InboundSink for Dispatcher {
    fn on_frame(&self, frame: Frame, meta: InboundMeta) {
        if self.state.lock().destroyed {
            tracing::debug!(port = %self.label, "frame after destroy dropped");
            return;
        }
        tracing::trace!(port = %self.label, name = %frame.name, id = frame.id, "inbound frame");

        match frame.classify() {
            Ok(FrameKind::Call { name, id, args }) => self.handle_call(name, id, args, meta),
            Ok(FrameKind::Reply {
                id,
                is_error,
                payload,
            }) => self.handle_reply(id, is_error, payload),
            Ok(FrameKind::Nested {
                nested_id,
                callback_id,
                args,
            }) => self.handle_nested(nested_id, callback_id, args, meta),
            Err(error) => {
                tracing::warn!(port = %self.label, error = %error, "malformed frame dropped");
            }
        }
    }

    fn on_end(&self) {
        tracing::debug!(port = %self.label, "channel ended");
        self.destroy();
    }
}

/// Run a handler and settle its call.
///
/// The verdict comes from exactly one place: the returned value, the taken
/// responder, or, for a panic, the rejection built here. A handler that
/// takes the responder and then panics has already armed the drop path; the
/// caller still gets an error reply.
pub(crate) fn run_handler(handler: &Handler, mut ctx: CallContext, args: Vec<Arg>) {
    let outcome = catch_unwind(AssertUnwindSafe(|| handler(&mut ctx, args)));
    let responder = ctx.take_responder();

    match outcome {
        Ok(Ok(Reply::Now(value))) => match responder {
            Some(responder) => responder.resolve(value),
            None => tracing::debug!("handler returned a value after deferring; ignored"),
        },
        Ok(Ok(Reply::Later)) => {
            if let Some(responder) = responder {
                tracing::debug!("handler deferred without taking the responder");
                drop(responder);
            }
        }
        Ok(Err(error)) => match responder {
            Some(responder) => responder.reject(error),
            None => tracing::warn!(error = %error, "handler failed after deferring"),
        },
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            match responder {
                Some(responder) => {
                    responder.reject(RemoteError::generic(format!("handler panicked: {message}")))
                }
                None => tracing::warn!(%message, "handler panicked after deferring"),
            }
        }
    }
}

fn relay_pending(pending: PendingReply, responder: Responder) {
    match pending.wait() {
        Ok(value) => responder.resolve(value),
        Err(error) => responder.reject(RemoteError::from(error)),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
