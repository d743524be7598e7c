use std::sync::mpsc;
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::context::{CallContext, Handler, HandlerResult, Reply, ReplyDest, Responder};
use crate::dispatch::{run_handler, Dispatcher};
use crate::error::{PortError, RemoteError, Result};
use crate::table::PendingReply;

/// A value crossing the port, before mapping (outbound) or after unmapping
/// (inbound).
///
/// Plain data stays as JSON. Callbacks and errors are first-class: the
/// mapper turns them into tagged envelopes on the way out and back into
/// these variants on the way in.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Plain JSON data.
    Value(Value),
    /// An invokable function, local or a proxy for a remote one.
    Callback(Callback),
    /// An error travelling as data (not a failed call).
    Error(RemoteError),
}

impl Arg {
    pub fn null() -> Self {
        Arg::Value(Value::Null)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Arg::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Arg::Callback(callback) => Some(callback),
            _ => None,
        }
    }

    pub fn into_callback(self) -> Option<Callback> {
        match self {
            Arg::Callback(callback) => Some(callback),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&RemoteError> {
        match self {
            Arg::Error(error) => Some(error),
            _ => None,
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<Callback> for Arg {
    fn from(callback: Callback) -> Self {
        Arg::Callback(callback)
    }
}

impl From<RemoteError> for Arg {
    fn from(error: RemoteError) -> Self {
        Arg::Error(error)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Value(Value::from(value))
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Value(Value::from(value))
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Value(Value::from(value))
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Value(Value::from(value))
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Value(Value::from(value))
    }
}

pub(crate) enum CallbackInner {
    /// A function on this side.
    Local(Box<Handler>),
    /// A proxy for callback `id` interned on the peer reachable through
    /// `origin`.
    Remote {
        id: i64,
        origin: Weak<Dispatcher>,
    },
}

/// An invokable function value.
///
/// Identity is the handle: clones compare equal and intern to the same wire
/// id, separately-created callbacks never do, matching how function values
/// behave in the protocol. Invoking a remote proxy does a full request round
/// trip; invoking a local callback runs it right here.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<CallbackInner>,
}

impl Callback {
    /// Wrap a plain function. The call context is dropped; most callbacks
    /// only care about their arguments.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<Arg>) -> std::result::Result<Arg, RemoteError> + Send + Sync + 'static,
    {
        Self::with_context(move |_ctx, args| f(args).map(Reply::Now))
    }

    /// Wrap a function that wants the full handler signature, including the
    /// responder for deferred replies.
    pub fn with_context<F>(f: F) -> Self
    where
        F: Fn(&mut CallContext, Vec<Arg>) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(CallbackInner::Local(Box::new(f))),
        }
    }

    pub(crate) fn remote(id: i64, origin: Weak<Dispatcher>) -> Self {
        Self {
            inner: Arc::new(CallbackInner::Remote { id, origin }),
        }
    }

    /// Whether this is a proxy for a function on the other side.
    pub fn is_remote(&self) -> bool {
        matches!(&*self.inner, CallbackInner::Remote { .. })
    }

    /// Stable identity key for interning. Clones share it.
    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub(crate) fn local_handler(&self) -> Option<&Handler> {
        match &*self.inner {
            CallbackInner::Local(handler) => Some(&**handler),
            CallbackInner::Remote { .. } => None,
        }
    }

    /// Invoke the callback.
    ///
    /// Local callbacks run synchronously on this thread; the returned
    /// [`PendingReply`] is settled before this returns unless the callback
    /// deferred. Remote proxies send a nested frame through the originating
    /// port and settle when the peer replies. Fails with
    /// [`PortError::Disconnected`] if that port has been destroyed.
    pub fn invoke(&self, args: Vec<Arg>) -> Result<PendingReply> {
        match &*self.inner {
            CallbackInner::Local(handler) => {
                let (tx, rx) = mpsc::channel();
                let responder = Responder::new(ReplyDest::Channel { tx });
                let ctx = CallContext::new(String::new(), true, None, None, Some(responder));
                run_handler(handler, ctx, args);
                Ok(PendingReply::waiting(rx))
            }
            CallbackInner::Remote { id, origin } => {
                let dispatcher = origin.upgrade().ok_or(PortError::Disconnected)?;
                dispatcher.invoke_remote(*id, args)
            }
        }
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.inner {
            CallbackInner::Local(_) => f.debug_struct("Callback").field("kind", &"local").finish(),
            CallbackInner::Remote { id, .. } => f
                .debug_struct("Callback")
                .field("kind", &"remote")
                .field("id", id)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_local_invoke_resolves_synchronously() {
        let double = Callback::new(|args| {
            let n = args[0].as_value().and_then(Value::as_i64).unwrap_or(0);
            Ok(Arg::from(n * 2))
        });

        let result = double.invoke(vec![Arg::from(21i64)]).unwrap().wait();
        assert_eq!(result.unwrap(), Arg::from(42i64));
    }

    #[test]
    fn test_local_invoke_propagates_errors() {
        let failing = Callback::new(|_args| Err(RemoteError::generic("denied")));

        let result = failing.invoke(vec![]).unwrap().wait();
        match result {
            Err(PortError::Remote(error)) => assert_eq!(error.message, "denied"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_local_invoke_catches_panics() {
        let panicking = Callback::new(|_args| panic!("broken callback"));

        let result = panicking.invoke(vec![]).unwrap().wait();
        match result {
            Err(PortError::Remote(error)) => {
                assert!(error.message.contains("broken callback"));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_deferred_local_invoke() {
        let deferred = Callback::with_context(|ctx, args| {
            let responder = ctx.responder()?;
            std::thread::spawn(move || responder.resolve(args.len() as i64));
            Ok(Reply::Later)
        });

        let result = deferred
            .invoke(vec![Arg::null(), Arg::from("x")])
            .unwrap()
            .wait();
        assert_eq!(result.unwrap(), Arg::from(2i64));
    }

    #[test]
    fn test_identity_follows_clones() {
        let a = Callback::new(|_| Ok(Arg::null()));
        let b = a.clone();
        let c = Callback::new(|_| Ok(Arg::null()));

        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
        assert_ne!(a, c);
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_dead_remote_proxy_is_disconnected() {
        let proxy = Callback::remote(3, Weak::new());
        assert!(proxy.is_remote());
        assert!(matches!(
            proxy.invoke(vec![Arg::from(json!(1))]),
            Err(PortError::Disconnected)
        ));
    }

    #[test]
    fn test_arg_accessors() {
        assert_eq!(Arg::from(json!({"k": 1})).as_value(), Some(&json!({"k": 1})));
        assert!(Arg::from(Callback::new(|_| Ok(Arg::null())))
            .as_callback()
            .is_some());
        assert_eq!(
            Arg::from(RemoteError::generic("e")).as_error().map(|e| e.message.as_str()),
            Some("e")
        );
        assert_eq!(Arg::from("s").into_value(), Some(json!("s")));
        assert_eq!(Arg::from(true), Arg::Value(json!(true)));
    }
}
