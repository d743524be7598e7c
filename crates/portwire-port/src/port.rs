use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use portwire_adapter::{Adapter, SendOptions};

use crate::context::{CallContext, HandlerResult};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::pattern::NamePattern;
use crate::registry::Handlers;
use crate::table::PendingReply;
use crate::value::{Arg, Callback};

/// Construction-time knobs for a [`Port`].
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Name used in log lines to tell ports apart.
    pub label: String,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            label: "port".to_owned(),
        }
    }
}

impl PortConfig {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

/// One end of a request/reply channel.
///
/// A port owns its adapter and starts receiving at construction. Cloning is
/// cheap and shares the underlying channel; destroying through any clone
/// destroys them all.
///
/// ```
/// use portwire_adapter::pair;
/// use portwire_port::{Arg, Port, Reply};
///
/// let (left, right) = pair();
/// let server = Port::new(left)?;
/// let client = Port::new(right)?;
///
/// server.add_handler("echo", |_ctx, mut args| {
///     Ok(Reply::Now(args.pop().unwrap_or(Arg::null())))
/// })?;
///
/// let reply = client.request("echo", vec![Arg::from("hi")])?.wait()?;
/// assert_eq!(reply, Arg::from("hi"));
///
/// client.destroy();
/// assert!(server.ended().is_ended());
/// # Ok::<(), portwire_port::PortError>(())
/// ```
#[derive(Clone)]
pub struct Port {
    dispatcher: Arc<Dispatcher>,
}

impl Port {
    /// Wrap `adapter` and start receiving.
    pub fn new(adapter: impl Adapter + 'static) -> Result<Self> {
        Self::with_config(adapter, PortConfig::default())
    }

    /// Like [`Self::new`] with explicit configuration.
    pub fn with_config(adapter: impl Adapter + 'static, config: PortConfig) -> Result<Self> {
        let dispatcher = Dispatcher::new(Box::new(adapter), config);
        dispatcher.start()?;
        Ok(Self { dispatcher })
    }

    pub(crate) fn from_dispatcher(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn label(&self) -> &str {
        self.dispatcher.label()
    }

    /// Send a request and get a handle on the eventual reply.
    pub fn request(&self, name: &str, args: Vec<Arg>) -> Result<PendingReply> {
        self.dispatcher.request(name, args, &SendOptions::default())
    }

    /// Like [`Self::request`] with per-send adapter options.
    pub fn request_with_options(
        &self,
        name: &str,
        args: Vec<Arg>,
        options: &SendOptions,
    ) -> Result<PendingReply> {
        self.dispatcher.request(name, args, options)
    }

    /// Send a fire-and-forget message. No reply ever comes back; handler
    /// errors on the other side are reported there, not here.
    pub fn post(&self, name: &str, args: Vec<Arg>) -> Result<()> {
        self.dispatcher.post(name, args, &SendOptions::default())
    }

    /// Like [`Self::post`] with per-send adapter options.
    pub fn post_with_options(
        &self,
        name: &str,
        args: Vec<Arg>,
        options: &SendOptions,
    ) -> Result<()> {
        self.dispatcher.post(name, args, options)
    }

    /// Register a handler under an exact name. Returns `&self` so
    /// registrations chain.
    pub fn add_handler<F>(&self, name: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&mut CallContext, Vec<Arg>) -> HandlerResult + Send + Sync + 'static,
    {
        self.dispatcher.add_handler(name, Arc::new(handler))?;
        Ok(self)
    }

    /// Register a handler under a wildcard pattern (`*` any run, `?` one
    /// character). The handler learns the concrete name from its context.
    pub fn add_handler_matching<F>(&self, pattern: &str, handler: F) -> Result<&Self>
    where
        F: Fn(&mut CallContext, Vec<Arg>) -> HandlerResult + Send + Sync + 'static,
    {
        let pattern = NamePattern::compile(pattern)?;
        self.dispatcher
            .add_handler_matching(pattern, Arc::new(handler))?;
        Ok(self)
    }

    /// Register a batch of handlers under a common prefix, all or nothing.
    pub fn add_handlers(&self, prefix: &str, handlers: Handlers) -> Result<&Self> {
        self.dispatcher.add_handlers(prefix, handlers)?;
        Ok(self)
    }

    /// Remove a handler by exact name or pattern source. Returns whether
    /// one was registered.
    pub fn remove_handler(&self, name: &str) -> Result<bool> {
        self.dispatcher.remove_handler(name)
    }

    /// Whether a handler is registered under this exact name or pattern
    /// source.
    pub fn has_handler(&self, name: &str) -> Result<bool> {
        self.dispatcher.has_handler(name)
    }

    /// Drop a callback from the intern table so its wire id dies. The peer
    /// invoking it afterwards gets a "callback destroyed" error. No-op
    /// (returns `false`) if the callback was never interned.
    pub fn release_callback(&self, callback: &Callback) -> Result<bool> {
        self.dispatcher.release_callback(callback)
    }

    /// Signal that resolves when this port is destroyed, by either side.
    pub fn ended(&self) -> Ended {
        self.dispatcher.ended()
    }

    pub fn is_destroyed(&self) -> bool {
        self.dispatcher.is_destroyed()
    }

    /// Tear the port down: pending requests reject with "port destroyed",
    /// handler and callback maps clear, [`Self::ended`] resolves, and the
    /// adapter is destroyed. Idempotent; adapter errors are reported, not
    /// returned.
    pub fn destroy(&self) {
        self.dispatcher.destroy();
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("label", &self.label())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

struct EndedState {
    flag: Mutex<bool>,
    cond: Condvar,
}

/// One-shot teardown signal for a port.
///
/// Resolves exactly once, whether the port was destroyed locally or the
/// peer ended the channel. It never carries an error; waiters that need
/// the reason observe it through their pending requests.
#[derive(Clone)]
pub struct Ended {
    inner: Arc<EndedState>,
}

impl Ended {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(EndedState {
                flag: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    pub(crate) fn set(&self) {
        let mut flag = self.inner.flag.lock();
        if !*flag {
            *flag = true;
            self.inner.cond.notify_all();
        }
    }

    pub fn is_ended(&self) -> bool {
        *self.inner.flag.lock()
    }

    /// Block until the port ends.
    pub fn wait(&self) {
        let mut flag = self.inner.flag.lock();
        while !*flag {
            self.inner.cond.wait(&mut flag);
        }
    }

    /// Block until the port ends or `timeout` passes. Returns whether the
    /// port has ended.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut flag = self.inner.flag.lock();
        while !*flag {
            if self.inner.cond.wait_until(&mut flag, deadline).timed_out() {
                return *flag;
            }
        }
        true
    }
}

impl std::fmt::Debug for Ended {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ended")
            .field("ended", &self.is_ended())
            .finish()
    }
}
