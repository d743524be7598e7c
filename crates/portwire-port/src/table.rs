use std::collections::HashMap;
use std::sync::mpsc;
use std::time::Duration;

use crate::error::{PortError, Result};
use crate::value::Arg;

/// What a pending request eventually settles to.
pub(crate) type ReplyResult = Result<Arg>;

/// The sending half parked in the table until the reply frame shows up.
pub(crate) type ReplySender = mpsc::Sender<ReplyResult>;

/// Pending requests by id. One entry per in-flight request or nested
/// callback invocation; the entry leaves the table exactly once, on reply,
/// short-circuit, send failure, or teardown.
pub(crate) struct RequestTable {
    entries: HashMap<i64, ReplySender>,
}

impl RequestTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Park a new entry under `id` and hand back the receiving half.
    pub fn insert(&mut self, id: i64) -> mpsc::Receiver<ReplyResult> {
        let (tx, rx) = mpsc::channel();
        self.entries.insert(id, tx);
        rx
    }

    /// Take the entry for `id`, if any. `None` means the id was never
    /// issued, already settled, or the table was drained.
    pub fn remove(&mut self, id: i64) -> Option<ReplySender> {
        self.entries.remove(&id)
    }

    /// Empty the table, returning every parked sender. Teardown path.
    pub fn drain(&mut self) -> Vec<ReplySender> {
        self.entries.drain().map(|(_, tx)| tx).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum PendingState {
    /// Settled before the caller ever waited. `None` once consumed.
    Ready(Option<ReplyResult>),
    Waiting(mpsc::Receiver<ReplyResult>),
}

/// A request in flight.
///
/// Handed out by `Port::request` and `Callback::invoke`. Block on it with
/// [`wait`](Self::wait), bound the block with
/// [`wait_timeout`](Self::wait_timeout), or poll with
/// [`try_wait`](Self::try_wait). Dropping it abandons the result; the
/// request itself is not cancelled and the table entry is cleaned up when
/// the reply arrives.
pub struct PendingReply {
    state: PendingState,
}

impl PendingReply {
    pub(crate) fn ready(result: ReplyResult) -> Self {
        Self {
            state: PendingState::Ready(Some(result)),
        }
    }

    pub(crate) fn waiting(rx: mpsc::Receiver<ReplyResult>) -> Self {
        Self {
            state: PendingState::Waiting(rx),
        }
    }

    /// Block until the request settles.
    pub fn wait(self) -> ReplyResult {
        match self.state {
            PendingState::Ready(result) => result.unwrap_or(Err(PortError::Destroyed)),
            PendingState::Waiting(rx) => match rx.recv() {
                Ok(result) => result,
                Err(_) => Err(PortError::Destroyed),
            },
        }
    }

    /// Block until the request settles or `timeout` passes. On timeout the
    /// request keeps pending on the wire; only this wait gives up.
    pub fn wait_timeout(self, timeout: Duration) -> ReplyResult {
        match self.state {
            PendingState::Ready(result) => result.unwrap_or(Err(PortError::Destroyed)),
            PendingState::Waiting(rx) => match rx.recv_timeout(timeout) {
                Ok(result) => result,
                Err(mpsc::RecvTimeoutError::Timeout) => Err(PortError::Timeout(timeout)),
                Err(mpsc::RecvTimeoutError::Disconnected) => Err(PortError::Destroyed),
            },
        }
    }

    /// Non-blocking poll. Returns `None` while the request is still
    /// pending; the settled result exactly once after that.
    pub fn try_wait(&mut self) -> Option<ReplyResult> {
        match &mut self.state {
            PendingState::Ready(slot) => slot.take(),
            PendingState::Waiting(rx) => match rx.try_recv() {
                Ok(result) => {
                    self.state = PendingState::Ready(None);
                    Some(result)
                }
                Err(mpsc::TryRecvError::Empty) => None,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.state = PendingState::Ready(None);
                    Some(Err(PortError::Destroyed))
                }
            },
        }
    }
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            PendingState::Ready(Some(_)) => "ready",
            PendingState::Ready(None) => "consumed",
            PendingState::Waiting(_) => "waiting",
        };
        f.debug_struct("PendingReply").field("state", &state).finish()
    }
}
