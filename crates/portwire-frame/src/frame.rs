use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{FrameError, Result};

/// The id carried by fire-and-forget frames. No reply is ever sent for it.
pub const POST_ID: i64 = 0;

/// The first id a port hands out for a request. Ids then grow monotonically.
pub const FIRST_REQUEST_ID: i64 = 2;

/// Sub-operation code inside a nested frame. Invocation is the only one defined.
pub const NESTED_INVOKE: i64 = 0;

/// One message on the wire: the JSON array `[name, id, args]`.
///
/// The triple is deliberately loose; [`Frame::classify`] is the single place
/// that decides what a received triple means. Outbound frames are built
/// through the constructors, which only produce well-formed shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Target handler name. Empty on replies and nested frames.
    pub name: String,
    /// Request id, `POST_ID` for posts, negated id for error replies.
    pub id: i64,
    /// Positional arguments (or the reply payload as a single element).
    pub args: Vec<Value>,
}

/// What a received frame means, decided by [`Frame::classify`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    /// An inbound invocation of a named handler. `id == POST_ID` means no
    /// reply is expected.
    Call {
        name: String,
        id: i64,
        args: Vec<Value>,
    },
    /// A reply settling the pending request `id` on our side.
    Reply {
        id: i64,
        is_error: bool,
        payload: Value,
    },
    /// An invocation of one of our interned callbacks. The reply (if any)
    /// targets `nested_id` on the sender's side.
    Nested {
        nested_id: i64,
        callback_id: i64,
        args: Vec<Value>,
    },
}

impl Frame {
    /// Build a request frame. `id` must be a positive id from the port's counter.
    pub fn request(name: impl Into<String>, id: i64, args: Vec<Value>) -> Self {
        debug_assert!(id >= FIRST_REQUEST_ID);
        Self {
            name: name.into(),
            id,
            args,
        }
    }

    /// Build a fire-and-forget frame. Carries `POST_ID` so no reply comes back.
    pub fn post(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            id: POST_ID,
            args,
        }
    }

    /// Build a success reply to request `id`.
    pub fn reply(id: i64, value: Value) -> Self {
        debug_assert!(id > 0);
        Self {
            name: String::new(),
            id,
            args: vec![value],
        }
    }

    /// Build an error reply to request `id`. The sign of the id carries the
    /// error flag on the wire.
    pub fn error_reply(id: i64, error: Value) -> Self {
        debug_assert!(id > 0);
        Self {
            name: String::new(),
            id: -id,
            args: vec![error],
        }
    }

    /// Build a nested frame invoking the peer's callback `callback_id`.
    /// The peer replies to `nested_id` like it would to a plain request.
    pub fn nested_invoke(nested_id: i64, callback_id: i64, args: Vec<Value>) -> Self {
        debug_assert!(nested_id > 0);
        Self {
            name: String::new(),
            id: 0,
            args: vec![
                Value::from(nested_id),
                Value::from(NESTED_INVOKE),
                Value::from(callback_id),
                Value::Array(args),
            ],
        }
    }

    /// Decide what this frame means.
    ///
    /// A non-empty name is a call (request or post by id). An empty name with
    /// a non-zero id is a reply; the sign selects success or error. An empty
    /// name with id zero is a nested frame whose real shape lives in `args`.
    pub fn classify(self) -> Result<FrameKind> {
        if !self.name.is_empty() {
            if self.id < 0 {
                return Err(FrameError::Malformed(format!(
                    "negative id {} on call frame {:?}",
                    self.id, self.name
                )));
            }
            return Ok(FrameKind::Call {
                name: self.name,
                id: self.id,
                args: self.args,
            });
        }

        if self.id != 0 {
            let is_error = self.id < 0;
            let id = self
                .id
                .checked_abs()
                .ok_or_else(|| FrameError::Malformed(format!("reply id {} out of range", self.id)))?;
            let payload = self.args.into_iter().next().unwrap_or(Value::Null);
            return Ok(FrameKind::Reply {
                id,
                is_error,
                payload,
            });
        }

        classify_nested(self.args)
    }
}

/// Nested frames pack `[nested_id, op, callback_id, args]` into the outer
/// argument list.
fn classify_nested(args: Vec<Value>) -> Result<FrameKind> {
    if args.len() != 4 {
        return Err(FrameError::Malformed(format!(
            "nested frame needs 4 elements, got {}",
            args.len()
        )));
    }
    let mut parts = args.into_iter();
    let nested_id = expect_i64(parts.next(), "nested id")?;
    let op = expect_i64(parts.next(), "nested op")?;
    let callback_id = expect_i64(parts.next(), "callback id")?;
    let nested_args = match parts.next() {
        Some(Value::Array(values)) => values,
        other => {
            return Err(FrameError::Malformed(format!(
                "nested args must be an array, got {other:?}"
            )))
        }
    };

    if op != NESTED_INVOKE {
        return Err(FrameError::Malformed(format!("unknown nested op {op}")));
    }
    if nested_id <= 0 {
        return Err(FrameError::Malformed(format!(
            "nested id must be positive, got {nested_id}"
        )));
    }

    Ok(FrameKind::Nested {
        nested_id,
        callback_id,
        args: nested_args,
    })
}

fn expect_i64(value: Option<Value>, what: &str) -> Result<i64> {
    value
        .as_ref()
        .and_then(Value::as_i64)
        .ok_or_else(|| FrameError::Malformed(format!("{what} must be an integer, got {value:?}")))
}

// On the wire a frame is the plain JSON array `[name, id, args]`, not an
// object, so serde goes through the tuple representation.
impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.name, self.id, &self.args).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Frame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (name, id, args) = <(String, i64, Vec<Value>)>::deserialize(deserializer)?;
        Ok(Self { name, id, args })
    }
}
