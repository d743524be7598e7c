use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FrameError, Result};

/// Reserved object key marking a value as an envelope rather than plain data.
pub const TAG_KEY: &str = "@port";

/// Discriminant for interned callback references.
pub const TAG_CALLBACK: &str = "callback";

/// Discriminant for serialized errors.
pub const TAG_ERROR: &str = "error";

/// Discriminant for plain objects that happen to contain [`TAG_KEY`].
pub const TAG_RAW: &str = "raw";

/// Error fields carried inside an error envelope.
///
/// `name` and `message` are always present; the location fields travel only
/// when the throwing side captured them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            file_name: None,
            line_number: None,
            column_number: None,
        }
    }
}

/// A value that needs special treatment on the wire.
///
/// Plain JSON travels untouched; callbacks, errors, and objects colliding
/// with the reserved key are wrapped in a tagged object so the receiving
/// side can reconstruct them.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Reference to a callback interned under `id` on the sending side.
    Callback { id: i64 },
    /// A serialized error.
    Error(ErrorInfo),
    /// A plain object that contained [`TAG_KEY`] itself and had to be wrapped.
    Raw(Value),
}

/// Outcome of [`Envelope::decode`]: either a recognized envelope or the
/// untouched plain value.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Envelope(Envelope),
    Plain(Value),
}

impl Envelope {
    /// Whether `value` is an object carrying the reserved tag key.
    pub fn is_tagged(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|map| map.contains_key(TAG_KEY))
    }

    /// Render this envelope as its wire object.
    pub fn encode(self) -> Value {
        let mut map = Map::new();
        match self {
            Envelope::Callback { id } => {
                map.insert(TAG_KEY.to_owned(), Value::from(TAG_CALLBACK));
                map.insert("id".to_owned(), Value::from(id));
            }
            Envelope::Error(info) => {
                map.insert(TAG_KEY.to_owned(), Value::from(TAG_ERROR));
                map.insert("name".to_owned(), Value::String(info.name));
                map.insert("message".to_owned(), Value::String(info.message));
                if let Some(stack) = info.stack {
                    map.insert("stack".to_owned(), Value::String(stack));
                }
                if let Some(file_name) = info.file_name {
                    map.insert("file_name".to_owned(), Value::String(file_name));
                }
                if let Some(line) = info.line_number {
                    map.insert("line_number".to_owned(), Value::from(line));
                }
                if let Some(column) = info.column_number {
                    map.insert("column_number".to_owned(), Value::from(column));
                }
            }
            Envelope::Raw(inner) => {
                map.insert(TAG_KEY.to_owned(), Value::from(TAG_RAW));
                map.insert("value".to_owned(), inner);
            }
        }
        Value::Object(map)
    }

    /// Decode a wire value.
    ///
    /// Values without the tag key pass through as [`Decoded::Plain`]. Tagged
    /// values must carry a known discriminant and its required fields, or the
    /// whole argument list is rejected by the caller.
    pub fn decode(value: Value) -> Result<Decoded> {
        let mut map = match value {
            Value::Object(map) if map.contains_key(TAG_KEY) => map,
            other => return Ok(Decoded::Plain(other)),
        };

        let tag = match map.get(TAG_KEY).and_then(Value::as_str) {
            Some(tag) => tag.to_owned(),
            None => {
                let got = map.get(TAG_KEY).cloned().unwrap_or_default();
                return Err(FrameError::UnknownEnvelope(got.to_string()));
            }
        };

        match tag.as_str() {
            TAG_CALLBACK => {
                let id = map.get("id").and_then(Value::as_i64).ok_or_else(|| {
                    FrameError::InvalidEnvelope {
                        tag: TAG_CALLBACK,
                        reason: "missing integer id".into(),
                    }
                })?;
                Ok(Decoded::Envelope(Envelope::Callback { id }))
            }
            TAG_ERROR => {
                let info = serde_json::from_value::<ErrorInfo>(Value::Object(map)).map_err(
                    |err| FrameError::InvalidEnvelope {
                        tag: TAG_ERROR,
                        reason: err.to_string(),
                    },
                )?;
                Ok(Decoded::Envelope(Envelope::Error(info)))
            }
            TAG_RAW => {
                let inner = map.remove("value").ok_or(FrameError::InvalidEnvelope {
                    tag: TAG_RAW,
                    reason: "missing wrapped value".into(),
                })?;
                Ok(Decoded::Envelope(Envelope::Raw(inner)))
            }
            other => Err(FrameError::UnknownEnvelope(other.to_owned())),
        }
    }
}
