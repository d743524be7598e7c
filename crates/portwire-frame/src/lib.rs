//! Wire model for portwire: frame triples, value envelopes, and the
//! length-prefixed JSON codec.
//!
//! Every message is the JSON array `[name, id, args]`:
//! - A non-empty `name` invokes a handler; `id == 0` means fire-and-forget.
//! - An empty `name` with a non-zero `id` settles a pending request; a
//!   negative id marks the reply as an error.
//! - An empty `name` with `id == 0` invokes an interned callback, with the
//!   real ids packed into `args`.
//!
//! Stream transports frame each body with a 2-byte magic ("PW") and a 4-byte
//! little-endian length. In-process transports pass [`Frame`] values directly.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod frame;

pub use codec::{
    decode_frame, decode_json, encode_body, encode_frame, encode_json, DEFAULT_MAX_FRAME,
    HEADER_SIZE, MAGIC,
};
pub use envelope::{Decoded, Envelope, ErrorInfo, TAG_CALLBACK, TAG_ERROR, TAG_KEY, TAG_RAW};
pub use error::{FrameError, Result};
pub use frame::{Frame, FrameKind, FIRST_REQUEST_ID, NESTED_INVOKE, POST_ID};
