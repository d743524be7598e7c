/// Errors that can occur while encoding, decoding, or classifying frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header did not start with the frame magic.
    #[error("invalid frame magic (expected 0x5057 \"PW\")")]
    InvalidMagic,

    /// The frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The frame does not match any shape the protocol defines.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A tagged value carries a discriminant this protocol does not know.
    #[error("unknown value envelope {0:?}")]
    UnknownEnvelope(String),

    /// A tagged value is missing fields its discriminant requires.
    #[error("invalid {tag:?} envelope: {reason}")]
    InvalidEnvelope { tag: &'static str, reason: String },

    /// The frame body is not valid JSON, or not the expected JSON shape.
    #[error("frame JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failed while reading or writing frame bytes.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended partway through a frame.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
