use portwire_frame::FrameError;

/// Errors surfaced by adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// `start` was called twice, or on an adapter whose reader was consumed.
    #[error("adapter already started")]
    AlreadyStarted,

    /// The channel is gone: destroyed locally, or the peer went away.
    #[error("channel closed")]
    Closed,

    /// Encoding or decoding a frame failed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// An I/O error from the underlying stream.
    #[error("adapter I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
