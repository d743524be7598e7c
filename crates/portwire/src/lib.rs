//! Request/reply messaging over arbitrary duplex channels.
//!
//! portwire connects two endpoints and lets each side call named handlers
//! on the other: requests that settle with a value or a structured error,
//! fire-and-forget posts, and callbacks that travel inside arguments and
//! stay invocable across the wire. The channel itself is pluggable; an
//! adapter bridges the port to whatever moves the frames.
//!
//! # Crate Structure
//!
//! - [`frame`] — Wire format: call, reply, and nested frames plus tagged
//!   envelopes for callbacks and errors
//! - [`adapter`] — Channel abstraction: in-process pairs and byte streams
//! - [`port`] — The port itself: handlers, requests, callbacks, teardown

/// Re-export frame types.
pub mod frame {
    pub use portwire_frame::*;
}

/// Re-export adapter types.
pub mod adapter {
    pub use portwire_adapter::*;
}

/// Re-export port types.
pub mod port {
    pub use portwire_port::*;
}
