//! The boundary between a port and whatever moves its frames.
//!
//! An [`Adapter`] is a started-once duplex endpoint: the port installs an
//! [`InboundSink`], pushes frames through [`Adapter::send`], and tears the
//! channel down with [`Adapter::destroy`]. Everything transport-specific
//! (reconnecting, peers vanishing, broadcast fan-out) lives behind this
//! trait; the port only ever sees frames, per-frame [`InboundMeta`], and a
//! single end-of-channel signal.
//!
//! Two adapters ship in this crate:
//! - [`pair`] links two in-process endpoints, delivering synchronously.
//! - [`StreamAdapter`] speaks the length-prefixed JSON wire format over any
//!   blocking `Read`/`Write` pair, such as a Unix domain socket.

pub mod error;
pub mod pair;
pub mod stream;
pub mod traits;

pub use error::{AdapterError, Result};
pub use pair::{pair, PairAdapter};
pub use stream::{StreamAdapter, StreamConfig};
pub use traits::{Adapter, InboundMeta, InboundSink, ReplyFn, SendOptions, SendOutcome};
