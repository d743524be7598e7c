use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use bytes::BytesMut;
use parking_lot::Mutex;
use portwire_frame::{codec, Frame, FrameError};

use crate::error::{AdapterError, Result};
use crate::traits::{Adapter, InboundMeta, InboundSink, SendOptions, SendOutcome};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Configuration for [`StreamAdapter`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum frame body size in bytes, enforced both ways. Default: 16 MiB.
    pub max_frame_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_frame_size: codec::DEFAULT_MAX_FRAME,
        }
    }
}

type ShutdownFn = Box<dyn FnOnce() + Send>;

/// Write half plus its scratch buffer, kept together under one lock.
struct WriteHalf<W> {
    inner: W,
    buf: BytesMut,
}

/// Adapter over any blocking `Read`/`Write` pair, using the length-prefixed
/// JSON wire format.
///
/// `start` moves the read half onto a background thread that feeds the sink
/// until EOF or a protocol error. Writes happen on the calling thread.
/// `destroy` runs the registered shutdown hook (if any) so a blocked reader
/// wakes up; for sockets that is a `shutdown(Both)` on a cloned handle.
pub struct StreamAdapter<R, W> {
    reader: Mutex<Option<R>>,
    writer: Mutex<WriteHalf<W>>,
    shutdown: Mutex<Option<ShutdownFn>>,
    config: StreamConfig,
    destroyed: AtomicBool,
}

impl<R, W> StreamAdapter<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send,
{
    /// Create an adapter with default configuration.
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, StreamConfig::default())
    }

    /// Create an adapter with explicit configuration.
    pub fn with_config(reader: R, writer: W, config: StreamConfig) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(WriteHalf {
                inner: writer,
                buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            }),
            shutdown: Mutex::new(None),
            config,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Register a hook run once on `destroy`, before the adapter reports
    /// itself closed. Use it to unblock the read half.
    pub fn with_shutdown(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *self.shutdown.lock() = Some(Box::new(hook));
        self
    }
}

#[cfg(unix)]
impl StreamAdapter<std::os::unix::net::UnixStream, std::os::unix::net::UnixStream> {
    /// Adapter over a Unix domain socket stream. Clones the handle for the
    /// read half and wires `destroy` to shut the socket down.
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Result<Self> {
        Self::from_unix_with_config(stream, StreamConfig::default())
    }

    /// Like [`Self::from_unix`] with explicit configuration.
    pub fn from_unix_with_config(
        stream: std::os::unix::net::UnixStream,
        config: StreamConfig,
    ) -> Result<Self> {
        let reader = stream.try_clone()?;
        let closer = stream.try_clone()?;
        Ok(Self::with_config(reader, stream, config).with_shutdown(move || {
            let _ = closer.shutdown(std::net::Shutdown::Both);
        }))
    }
}

impl<R, W> Adapter for StreamAdapter<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send,
{
    fn start(&self, sink: Arc<dyn InboundSink>) -> Result<()> {
        let reader = self
            .reader
            .lock()
            .take()
            .ok_or(AdapterError::AlreadyStarted)?;
        let max_frame = self.config.max_frame_size;
        thread::spawn(move || read_loop(reader, sink, max_frame));
        Ok(())
    }

    fn send(&self, frame: Frame, _options: &SendOptions) -> Result<SendOutcome> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(AdapterError::Closed);
        }

        let body = codec::encode_json(&frame)?;
        if body.len() > self.config.max_frame_size {
            return Err(AdapterError::Frame(FrameError::FrameTooLarge {
                size: body.len(),
                max: self.config.max_frame_size,
            }));
        }

        let mut half = self.writer.lock();
        let half = &mut *half;
        half.buf.clear();
        codec::encode_body(&body, &mut half.buf)?;

        let mut offset = 0usize;
        while offset < half.buf.len() {
            match half.inner.write(&half.buf[offset..]) {
                Ok(0) => return Err(AdapterError::Frame(FrameError::ConnectionClosed)),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(AdapterError::Io(err)),
            }
        }

        loop {
            match half.inner.flush() {
                Ok(()) => return Ok(SendOutcome::Sent),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(AdapterError::Io(err)),
            }
        }
    }

    fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(hook) = self.shutdown.lock().take() {
            hook();
        }
        Ok(())
    }
}

impl<R, W> std::fmt::Debug for StreamAdapter<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAdapter")
            .field("max_frame_size", &self.config.max_frame_size)
            .field("destroyed", &self.destroyed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Pump frames from the stream into the sink until the channel dies.
///
/// EOF, I/O failure, and protocol violations all end the same way: the sink
/// gets `on_end` and the loop exits. The port treats each as a disconnect.
fn read_loop<R: Read>(mut reader: R, sink: Arc<dyn InboundSink>, max_frame: usize) {
    let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
    'pump: loop {
        loop {
            match codec::decode_frame(&mut buf, max_frame) {
                Ok(Some(frame)) => sink.on_frame(frame, InboundMeta::default()),
                Ok(None) => break, // Need more data
                Err(err) => {
                    tracing::warn!(error = %err, "stream decode failed, ending channel");
                    break 'pump;
                }
            }
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = match reader.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::debug!(error = %err, "stream read failed, ending channel");
                break;
            }
        };

        if read == 0 {
            break; // EOF
        }
        buf.extend_from_slice(&chunk[..read]);
    }
    sink.on_end();
}
