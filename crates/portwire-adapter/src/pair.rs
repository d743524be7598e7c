use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use portwire_frame::Frame;

use crate::error::{AdapterError, Result};
use crate::traits::{Adapter, InboundMeta, InboundSink, SendOptions, SendOutcome};

/// One direction's delivery slot. Shared between the two adapters so each
/// can hand frames straight to the other side's sink.
#[derive(Default)]
struct PairEnd {
    sink: Mutex<Option<Arc<dyn InboundSink>>>,
}

/// In-process adapter: two linked endpoints that deliver frames to each
/// other synchronously, on the sending thread.
///
/// This is the reference transport for tests and same-process wiring. No
/// serialization happens; [`Frame`] values cross as-is.
pub struct PairAdapter {
    local: Arc<PairEnd>,
    peer: Arc<PairEnd>,
    destroyed: AtomicBool,
}

/// Create two linked adapters. Frames sent on one are delivered to the sink
/// started on the other.
pub fn pair() -> (PairAdapter, PairAdapter) {
    let left = Arc::new(PairEnd::default());
    let right = Arc::new(PairEnd::default());
    (
        PairAdapter {
            local: Arc::clone(&left),
            peer: Arc::clone(&right),
            destroyed: AtomicBool::new(false),
        },
        PairAdapter {
            local: right,
            peer: left,
            destroyed: AtomicBool::new(false),
        },
    )
}

impl Adapter for PairAdapter {
    fn start(&self, sink: Arc<dyn InboundSink>) -> Result<()> {
        let mut slot = self.local.sink.lock();
        if slot.is_some() {
            return Err(AdapterError::AlreadyStarted);
        }
        *slot = Some(sink);
        Ok(())
    }

    fn send(&self, frame: Frame, _options: &SendOptions) -> Result<SendOutcome> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(AdapterError::Closed);
        }
        // Clone out of the lock so delivery cannot deadlock with the peer.
        let sink = self.peer.sink.lock().clone();
        match sink {
            Some(sink) => {
                sink.on_frame(frame, InboundMeta::default());
                Ok(SendOutcome::Sent)
            }
            None => Err(AdapterError::Closed),
        }
    }

    fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.local.sink.lock().take();
        let peer_sink = self.peer.sink.lock().take();
        if let Some(sink) = peer_sink {
            sink.on_end();
        }
        Ok(())
    }
}

impl std::fmt::Debug for PairAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairAdapter")
            .field("destroyed", &self.destroyed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use serde_json::json;

    use super::*;

    struct ChanSink {
        frames: mpsc::Sender<Frame>,
        ends: mpsc::Sender<()>,
    }

    impl ChanSink {
        fn new() -> (Arc<Self>, mpsc::Receiver<Frame>, mpsc::Receiver<()>) {
            let (frames_tx, frames_rx) = mpsc::channel();
            let (ends_tx, ends_rx) = mpsc::channel();
            (
                Arc::new(Self {
                    frames: frames_tx,
                    ends: ends_tx,
                }),
                frames_rx,
                ends_rx,
            )
        }
    }

    impl InboundSink for ChanSink {
        fn on_frame(&self, frame: Frame, _meta: InboundMeta) {
            let _ = self.frames.send(frame);
        }

        fn on_end(&self) {
            let _ = self.ends.send(());
        }
    }

    #[test]
    fn test_frames_cross_both_directions() {
        let (a, b) = pair();
        let (sink_a, frames_a, _) = ChanSink::new();
        let (sink_b, frames_b, _) = ChanSink::new();
        a.start(sink_a).unwrap();
        b.start(sink_b).unwrap();

        a.send(Frame::request("ping", 2, vec![]), &SendOptions::new())
            .unwrap();
        b.send(Frame::post("pong", vec![json!(1)]), &SendOptions::new())
            .unwrap();

        assert_eq!(frames_b.recv().unwrap().name, "ping");
        assert_eq!(frames_a.recv().unwrap().name, "pong");
    }

    #[test]
    fn test_send_without_peer_sink_is_closed() {
        let (a, _b) = pair();
        let (sink_a, _, _) = ChanSink::new();
        a.start(sink_a).unwrap();

        let err = a
            .send(Frame::post("x", vec![]), &SendOptions::new())
            .unwrap_err();
        assert!(matches!(err, AdapterError::Closed));
    }

    #[test]
    fn test_double_start_fails() {
        let (a, _b) = pair();
        let (sink, _, _) = ChanSink::new();
        a.start(Arc::clone(&sink) as Arc<dyn InboundSink>).unwrap();
        assert!(matches!(a.start(sink), Err(AdapterError::AlreadyStarted)));
    }

    #[test]
    fn test_destroy_signals_peer_once() {
        let (a, b) = pair();
        let (sink_a, _, _) = ChanSink::new();
        let (sink_b, _, ends_b) = ChanSink::new();
        a.start(sink_a).unwrap();
        b.start(sink_b).unwrap();

        a.destroy().unwrap();
        a.destroy().unwrap();

        ends_b.recv().unwrap();
        assert!(ends_b.try_recv().is_err());
    }

    #[test]
    fn test_send_after_destroy_fails() {
        let (a, b) = pair();
        let (sink_a, _, _) = ChanSink::new();
        let (sink_b, _, _) = ChanSink::new();
        a.start(sink_a).unwrap();
        b.start(sink_b).unwrap();

        a.destroy().unwrap();

        assert!(matches!(
            a.send(Frame::post("x", vec![]), &SendOptions::new()),
            Err(AdapterError::Closed)
        ));
        // The surviving side sees a dead peer as well.
        assert!(matches!(
            b.send(Frame::post("y", vec![]), &SendOptions::new()),
            Err(AdapterError::Closed)
        ));
    }
}
