//! Abstraction over the reliable, ordered, bidirectional byte-stream
//! channel the transfer engine is layered on (`spec.md` §4.2: "Assume: a
//! reliable, ordered, bidirectional channel... that can carry both text
//! messages and opaque binary payloads, and exposes an outbound-buffered-
//! bytes counter"). The real implementation is a WebRTC `RTCDataChannel`;
//! that's out of scope here (`spec.md` §1), so the engine is generic over
//! this trait instead.

use async_trait::async_trait;

use crate::error::Result;

/// A bidirectional channel capable of carrying text and binary frames,
/// with visibility into its outbound buffer fill level for backpressure.
#[async_trait]
pub trait DataChannel: Send + Sync {
    /// Send a UTF-8 text frame (JSON control messages).
    async fn send_text(&self, text: String) -> Result<()>;

    /// Send an opaque binary frame (sequence-headered data chunks).
    async fn send_binary(&self, data: Vec<u8>) -> Result<()>;

    /// Bytes currently queued in the channel's outbound buffer, not yet
    /// flushed to the wire. The sender polls this for backpressure
    /// (`spec.md` §4.2 step 3).
    fn buffered_bytes(&self) -> usize;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    //! An in-memory [`DataChannel`] for exercising the sender/receiver
    //! state machines without a real data channel.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::DataChannel;
    use crate::error::Result;

    /// A frame captured off an in-memory channel.
    #[derive(Debug, Clone, PartialEq)]
    pub enum CapturedFrame {
        /// A text control frame.
        Text(String),
        /// A binary frame.
        Binary(Vec<u8>),
    }

    /// The receiving end of a [`MemoryChannel`] pair.
    pub struct MemoryChannelRx {
        rx: mpsc::UnboundedReceiver<CapturedFrame>,
    }

    impl MemoryChannelRx {
        /// Receive the next frame sent on the paired [`MemoryChannel`].
        pub async fn recv(&mut self) -> Option<CapturedFrame> {
            self.rx.recv().await
        }
    }

    /// An in-memory [`DataChannel`] whose "outbound buffer" is simply the
    /// count of bytes sent minus bytes drained by the test harness via
    /// [`MemoryChannel::drain`] — this lets tests simulate a slow or
    /// indefinitely-buffering peer for backpressure tests.
    pub struct MemoryChannel {
        tx: mpsc::UnboundedSender<CapturedFrame>,
        buffered: Arc<AtomicUsize>,
    }

    impl MemoryChannel {
        /// Create a connected in-memory channel pair.
        pub fn pair() -> (Self, MemoryChannelRx) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Self {
                    tx,
                    buffered: Arc::new(AtomicUsize::new(0)),
                },
                MemoryChannelRx { rx },
            )
        }

        /// Simulate the peer acknowledging (draining) `n` bytes from the
        /// outbound buffer.
        pub fn drain(&self, n: usize) {
            self.buffered.fetch_sub(n.min(self.buffered.load(Ordering::SeqCst)), Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl DataChannel for MemoryChannel {
        async fn send_text(&self, text: String) -> Result<()> {
            self.buffered.fetch_add(text.len(), Ordering::SeqCst);
            let _ = self.tx.send(CapturedFrame::Text(text));
            Ok(())
        }

        async fn send_binary(&self, data: Vec<u8>) -> Result<()> {
            self.buffered.fetch_add(data.len(), Ordering::SeqCst);
            let _ = self.tx.send(CapturedFrame::Binary(data));
            Ok(())
        }

        fn buffered_bytes(&self) -> usize {
            self.buffered.load(Ordering::SeqCst)
        }
    }
}
