//! The transport abstraction a [`crate::link::session::LinkSession`] sits
//! on top of: a `FrameSink`/`FrameStream` pair, so the session's protocol
//! logic never depends on whether frames travel over NATS subjects or an
//! in-process channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::error::DeviceError;
use crate::link::frame::Frame;

/// The outgoing half of a transport: send one frame.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Send `frame`. Errors here are send failures, not protocol errors.
    async fn send(&self, frame: Frame) -> Result<(), DeviceError>;
}

/// The incoming half of a transport: receive frames one at a time, in
/// arrival order. Returns `None` once the peer side is gone.
#[async_trait]
pub trait FrameStream: Send {
    /// Await the next frame, or `None` at end of stream.
    async fn recv(&mut self) -> Option<Frame>;
}

/// An in-process duplex transport joining two [`crate::link::session::LinkSession`]s
/// without a real message bus. Supplementary plumbing for tests and
/// in-process embedding, not part of the peer wire protocol itself.
pub struct InMemoryTransport;

impl InMemoryTransport {
    /// Build a connected pair of `(sink, stream)` halves: frames sent on
    /// side A's sink arrive on side B's stream and vice versa.
    #[must_use]
    pub fn pair() -> (
        (Box<dyn FrameSink>, Box<dyn FrameStream>),
        (Box<dyn FrameSink>, Box<dyn FrameStream>),
    ) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        (
            (
                Box::new(ChannelSink(tx_a)) as Box<dyn FrameSink>,
                Box::new(ChannelStream(rx_b)) as Box<dyn FrameStream>,
            ),
            (
                Box::new(ChannelSink(tx_b)) as Box<dyn FrameSink>,
                Box::new(ChannelStream(rx_a)) as Box<dyn FrameStream>,
            ),
        )
    }
}

struct ChannelSink(mpsc::UnboundedSender<Frame>);

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&self, frame: Frame) -> Result<(), DeviceError> {
        self.0
            .send(frame)
            .map_err(|_| DeviceError::Transport("peer side of in-memory transport is gone".to_string()))
    }
}

struct ChannelStream(mpsc::UnboundedReceiver<Frame>);

#[async_trait]
impl FrameStream for ChannelStream {
    async fn recv(&mut self) -> Option<Frame> {
        self.0.recv().await
    }
}
