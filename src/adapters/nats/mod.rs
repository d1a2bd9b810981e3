//! # NATS Link Transport
//!
//! Carries the peer wire protocol (`crate::link::frame::Frame`) over plain
//! core NATS publish/subscribe: one subject per direction, no JetStream
//! persistence, since the link protocol's own `reqid`/`pending` machinery
//! already supplies request/response correlation and session teardown
//! already supplies the "lost messages on disconnect are fine" semantics
//! spec.md calls for (no delivery guarantees for notifications, no
//! persistence across restarts).
//!
//! A frame that fails to decode — malformed JSON, or a non-UTF-8 payload
//! standing in for a rejected binary message — is logged and dropped; it
//! does not end the stream, matching spec.md §7's "invalid frames are
//! fatal to the frame, not the session."

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use crate::domain::error::DeviceError;
use crate::link::frame::Frame;
use crate::link::transport::{FrameSink, FrameStream};

/// Configuration for one end of a NATS-carried peer link.
#[derive(Debug, Clone)]
pub struct NatsLinkTransportConfig {
    /// NATS server URL, e.g. `nats://localhost:4222`.
    pub nats_url: String,
    /// Subject this end publishes outgoing frames to.
    pub send_subject: String,
    /// Subject this end subscribes to for incoming frames.
    pub recv_subject: String,
}

/// Connects a peer link over core NATS.
pub struct NatsLinkTransport;

impl NatsLinkTransport {
    /// Connect to `config.nats_url` and return the sink/stream pair a
    /// [`crate::link::session::LinkSession`] can be opened with.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Transport`] if the NATS connection or the
    /// subscription to `recv_subject` fails.
    pub async fn connect(
        config: NatsLinkTransportConfig,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), DeviceError> {
        let client = async_nats::connect(&config.nats_url)
            .await
            .map_err(|err| DeviceError::Transport(format!("nats connect to {} failed: {err}", config.nats_url)))?;

        let subscriber = client
            .subscribe(config.recv_subject.clone())
            .await
            .map_err(|err| DeviceError::Transport(format!("nats subscribe to {} failed: {err}", config.recv_subject)))?;

        tracing::info!(
            nats_url = %config.nats_url,
            send_subject = %config.send_subject,
            recv_subject = %config.recv_subject,
            "nats link transport connected"
        );

        let sink = NatsFrameSink {
            client,
            subject: config.send_subject,
        };
        let stream = NatsFrameStream { subscriber };
        Ok((Box::new(sink), Box::new(stream)))
    }
}

struct NatsFrameSink {
    client: async_nats::Client,
    subject: String,
}

#[async_trait]
impl FrameSink for NatsFrameSink {
    async fn send(&self, frame: Frame) -> Result<(), DeviceError> {
        let text = frame.encode()?;
        self.client
            .publish(self.subject.clone(), Bytes::from(text.into_bytes()))
            .await
            .map_err(|err| DeviceError::Transport(format!("nats publish failed: {err}")))
    }
}

struct NatsFrameStream {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl FrameStream for NatsFrameStream {
    async fn recv(&mut self) -> Option<Frame> {
        loop {
            let message = self.subscriber.next().await?;
            let text = match std::str::from_utf8(&message.payload) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!("discarding a non-UTF-8 nats message (binary frames are rejected)");
                    continue;
                }
            };
            match Frame::decode(text) {
                Ok(frame) => return Some(frame),
                Err(err) => {
                    tracing::warn!(%err, "discarding a malformed frame");
                    continue;
                }
            }
        }
    }
}
