//! # Transport Adapters
//!
//! Concrete [`crate::link::transport::FrameSink`]/[`crate::link::transport::FrameStream`]
//! implementations a [`crate::link::session::LinkSession`] can sit on top of,
//! other than the in-process [`crate::link::transport::InMemoryTransport`]
//! used by tests. Currently: plain core NATS publish/subscribe.

pub mod nats;

pub use nats::{NatsLinkTransport, NatsLinkTransportConfig};
