//! # Link
//!
//! The peer wire protocol: frame encoding, the transport a session sits
//! on, and the session itself.

pub mod frame;
pub mod session;
pub mod transport;

pub use frame::{Frame, FrameMethod};
pub use session::LinkSession;
pub use transport::{FrameSink, FrameStream, InMemoryTransport};
