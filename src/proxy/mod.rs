//! # Proxies
//!
//! The two device-shaped objects `connect` can hand back to a caller: a
//! [`local::LocalProxy`] whose every call re-enters this node's dispatcher,
//! and a [`remote::RemoteDeviceProxy`] whose every call crosses a peer link
//! as a protocol frame.

pub mod local;
pub mod remote;

pub use local::LocalProxy;
pub use remote::RemoteDeviceProxy;
