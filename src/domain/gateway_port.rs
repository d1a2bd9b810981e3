//! The gateway port: the boundary the Device Registry and Node consult for
//! a non-authoritative device id, without knowing whether the gateway is
//! backed by a NATS-transported link session or an in-memory one.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::device::{Device, NotificationKind};
use super::error::DeviceError;

/// From the container's viewpoint: the link adapter pointing at the
/// authoritative peer. From the authoritative node's viewpoint: simply a
/// peer session in gateway mode.
///
/// Also doubles as the notification-forwarding sink a
/// [`crate::proxy::local::LocalProxy`] holds on a node that hosts a device
/// natively but is not authoritative for it: the same gateway link that
/// carried `register` is what carries that device's `put`/`notify`
/// notifications onward, so one trait covers both directions instead of
/// pairing this with a separate forwarder trait.
///
/// Implemented by [`crate::gateway::GatewayAdapter`] (a thin binding
/// between a [`crate::link::session::LinkSession`] and a node's gateway
/// slot, hence the shared name — the struct in `gateway` implements this
/// trait).
#[async_trait]
pub trait GatewayAdapter: Send + Sync {
    /// Forward a device registration to the authoritative peer, returning
    /// the device id the peer echoes back. `device` is the local
    /// implementation this node hosts for `id` — the forwarding session
    /// binds a fresh `connid` to it so the peer's downstream verb frames
    /// route back here.
    async fn register(&self, id: &str, device: Arc<dyn Device>) -> Result<String, DeviceError>;

    /// Forward a deregistration to the authoritative peer.
    async fn deregister(&self, id: &str) -> Result<(), DeviceError>;

    /// Obtain a connection (a `CONNECT` round trip) for a device id this
    /// gateway is authoritative for, yielding a device-shaped proxy that
    /// forwards every subsequent call over the peer link. The returned
    /// device's own `disconnect` sends the matching `DISCONNECT`.
    async fn connect(&self, id: &str) -> Result<Arc<dyn Device>, DeviceError>;

    /// Forward `deviceid`'s notification onward over this gateway link.
    async fn forward(&self, deviceid: &str, kind: NotificationKind, identifier: &str, value: &Value);
}

/// Exact-match lookup from a normalized domain to the `GatewayAdapter`
/// registered for it. Implemented by
/// [`crate::registry::gateway_registry::GatewayRegistry`]; the `*`
/// wildcard fallback is layered on top by
/// [`crate::domain::authority::AuthorityResolver::resolve`], not by this
/// trait.
pub trait GatewayLookup: Send + Sync {
    /// Find the gateway adapter registered for exactly `domain`. Callers
    /// that want wildcard fallback retry with `"*"` themselves.
    fn lookup(&self, domain: &str) -> Option<Arc<dyn GatewayAdapter>>;
}
