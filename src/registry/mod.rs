//! # Registries
//!
//! The Device Registry, Proxy Registry, and Gateway Registry: node-scoped
//! maps that back the routing decisions made by [`crate::node::Node`] and
//! the [`crate::domain::authority::AuthorityResolver`].

pub mod device_registry;
pub mod gateway_registry;
pub mod proxy_registry;

pub use device_registry::DeviceRegistry;
pub use gateway_registry::GatewayRegistry;
pub use proxy_registry::ProxyRegistry;
