//! # Domain Layer
//!
//! Core value types and traits shared by the registries, the middleware
//! dispatcher, and the link session: device identifiers, authority
//! resolution, the request value object, the device capability trait, and
//! the error type returned across all of the above.

pub mod authority;
pub mod device;
pub mod error;
pub mod gateway_port;
pub mod identifier;
pub mod request;

pub use authority::{AuthorityRecord, AuthorityResolver};
pub use device::{Device, NotificationKind};
pub use error::DeviceError;
pub use gateway_port::{GatewayAdapter, GatewayLookup};
pub use identifier::normalize_device_id;
pub use request::{Method, Request};
