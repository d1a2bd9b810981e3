//! # Middleware Dispatcher
//!
//! The bidirectional pipeline every request — whether application- or
//! device-originated — passes through before reaching a device
//! implementation or fanning out to connected proxies.

pub mod dispatcher;

pub use dispatcher::{Handler, MiddlewareDispatcher, Next};
