//! # Device Registry
//!
//! Maps a normalized device id to its device implementation (local or
//! proxy-for-remote). Re-registering an already-registered id is an
//! error, not an update.
//!
//! This registry is deliberately a thin map plus listener-handle
//! bookkeeping: the orchestration `register`/`deregister` needs (resolving
//! authority, minting a [`crate::proxy::local::LocalProxy`] on
//! non-authoritative nodes, forwarding to the gateway) is implemented by
//! [`crate::node::Node`], which composes this registry with the Proxy
//! Registry, the Authority Resolver, and the Middleware Dispatcher.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::device::{Device, ListenerHandle};
use crate::domain::error::DeviceError;

/// Node-scoped table of device id → device implementation.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Arc<dyn Device>>>,
    listeners: RwLock<HashMap<String, ListenerHandle>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Membership query.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.devices.read().expect("device registry poisoned").contains_key(id)
    }

    /// Look up the device registered for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Device>> {
        self.devices.read().expect("device registry poisoned").get(id).cloned()
    }

    /// Insert `device` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::AlreadyRegistered`] if `id` is already
    /// registered.
    pub fn insert(&self, id: &str, device: Arc<dyn Device>) -> Result<(), DeviceError> {
        let mut devices = self.devices.write().expect("device registry poisoned");
        if devices.contains_key(id) {
            return Err(DeviceError::AlreadyRegistered(id.to_string()));
        }
        devices.insert(id.to_string(), device);
        Ok(())
    }

    /// Remove and return the device registered for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotRegistered`] if `id` is not registered.
    pub fn remove(&self, id: &str) -> Result<Arc<dyn Device>, DeviceError> {
        let mut devices = self.devices.write().expect("device registry poisoned");
        devices
            .remove(id)
            .ok_or_else(|| DeviceError::NotRegistered(id.to_string()))
    }

    /// Record the notification-listener handle attached at `register`
    /// time, so `deregister` can detach exactly that listener.
    pub fn set_listener(&self, id: &str, handle: ListenerHandle) {
        self.listeners
            .write()
            .expect("device registry poisoned")
            .insert(id.to_string(), handle);
    }

    /// Remove and return the listener handle recorded for `id`, if any.
    pub fn take_listener(&self, id: &str) -> Option<ListenerHandle> {
        self.listeners.write().expect("device registry poisoned").remove(id)
    }

    /// Number of registered devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.read().expect("device registry poisoned").len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
