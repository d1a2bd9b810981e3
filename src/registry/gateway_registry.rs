//! # Gateway Registry
//!
//! Maps a lowercased domain string (or the wildcard `*`) to the
//! [`GatewayAdapter`] registered for it. At most one entry per domain;
//! re-registering an already-registered domain is an error.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::error::DeviceError;
use crate::domain::gateway_port::{GatewayAdapter, GatewayLookup};

/// Node-scoped table of domain → gateway adapter.
#[derive(Default)]
pub struct GatewayRegistry {
    gateways: RwLock<HashMap<String, Arc<dyn GatewayAdapter>>>,
}

impl GatewayRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gateway for `domain` (already lowercased by the caller).
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::GatewayExists`] if `domain` already has a
    /// registered gateway.
    pub fn register(&self, domain: &str, adapter: Arc<dyn GatewayAdapter>) -> Result<(), DeviceError> {
        let mut gateways = self.gateways.write().expect("gateway registry poisoned");
        if gateways.contains_key(domain) {
            return Err(DeviceError::GatewayExists(domain.to_string()));
        }
        gateways.insert(domain.to_string(), adapter);
        Ok(())
    }

    /// Remove the gateway registered for `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NoGateway`] if no gateway is registered for
    /// `domain`.
    pub fn deregister(&self, domain: &str) -> Result<(), DeviceError> {
        let mut gateways = self.gateways.write().expect("gateway registry poisoned");
        if gateways.remove(domain).is_none() {
            return Err(DeviceError::NoGateway(domain.to_string()));
        }
        Ok(())
    }

    /// Number of registered gateways.
    #[must_use]
    pub fn len(&self) -> usize {
        self.gateways.read().expect("gateway registry poisoned").len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GatewayLookup for GatewayRegistry {
    /// Exact-match lookup only. The `*` wildcard is just another key in
    /// this table; falling back to it when `domain` itself has no entry is
    /// [`crate::domain::authority::AuthorityResolver::resolve`]'s job, not
    /// this registry's.
    fn lookup(&self, domain: &str) -> Option<Arc<dyn GatewayAdapter>> {
        self.gateways.read().expect("gateway registry poisoned").get(domain).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::Device;
    use async_trait::async_trait;

    struct FakeGateway;

    #[async_trait]
    impl GatewayAdapter for FakeGateway {
        async fn register(&self, id: &str, _device: Arc<dyn Device>) -> Result<String, DeviceError> {
            Ok(id.to_string())
        }
        async fn deregister(&self, _id: &str) -> Result<(), DeviceError> {
            Ok(())
        }
        async fn connect(&self, _id: &str) -> Result<Arc<dyn Device>, DeviceError> {
            Err(DeviceError::Transport("unused".into()))
        }
        async fn forward(
            &self,
            _deviceid: &str,
            _kind: crate::domain::device::NotificationKind,
            _identifier: &str,
            _value: &serde_json::Value,
        ) {
        }
    }

    #[test]
    fn duplicate_domain_registration_is_an_error() {
        let registry = GatewayRegistry::new();
        registry.register("kitchen", Arc::new(FakeGateway)).unwrap();
        let err = registry.register("kitchen", Arc::new(FakeGateway)).unwrap_err();
        assert!(matches!(err, DeviceError::GatewayExists(_)));
    }

    #[test]
    fn deregister_unknown_domain_is_an_error() {
        let registry = GatewayRegistry::new();
        let err = registry.deregister("kitchen").unwrap_err();
        assert!(matches!(err, DeviceError::NoGateway(_)));
    }

    #[test]
    fn lookup_is_exact_match_only() {
        let registry = GatewayRegistry::new();
        registry.register("*", Arc::new(FakeGateway)).unwrap();
        assert!(registry.lookup("*").is_some());
        assert!(registry.lookup("anything").is_none());
    }

    #[test]
    fn register_then_deregister_returns_to_prior_state() {
        let registry = GatewayRegistry::new();
        assert!(registry.is_empty());
        registry.register("kitchen", Arc::new(FakeGateway)).unwrap();
        assert_eq!(registry.len(), 1);
        registry.deregister("kitchen").unwrap();
        assert!(registry.is_empty());
    }
}
