//! # Proxy Registry
//!
//! Maps a normalized device id to the ordered collection of client proxies
//! currently connected to that device on this node. Used both by the
//! local authoritative-client case and by the gateway-bookkeeping case
//! (the single [`crate::proxy::local::LocalProxy`] a non-authoritative
//! node hands to its upstream gateway during `register`).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::device::Device;

/// Node-scoped table of device id → ordered proxy list.
#[derive(Default)]
pub struct ProxyRegistry {
    proxies: RwLock<HashMap<String, Vec<Arc<dyn Device>>>>,
}

impl ProxyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `proxy` to the list for `id`, creating the list on first
    /// insert. Order-preserving: upstream fan-out delivers in this order.
    pub fn attach(&self, id: &str, proxy: Arc<dyn Device>) {
        let mut proxies = self.proxies.write().expect("proxy registry poisoned");
        proxies.entry(id.to_string()).or_default().push(proxy);
    }

    /// Remove the first proxy for `id` that is the same object as `proxy`
    /// (pointer identity). When the list becomes empty, the entry itself
    /// is dropped.
    pub fn detach(&self, id: &str, proxy: &Arc<dyn Device>) {
        let mut proxies = self.proxies.write().expect("proxy registry poisoned");
        if let Some(list) = proxies.get_mut(id) {
            if let Some(pos) = list.iter().position(|p| Arc::ptr_eq(p, proxy)) {
                list.remove(pos);
            }
            if list.is_empty() {
                proxies.remove(id);
            }
        }
    }

    /// A snapshot of the currently attached proxies for `id`, in
    /// attachment order. Used by upstream fan-out.
    #[must_use]
    pub fn list(&self, id: &str) -> Vec<Arc<dyn Device>> {
        self.proxies
            .read()
            .expect("proxy registry poisoned")
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any proxy is attached for `id`.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.proxies
            .read()
            .expect("proxy registry poisoned")
            .get(id)
            .is_some_and(|list| !list.is_empty())
    }
}
