//! # Node
//!
//! Composes the Device Registry, Proxy Registry, Gateway Registry,
//! Authority Resolver, and Middleware Dispatcher into the single object
//! application code and [`crate::link::session::LinkSession`]s both talk
//! to. Built as a plain `Arc<Node>` — no cyclic construction — since a
//! [`crate::proxy::local::LocalProxy`] holding an `Arc<Node>` and the
//! node's own Proxy Registry holding that same `LocalProxy` is an
//! intentional strong reference cycle, broken only by an explicit
//! `disconnect`.

use std::sync::Arc;

use serde_json::Value;

use crate::config::NodeConfig;
use crate::domain::authority::AuthorityResolver;
use crate::domain::device::Device;
use crate::domain::error::DeviceError;
use crate::domain::gateway_port::{GatewayAdapter, GatewayLookup};
use crate::domain::request::{Method, Request};
use crate::middleware::dispatcher::{Handler, MiddlewareDispatcher};
use crate::proxy::local::LocalProxy;
use crate::registry::{DeviceRegistry, GatewayRegistry, ProxyRegistry};

/// The device mesh node: one instance per process (or per test), owning
/// every node-scoped registry plus the middleware pipeline.
pub struct Node {
    config: NodeConfig,
    device_registry: Arc<DeviceRegistry>,
    proxy_registry: Arc<ProxyRegistry>,
    gateway_registry: Arc<GatewayRegistry>,
    authority: AuthorityResolver,
    dispatcher: Arc<MiddlewareDispatcher>,
}

impl Node {
    /// Construct a node from `config`.
    #[must_use]
    pub fn new(config: NodeConfig) -> Arc<Self> {
        let device_registry = Arc::new(DeviceRegistry::new());
        let proxy_registry = Arc::new(ProxyRegistry::new());
        let gateway_registry = Arc::new(GatewayRegistry::new());
        let authority = AuthorityResolver::new(
            config.default_domain.clone(),
            config.claim_unowned_domains,
            Arc::clone(&gateway_registry) as Arc<dyn GatewayLookup>,
        );
        let dispatcher = MiddlewareDispatcher::new(Arc::clone(&device_registry), Arc::clone(&proxy_registry));

        tracing::info!(
            default_domain = %config.default_domain,
            claim_unowned_domains = config.claim_unowned_domains,
            "node constructed"
        );

        Arc::new(Self {
            config,
            device_registry,
            proxy_registry,
            gateway_registry,
            authority,
            dispatcher,
        })
    }

    /// This node's configuration.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The Device Registry.
    #[must_use]
    pub fn device_registry(&self) -> &DeviceRegistry {
        &self.device_registry
    }

    /// The Proxy Registry.
    #[must_use]
    pub fn proxy_registry(&self) -> &ProxyRegistry {
        &self.proxy_registry
    }

    /// The Gateway Registry.
    #[must_use]
    pub fn gateway_registry(&self) -> &GatewayRegistry {
        &self.gateway_registry
    }

    /// Install a middleware handler at the end of the pipeline.
    pub fn push_handler(&self, handler: Arc<dyn Handler>) {
        self.dispatcher.push_handler(handler);
    }

    /// Register a gateway for `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::GatewayExists`] if `domain` already has one.
    pub fn add_gateway(&self, domain: &str, adapter: Arc<dyn GatewayAdapter>) -> Result<(), DeviceError> {
        let domain = domain.to_lowercase();
        self.gateway_registry.register(&domain, adapter)?;
        tracing::info!(domain, "gateway registered");
        Ok(())
    }

    /// Remove the gateway registered for `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NoGateway`] if `domain` has none.
    pub fn remove_gateway(&self, domain: &str) -> Result<(), DeviceError> {
        let domain = domain.to_lowercase();
        self.gateway_registry.deregister(&domain)?;
        tracing::info!(domain, "gateway removed");
        Ok(())
    }

    /// Register `device` under `raw_id`, resolving authority first.
    ///
    /// When this node is authoritative, `device` is inserted directly into
    /// the Device Registry. Otherwise `device` is forwarded to the
    /// resolved gateway's `register`, then still recorded locally (so
    /// [`Node::connect`] and disconnect bookkeeping behave uniformly) and
    /// wrapped in a [`LocalProxy`] bound to that gateway so this device's
    /// own notifications relay onward.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Validation`] for a malformed id,
    /// [`DeviceError::NoGateway`] when the id is non-local with no
    /// resolvable gateway, or whatever the Device Registry/gateway itself
    /// returns (notably [`DeviceError::AlreadyRegistered`]).
    pub async fn register(self: &Arc<Self>, raw_id: &str, device: Arc<dyn Device>) -> Result<String, DeviceError> {
        let record = self.authority.resolve(raw_id);
        if !record.is_valid {
            return Err(DeviceError::Validation(
                record.err.unwrap_or_else(|| "invalid device id".to_string()),
            ));
        }

        if record.is_local {
            self.device_registry.insert(&record.deviceid, Arc::clone(&device))?;
            self.attach_upstream_listener(&record.deviceid, &device);
            tracing::info!(deviceid = %record.deviceid, "device registered");
            return Ok(record.deviceid);
        }

        let Some(gateway) = record.gateway else {
            return Err(DeviceError::NoGateway(record.domain));
        };

        let echoed_id = gateway.register(&record.deviceid, Arc::clone(&device)).await?;
        self.device_registry.insert(&echoed_id, Arc::clone(&device))?;
        self.attach_upstream_listener(&echoed_id, &device);

        let forwarding_proxy = LocalProxy::new(echoed_id.clone(), Arc::clone(self), Some(gateway));
        self.proxy_registry.attach(&echoed_id, forwarding_proxy);

        tracing::info!(deviceid = %echoed_id, domain = %record.domain, "device registered via gateway");
        Ok(echoed_id)
    }

    fn attach_upstream_listener(self: &Arc<Self>, deviceid: &str, device: &Arc<dyn Device>) {
        let node = Arc::clone(self);
        let deviceid = deviceid.to_string();
        let handle = device.on_notification(Arc::new(move |kind, identifier, value| {
            let node = Arc::clone(&node);
            let deviceid = deviceid.clone();
            let identifier = identifier.to_string();
            let value = value.clone();
            tokio::spawn(async move {
                let method = match kind {
                    crate::domain::device::NotificationKind::Put => Method::Put,
                    crate::domain::device::NotificationKind::Notify => Method::Notify,
                };
                let req = Request::new(&deviceid, method, &identifier).with_value(value);
                if let Err(err) = node.dispatch(req).await {
                    tracing::warn!(deviceid, %err, "upstream dispatch of a device notification failed");
                }
            });
        }));
        self.device_registry.set_listener(deviceid.as_str(), handle);
    }

    /// Deregister `raw_id`, resolving authority first.
    ///
    /// On a non-authoritative id this also detaches the forwarding
    /// [`LocalProxy`] [`Node::register`] attached to the Proxy Registry,
    /// restoring it to its pre-register state, before forwarding to the
    /// gateway's own `deregister`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Validation`] for a malformed id,
    /// [`DeviceError::NotRegistered`] if it is not registered here, or
    /// whatever the gateway's `deregister` returns for a non-authoritative
    /// id.
    pub async fn deregister(self: &Arc<Self>, raw_id: &str) -> Result<Arc<dyn Device>, DeviceError> {
        let record = self.authority.resolve(raw_id);
        if !record.is_valid {
            return Err(DeviceError::Validation(
                record.err.unwrap_or_else(|| "invalid device id".to_string()),
            ));
        }

        let device = self.device_registry.remove(&record.deviceid)?;
        if let Some(handle) = self.device_registry.take_listener(&record.deviceid) {
            device.remove_notification_listener(handle);
        }

        if !record.is_local {
            for forwarding_proxy in self.proxy_registry.list(&record.deviceid) {
                self.proxy_registry.detach(&record.deviceid, &forwarding_proxy);
            }
            if let Some(gateway) = &record.gateway {
                gateway.deregister(&record.deviceid).await?;
            }
        }

        tracing::info!(deviceid = %record.deviceid, "device deregistered");
        Ok(device)
    }

    /// Obtain a device-shaped handle for `raw_id`: a [`LocalProxy`] when
    /// this node is authoritative, or a gateway-backed remote proxy
    /// otherwise. A resolved gateway always wins over a locally registered
    /// native device for the same id, since authority (not mere physical
    /// hosting) decides where a call's middleware runs.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Validation`] for a malformed id,
    /// [`DeviceError::NotConnected`] if this node is authoritative but has
    /// no device registered for it, or whatever the gateway's `connect`
    /// returns.
    pub async fn connect(self: &Arc<Self>, raw_id: &str) -> Result<Arc<dyn Device>, DeviceError> {
        let record = self.authority.resolve(raw_id);
        if !record.is_valid {
            return Err(DeviceError::Validation(
                record.err.unwrap_or_else(|| "invalid device id".to_string()),
            ));
        }

        if let Some(gateway) = &record.gateway {
            return gateway.connect(&record.deviceid).await;
        }

        if !self.device_registry.has(&record.deviceid) {
            return Err(DeviceError::NotConnected(record.deviceid));
        }

        let proxy = LocalProxy::new(record.deviceid.clone(), Arc::clone(self), None);
        let proxy: Arc<dyn Device> = proxy;
        self.proxy_registry.attach(&record.deviceid, Arc::clone(&proxy));
        Ok(proxy)
    }

    /// Release a proxy obtained from [`Node::connect`].
    ///
    /// # Errors
    ///
    /// Propagates whatever `proxy.disconnect()` itself returns.
    pub async fn disconnect(self: &Arc<Self>, proxy: Arc<dyn Device>) -> Result<(), DeviceError> {
        proxy.disconnect().await
    }

    /// Run `req` through the middleware pipeline.
    ///
    /// # Errors
    ///
    /// Propagates whatever the pipeline or the final handler returns.
    pub async fn dispatch(self: &Arc<Self>, req: Request) -> Result<Value, DeviceError> {
        self.dispatcher.dispatch(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;
    #[async_trait]
    impl Device for Echo {
        async fn get(&self, property: &str) -> Result<Value, DeviceError> {
            Ok(Value::String(property.to_string()))
        }
        async fn set(&self, _p: &str, v: Value) -> Result<Value, DeviceError> {
            Ok(v)
        }
        async fn invoke(&self, _m: &str, _p: Value) -> Result<Value, DeviceError> {
            Ok(Value::Null)
        }
        async fn subscribe(&self, _e: &str) -> Result<Value, DeviceError> {
            Ok(Value::Null)
        }
        async fn describe(&self, _p: &str) -> Result<Value, DeviceError> {
            Ok(Value::Null)
        }
        async fn config(&self, _p: &str, _v: Value) -> Result<Value, DeviceError> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn register_then_connect_round_trips_locally() {
        let node = Node::new(NodeConfig::default());
        node.register("kitchen:lamp", Arc::new(Echo)).await.unwrap();
        let proxy = node.connect("kitchen:lamp").await.unwrap();
        assert_eq!(proxy.get("state").await.unwrap(), Value::String("state".to_string()));
    }

    #[tokio::test]
    async fn connect_to_unregistered_id_fails() {
        let node = Node::new(NodeConfig::default());
        let err = node.connect("kitchen:lamp").await.unwrap_err();
        assert!(matches!(err, DeviceError::NotConnected(_)));
    }

    #[tokio::test]
    async fn duplicate_register_is_rejected() {
        let node = Node::new(NodeConfig::default());
        node.register("kitchen:lamp", Arc::new(Echo)).await.unwrap();
        let err = node.register("kitchen:lamp", Arc::new(Echo)).await.unwrap_err();
        assert!(matches!(err, DeviceError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn deregister_unknown_id_fails() {
        let node = Node::new(NodeConfig::default());
        let err = node.deregister("kitchen:lamp").await.unwrap_err();
        assert!(matches!(err, DeviceError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn without_a_gateway_and_without_claiming_unowned_domains_registration_fails() {
        let node = Node::new(
            NodeConfig::builder()
                .default_domain("home")
                .claim_unowned_domains(false)
                .build(),
        );
        let err = node.register("kitchen:lamp", Arc::new(Echo)).await.unwrap_err();
        assert!(matches!(err, DeviceError::NoGateway(_)));
    }

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
            Err(DeviceError::Transport("unused in this test".to_string()))
        }
        async fn forward(
            &self,
            _deviceid: &str,
            _kind: crate::domain::device::NotificationKind,
            _identifier: &str,
            _value: &Value,
        ) {
        }
    }

    #[tokio::test]
    async fn register_then_deregister_on_a_non_authoritative_node_restores_the_proxy_registry() {
        let node = Node::new(
            NodeConfig::builder()
                .default_domain("home")
                .claim_unowned_domains(false)
                .build(),
        );
        node.add_gateway("home", Arc::new(FakeGateway)).unwrap();

        assert!(!node.proxy_registry().has("home:lamp"));
        node.register("home:lamp", Arc::new(Echo)).await.unwrap();
        assert!(node.proxy_registry().has("home:lamp"));

        node.deregister("home:lamp").await.unwrap();
        assert!(!node.proxy_registry().has("home:lamp"));
    }
}
