//! # Local Proxy
//!
//! The device-shaped object handed back to a caller of `connect` on the
//! node that is authoritative for a given id. Every capability call
//! constructs a [`Request`] and re-enters the owning node's dispatcher, so
//! a local caller is subject to exactly the same middleware pipeline as a
//! remote one.
//!
//! The same type also fills a second role: on a node that hosts a native
//! device but is *not* authoritative for it, the single Proxy Registry
//! entry handed to the upstream gateway during `register` is a
//! `LocalProxy` too, just one constructed with a forwarding
//! [`GatewayAdapter`] so that notifications reaching it through this
//! node's own upstream fan-out are relayed onward over the gateway link
//! instead of (only) toward locally attached listeners.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::device::{Device, ListenerHandle, ListenerRegistry, NotificationKind, NotificationListener};
use crate::domain::error::DeviceError;
use crate::domain::gateway_port::GatewayAdapter;
use crate::domain::request::{Method, Request};
use crate::node::Node;

/// A caller-facing device handle whose every call re-enters
/// [`Node::dispatch`] on the node that produced it.
pub struct LocalProxy {
    deviceid: String,
    node: Arc<Node>,
    listeners: ListenerRegistry,
    forward: Option<Arc<dyn GatewayAdapter>>,
    self_ref: Weak<LocalProxy>,
}

impl LocalProxy {
    /// Construct a proxy for `deviceid` on `node`.
    ///
    /// `forward` is `Some` only for the register-time, non-authoritative
    /// Proxy Registry entry described above, bound to the gateway the
    /// device was forwarded through; `connect`-returned proxies pass
    /// `None`.
    #[must_use]
    pub fn new(
        deviceid: impl Into<String>,
        node: Arc<Node>,
        forward: Option<Arc<dyn GatewayAdapter>>,
    ) -> Arc<Self> {
        let deviceid = deviceid.into();
        Arc::new_cyclic(|weak| LocalProxy {
            deviceid,
            node,
            listeners: ListenerRegistry::new(),
            forward,
            self_ref: weak.clone(),
        })
    }

    /// The normalized device id this proxy calls operate on.
    #[must_use]
    pub fn deviceid(&self) -> &str {
        &self.deviceid
    }

    async fn dispatch(&self, req: Request) -> Result<Value, DeviceError> {
        self.node.dispatch(req).await
    }
}

#[async_trait]
impl Device for LocalProxy {
    async fn get(&self, property: &str) -> Result<Value, DeviceError> {
        self.dispatch(Request::new(&self.deviceid, Method::Get, property)).await
    }

    async fn set(&self, property: &str, value: Value) -> Result<Value, DeviceError> {
        self.dispatch(Request::new(&self.deviceid, Method::Set, property).with_value(value))
            .await
    }

    async fn invoke(&self, method: &str, params: Value) -> Result<Value, DeviceError> {
        let params = match params {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        self.dispatch(Request::new(&self.deviceid, Method::Invoke, method).with_params(params))
            .await
    }

    async fn subscribe(&self, event: &str) -> Result<Value, DeviceError> {
        self.dispatch(Request::new(&self.deviceid, Method::Subscribe, event)).await
    }

    async fn describe(&self, property: &str) -> Result<Value, DeviceError> {
        self.dispatch(Request::new(&self.deviceid, Method::Describe, property)).await
    }

    async fn config(&self, property: &str, value: Value) -> Result<Value, DeviceError> {
        self.dispatch(Request::new(&self.deviceid, Method::Config, property).with_value(value))
            .await
    }

    fn on_notification(&self, listener: NotificationListener) -> ListenerHandle {
        self.listeners.attach(listener)
    }

    fn remove_notification_listener(&self, handle: ListenerHandle) {
        self.listeners.detach(handle);
    }

    async fn deliver_notification(
        &self,
        kind: NotificationKind,
        identifier: &str,
        value: &Value,
    ) -> Result<(), DeviceError> {
        self.listeners.emit(kind, identifier, value);
        if let Some(forward) = &self.forward {
            forward.forward(&self.deviceid, kind, identifier, value).await;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        if let Some(strong_self) = self.self_ref.upgrade() {
            let as_device: Arc<dyn Device> = strong_self;
            self.node.proxy_registry().detach(&self.deviceid, &as_device);
        }
        Ok(())
    }
}
