//! # Remote Device Proxy
//!
//! The device-shaped object a [`crate::link::session::LinkSession`] hands
//! back from `connect`/`REGISTER` handling: every capability call crosses
//! the peer link as a protocol frame, multiplexed by `reqid` and addressed
//! by `connid`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::device::{Device, ListenerHandle, ListenerRegistry, NotificationKind, NotificationListener};
use crate::domain::error::DeviceError;
use crate::domain::request::Method;
use crate::link::session::LinkSession;

/// A device whose capability calls are forwarded over one peer link,
/// addressed by a `connid` minted when the connection was established.
pub struct RemoteDeviceProxy {
    connid: String,
    session: Arc<LinkSession>,
    listeners: ListenerRegistry,
}

impl RemoteDeviceProxy {
    /// Bind a proxy to `connid` on `session`.
    #[must_use]
    pub fn new(connid: impl Into<String>, session: Arc<LinkSession>) -> Arc<Self> {
        Arc::new(Self {
            connid: connid.into(),
            session,
            listeners: ListenerRegistry::new(),
        })
    }

    /// The `connid` this proxy addresses calls to.
    #[must_use]
    pub fn connid(&self) -> &str {
        &self.connid
    }
}

#[async_trait]
impl Device for RemoteDeviceProxy {
    async fn get(&self, property: &str) -> Result<Value, DeviceError> {
        self.session.call(&self.connid, Method::Get, property, None).await
    }

    async fn set(&self, property: &str, value: Value) -> Result<Value, DeviceError> {
        self.session.call(&self.connid, Method::Set, property, Some(value)).await
    }

    async fn invoke(&self, method: &str, params: Value) -> Result<Value, DeviceError> {
        self.session.call(&self.connid, Method::Invoke, method, Some(params)).await
    }

    async fn subscribe(&self, event: &str) -> Result<Value, DeviceError> {
        self.session.call(&self.connid, Method::Subscribe, event, None).await
    }

    async fn describe(&self, property: &str) -> Result<Value, DeviceError> {
        self.session.call(&self.connid, Method::Describe, property, None).await
    }

    async fn config(&self, property: &str, value: Value) -> Result<Value, DeviceError> {
        self.session.call(&self.connid, Method::Config, property, Some(value)).await
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
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.session.send_disconnect(&self.connid).await
    }
}
