//! # Gateway Adapter
//!
//! The thin binding between a [`LinkSession`] and a node's gateway slot or
//! a [`crate::proxy::local::LocalProxy`]'s forwarding target: the same
//! struct plays both roles the [`GatewayAdapter`] port trait requires,
//! since both are just "do this over the peer link this session owns."

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::device::{Device, NotificationKind};
use crate::domain::error::DeviceError;
use crate::domain::gateway_port::GatewayAdapter as GatewayAdapterPort;
use crate::link::session::LinkSession;

/// Binds the [`GatewayAdapter`] port to one [`LinkSession`].
pub struct GatewayAdapter {
    session: Arc<LinkSession>,
}

impl GatewayAdapter {
    /// Wrap `session` as a gateway adapter.
    #[must_use]
    pub fn new(session: Arc<LinkSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl GatewayAdapterPort for GatewayAdapter {
    async fn register(&self, id: &str, device: Arc<dyn Device>) -> Result<String, DeviceError> {
        self.session.send_register(id, device).await
    }

    async fn deregister(&self, id: &str) -> Result<(), DeviceError> {
        self.session.send_deregister(id).await
    }

    async fn connect(&self, id: &str) -> Result<Arc<dyn Device>, DeviceError> {
        self.session.send_connect(id).await
    }

    async fn forward(&self, deviceid: &str, kind: NotificationKind, identifier: &str, value: &Value) {
        self.session.send_notification(deviceid, kind, identifier, value).await;
    }
}
