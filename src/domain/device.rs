//! The `Device` capability trait and the small listener registry used to
//! implement its two notification channels.
//!
//! A device exposes six callable capabilities (`get`, `set`, `invoke`,
//! `subscribe`, `describe`, `config`) and produces two named notifications
//! (`put`, `notify`) that the Device Registry listens for at `register`
//! time and translates into synthetic `PUT`/`NOTIFY` requests fed into the
//! middleware dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::error::DeviceError;

/// Which of the two notification channels a device emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// `put(metric, value)` — a metric sample.
    Put,
    /// `notify(event, params)` — an application event.
    Notify,
}

/// A callback invoked for every notification a device emits. Carries the
/// kind, the metric/event identifier, and the value/params payload.
pub type NotificationListener = Arc<dyn Fn(NotificationKind, &str, &Value) + Send + Sync>;

/// An opaque handle returned by [`ListenerRegistry::attach`], used to
/// detach that exact listener later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// A small attach/detach/invoke-all callback registry, the pattern the
/// spec's design notes call for modeling a device's `put`/`notify`
/// notification producers.
#[derive(Default)]
pub struct ListenerRegistry {
    next: AtomicU64,
    listeners: Mutex<Vec<(ListenerHandle, NotificationListener)>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener, returning a handle that can later be passed to
    /// [`ListenerRegistry::detach`].
    pub fn attach(&self, listener: NotificationListener) -> ListenerHandle {
        let handle = ListenerHandle(self.next.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock().expect("listener registry poisoned");
        listeners.push((handle, listener));
        handle
    }

    /// Detach a previously attached listener. No-op if already detached.
    pub fn detach(&self, handle: ListenerHandle) {
        let mut listeners = self.listeners.lock().expect("listener registry poisoned");
        listeners.retain(|(h, _)| *h != handle);
    }

    /// Invoke every attached listener with the given notification.
    pub fn emit(&self, kind: NotificationKind, identifier: &str, value: &Value) {
        let listeners = self.listeners.lock().expect("listener registry poisoned");
        for (_, listener) in listeners.iter() {
            listener(kind, identifier, value);
        }
    }

    /// Number of currently attached listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().expect("listener registry poisoned").len()
    }

    /// Whether any listeners are currently attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An object providing the six device capabilities, and producing the two
/// named notifications `put`/`notify` through [`Device::on_notification`].
///
/// May be *native* (hosted here) or a Remote Device Proxy that forwards
/// each call over a [`crate::link::session::LinkSession`].
#[async_trait]
pub trait Device: Send + Sync {
    /// `get(property) -> value`
    async fn get(&self, property: &str) -> Result<Value, DeviceError>;

    /// `set(property, value) -> any`
    async fn set(&self, property: &str, value: Value) -> Result<Value, DeviceError>;

    /// `invoke(method, params) -> any`
    async fn invoke(&self, method: &str, params: Value) -> Result<Value, DeviceError>;

    /// `subscribe(event) -> any`
    async fn subscribe(&self, event: &str) -> Result<Value, DeviceError>;

    /// `describe(property) -> schema`
    async fn describe(&self, property: &str) -> Result<Value, DeviceError>;

    /// `config(property, value) -> any`
    async fn config(&self, property: &str, value: Value) -> Result<Value, DeviceError>;

    /// Attach a listener for this device's `put`/`notify` notifications.
    ///
    /// Devices with no subscription capability of their own may leave the
    /// default (no-op, returning a handle that detaches nothing).
    fn on_notification(&self, _listener: NotificationListener) -> ListenerHandle {
        ListenerHandle(0)
    }

    /// Detach a listener previously attached with [`Device::on_notification`].
    fn remove_notification_listener(&self, _handle: ListenerHandle) {}

    /// Deliver an upstream notification *to* this device-shaped object —
    /// the inbound counterpart of [`Device::on_notification`]. Called by
    /// [`crate::middleware::dispatcher::MiddlewareDispatcher`]'s upstream
    /// fan-out and by [`crate::link::session::LinkSession`] when routing an
    /// incoming PUT/NOTIFY frame. Native devices never receive these and
    /// keep the default no-op; proxies forward into whatever listeners are
    /// attached to them via `on_notification`.
    async fn deliver_notification(
        &self,
        _kind: NotificationKind,
        _identifier: &str,
        _value: &Value,
    ) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Release whatever this device object holds open: for a
    /// [`crate::proxy::local::LocalProxy`], detachment from the Proxy
    /// Registry; for a [`crate::proxy::remote::RemoteDeviceProxy`], the
    /// matching `DISCONNECT` over its link session. Native devices have
    /// nothing to release.
    async fn disconnect(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_every_attached_listener_once() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = hits.clone();
        registry.attach(Arc::new(move |_, _, _| {
            h1.fetch_add(1, Ordering::Relaxed);
        }));
        let h2 = hits.clone();
        registry.attach(Arc::new(move |_, _, _| {
            h2.fetch_add(1, Ordering::Relaxed);
        }));

        registry.emit(NotificationKind::Notify, "event", &Value::Null);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn detach_stops_future_emits() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let handle = registry.attach(Arc::new(move |_, _, _| {
            h.fetch_add(1, Ordering::Relaxed);
        }));

        registry.detach(handle);
        registry.emit(NotificationKind::Put, "metric", &Value::Null);
        assert_eq!(hits.load(Ordering::Relaxed), 0);
        assert!(registry.is_empty());
    }
}
