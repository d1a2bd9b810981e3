//! # Link Session
//!
//! One session object per peer connection: encodes/decodes wire frames,
//! multiplexes in-flight requests by `reqid`, tracks per-session device
//! registrations and connections, and implements the peer protocol
//! (REGISTER, DEREGISTER, CONNECT, DISCONNECT, the six downstream verbs,
//! PUT/NOTIFY, and RESPONSE).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use uuid::Uuid;

use crate::domain::device::{Device, ListenerHandle, NotificationKind};
use crate::domain::error::DeviceError;
use crate::domain::request::{Method, Request};
use crate::link::frame::{Frame, FrameMethod};
use crate::link::transport::{FrameSink, FrameStream};
use crate::node::Node;
use crate::proxy::remote::RemoteDeviceProxy;

struct ConnEntry {
    device: Arc<dyn Device>,
    listener: Option<ListenerHandle>,
}

/// One peer connection's protocol state machine.
pub struct LinkSession {
    node: Arc<Node>,
    sink: Box<dyn FrameSink>,
    next_reqid: AtomicU64,
    devices_by_connid: RwLock<HashMap<String, ConnEntry>>,
    proxies_by_deviceid: RwLock<HashMap<String, Arc<dyn Device>>>,
    proxy_connections_by_deviceid: RwLock<HashMap<String, Arc<dyn Device>>>,
    pending: AsyncMutex<HashMap<u64, oneshot::Sender<Result<Value, DeviceError>>>>,
    gateway_domain: RwLock<Option<String>>,
    opened_at: chrono::DateTime<chrono::Utc>,
    self_ref: Weak<LinkSession>,
}

impl LinkSession {
    /// Open a session over `sink`/`stream`, spawning its reader task.
    ///
    /// When `gateway_domain` is `Some`, this session registers itself as
    /// the node's gateway for that domain before returning.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::GatewayExists`] if `gateway_domain` names a
    /// domain that already has a registered gateway.
    pub async fn open(
        node: Arc<Node>,
        sink: Box<dyn FrameSink>,
        mut stream: Box<dyn FrameStream>,
        gateway_domain: Option<String>,
    ) -> Result<Arc<Self>, DeviceError> {
        let session = Arc::new_cyclic(|weak| Self {
            node: Arc::clone(&node),
            sink,
            next_reqid: AtomicU64::new(1),
            devices_by_connid: RwLock::new(HashMap::new()),
            proxies_by_deviceid: RwLock::new(HashMap::new()),
            proxy_connections_by_deviceid: RwLock::new(HashMap::new()),
            pending: AsyncMutex::new(HashMap::new()),
            gateway_domain: RwLock::new(None),
            opened_at: chrono::Utc::now(),
            self_ref: weak.clone(),
        });

        if let Some(domain) = gateway_domain {
            node.add_gateway(&domain, Arc::new(crate::gateway::GatewayAdapter::new(Arc::clone(&session))))?;
            *session.gateway_domain.write().expect("session poisoned") = Some(domain.clone());
            tracing::info!(domain, "link session opened in gateway mode");
        } else {
            tracing::info!("link session opened");
        }

        let reader_session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(frame) = stream.recv().await {
                let session = Arc::clone(&reader_session);
                tokio::spawn(async move {
                    session.handle_frame(frame).await;
                });
            }
            reader_session.close().await;
        });

        Ok(session)
    }

    fn arc(&self) -> Arc<Self> {
        self.self_ref.upgrade().expect("session used after being dropped")
    }

    async fn send(&self, frame: Frame) {
        if let Err(err) = self.sink.send(frame).await {
            tracing::warn!(%err, "failed to send frame over link session");
        }
    }

    async fn send_request(&self, build: impl FnOnce(u64) -> Frame) -> Result<Value, DeviceError> {
        let reqid = self.next_reqid.fetch_add(1, Ordering::Relaxed);
        let frame = build(reqid);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(reqid, tx);

        if let Err(err) = self.sink.send(frame).await {
            self.pending.lock().await.remove(&reqid);
            return Err(err);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(DeviceError::Transport("session closed before a response arrived".to_string())),
        }
    }

    /// Forward a device operation to `connid` over the link.
    pub async fn call(&self, connid: &str, method: Method, identifier: &str, value: Option<Value>) -> Result<Value, DeviceError> {
        let connid = connid.to_string();
        let identifier = identifier.to_string();
        self.send_request(move |reqid| {
            let mut frame = Frame::new(FrameMethod::from(method), reqid);
            frame.connid = Some(connid);
            frame.identifier = Some(identifier);
            frame.value = value;
            frame
        })
        .await
    }

    /// Release a CONNECT by sending DISCONNECT for `connid`.
    pub async fn send_disconnect(&self, connid: &str) -> Result<(), DeviceError> {
        let connid = connid.to_string();
        self.send_request(move |reqid| {
            let mut frame = Frame::new(FrameMethod::Disconnect, reqid);
            frame.connid = Some(connid);
            frame
        })
        .await?;
        Ok(())
    }

    /// Register `device` (hosted locally) with the authoritative peer.
    pub async fn send_register(&self, deviceid: &str, device: Arc<dyn Device>) -> Result<String, DeviceError> {
        let connid = Uuid::new_v4().to_string();
        self.devices_by_connid
            .write()
            .expect("session poisoned")
            .insert(connid.clone(), ConnEntry { device, listener: None });

        let deviceid_owned = deviceid.to_string();
        let connid_for_frame = connid.clone();
        let result = self
            .send_request(move |reqid| {
                let mut frame = Frame::new(FrameMethod::Register, reqid);
                frame.deviceid = Some(deviceid_owned);
                frame.connid = Some(connid_for_frame);
                frame
            })
            .await;

        match result {
            Ok(Value::String(echoed_id)) => Ok(echoed_id),
            Ok(_) => Err(DeviceError::Validation("REGISTER reply did not carry a device id".to_string())),
            Err(err) => {
                self.devices_by_connid.write().expect("session poisoned").remove(&connid);
                Err(err)
            }
        }
    }

    /// Tear down a prior [`LinkSession::send_register`].
    pub async fn send_deregister(&self, deviceid: &str) -> Result<(), DeviceError> {
        let deviceid = deviceid.to_string();
        self.send_request(move |reqid| {
            let mut frame = Frame::new(FrameMethod::Deregister, reqid);
            frame.deviceid = Some(deviceid);
            frame
        })
        .await?;
        Ok(())
    }

    /// Obtain a [`RemoteDeviceProxy`] for a device id the peer is
    /// authoritative for.
    pub async fn send_connect(&self, deviceid: &str) -> Result<Arc<dyn Device>, DeviceError> {
        let deviceid_owned = deviceid.to_string();
        let result = self
            .send_request(move |reqid| {
                let mut frame = Frame::new(FrameMethod::Connect, reqid);
                frame.deviceid = Some(deviceid_owned);
                frame
            })
            .await?;

        let connid = match result {
            Value::String(connid) => connid,
            _ => return Err(DeviceError::Validation("CONNECT reply did not carry a connid".to_string())),
        };

        let proxy: Arc<dyn Device> = RemoteDeviceProxy::new(connid, self.arc());
        self.proxy_connections_by_deviceid
            .write()
            .expect("session poisoned")
            .insert(deviceid.to_string(), Arc::clone(&proxy));
        Ok(proxy)
    }

    /// Forward `deviceid`'s notification onward, fire-and-forget.
    pub async fn send_notification(&self, deviceid: &str, kind: NotificationKind, identifier: &str, value: &Value) {
        let method = match kind {
            NotificationKind::Put => FrameMethod::Put,
            NotificationKind::Notify => FrameMethod::Notify,
        };
        let deviceid_owned = deviceid.to_string();
        let identifier_owned = identifier.to_string();
        let value = value.clone();

        let result = self
            .send_request(move |reqid| {
                let mut frame = Frame::new(method, reqid);
                frame.deviceid = Some(deviceid_owned);
                frame.identifier = Some(identifier_owned);
                match kind {
                    NotificationKind::Notify => {
                        let params = match &value {
                            Value::Array(items) => items.clone(),
                            other => vec![other.clone()],
                        };
                        frame.params = Some(params);
                    }
                    NotificationKind::Put => frame.value = Some(value.clone()),
                }
                frame
            })
            .await;

        if let Err(err) = result {
            tracing::warn!(deviceid, %err, "failed to forward notification over link session");
        }
    }

    /// Decode and route one incoming frame.
    pub async fn handle_frame(&self, frame: Frame) {
        match frame.method {
            FrameMethod::Register => self.handle_register(frame).await,
            FrameMethod::Deregister => self.handle_deregister(frame).await,
            FrameMethod::Connect => self.handle_connect(frame).await,
            FrameMethod::Disconnect => self.handle_disconnect(frame).await,
            FrameMethod::Response => self.handle_response(frame).await,
            other => {
                if let Some(method) = other.as_device_method() {
                    if method.is_application_originated() {
                        self.handle_downstream_verb(frame, method).await;
                    } else {
                        self.handle_upstream_verb(frame, method).await;
                    }
                }
            }
        }
    }

    async fn handle_register(&self, frame: Frame) {
        let reqid = frame.reqid;
        let deviceid = match frame.deviceid {
            Some(d) if !d.is_empty() => d,
            _ => {
                self.send(Frame::response_failure(reqid, "REGISTER requires a deviceid")).await;
                return;
            }
        };
        let connid = match frame.connid {
            Some(c) if !c.is_empty() => c,
            _ => {
                self.send(Frame::response_failure(reqid, "REGISTER requires a connid")).await;
                return;
            }
        };

        let proxy: Arc<dyn Device> = RemoteDeviceProxy::new(connid, self.arc());
        match self.node.register(&deviceid, Arc::clone(&proxy)).await {
            Ok(normalized_id) => {
                self.proxies_by_deviceid
                    .write()
                    .expect("session poisoned")
                    .insert(normalized_id.clone(), proxy);
                self.send(Frame::response_success(reqid, Value::String(normalized_id))).await;
            }
            Err(err) => self.send(Frame::response_failure(reqid, err.wire_message())).await,
        }
    }

    async fn handle_deregister(&self, frame: Frame) {
        let reqid = frame.reqid;
        let deviceid = match frame.deviceid {
            Some(d) => d,
            None => {
                self.send(Frame::response_failure(reqid, "DEREGISTER requires a deviceid")).await;
                return;
            }
        };

        if self.proxies_by_deviceid.write().expect("session poisoned").remove(&deviceid).is_none() {
            self.send(Frame::response_failure(reqid, DeviceError::NotRegistered(deviceid).wire_message()))
                .await;
            return;
        }

        match self.node.deregister(&deviceid).await {
            Ok(_) => self.send(Frame::response_success(reqid, Value::Bool(true))).await,
            Err(err) => self.send(Frame::response_failure(reqid, err.wire_message())).await,
        }
    }

    async fn handle_connect(&self, frame: Frame) {
        let reqid = frame.reqid;
        let deviceid = match frame.deviceid.clone() {
            Some(d) if !d.is_empty() => d,
            _ => {
                self.send(Frame::response_failure(reqid, "CONNECT requires a deviceid")).await;
                return;
            }
        };

        match self.node.connect(&deviceid).await {
            Ok(device) => {
                let connid = Uuid::new_v4().to_string();
                let session = self.arc();
                let deviceid_for_listener = deviceid.clone();
                let handle = device.on_notification(Arc::new(move |kind, identifier, value| {
                    let session = Arc::clone(&session);
                    let deviceid = deviceid_for_listener.clone();
                    let identifier = identifier.to_string();
                    let value = value.clone();
                    tokio::spawn(async move {
                        session.send_notification(&deviceid, kind, &identifier, &value).await;
                    });
                }));

                self.devices_by_connid
                    .write()
                    .expect("session poisoned")
                    .insert(connid.clone(), ConnEntry { device, listener: Some(handle) });
                self.send(Frame::response_success(reqid, Value::String(connid))).await;
            }
            Err(err) => self.send(Frame::response_failure(reqid, err.wire_message())).await,
        }
    }

    async fn handle_disconnect(&self, frame: Frame) {
        let reqid = frame.reqid;
        let connid = match frame.connid {
            Some(c) => c,
            None => {
                self.send(Frame::response_failure(reqid, "DISCONNECT requires a connid")).await;
                return;
            }
        };

        let entry = self.devices_by_connid.write().expect("session poisoned").remove(&connid);
        match entry {
            None => {
                self.send(Frame::response_failure(reqid, format!("unknown connid '{connid}'"))).await;
            }
            Some(ConnEntry { device, listener }) => {
                if let Some(handle) = listener {
                    device.remove_notification_listener(handle);
                }
                match self.node.disconnect(device).await {
                    Ok(()) => self.send(Frame::response_success(reqid, Value::Bool(true))).await,
                    Err(err) => self.send(Frame::response_failure(reqid, err.wire_message())).await,
                }
            }
        }
    }

    async fn handle_downstream_verb(&self, frame: Frame, method: Method) {
        let reqid = frame.reqid;
        let connid = match frame.connid {
            Some(c) => c,
            None => {
                self.send(Frame::response_failure(reqid, "downstream verb requires a connid")).await;
                return;
            }
        };
        let device = self
            .devices_by_connid
            .read()
            .expect("session poisoned")
            .get(&connid)
            .map(|entry| Arc::clone(&entry.device));
        let device = match device {
            Some(device) => device,
            None => {
                self.send(Frame::response_failure(reqid, format!("unknown connid '{connid}'"))).await;
                return;
            }
        };

        let identifier = frame.identifier.unwrap_or_default();
        let value = frame.value.unwrap_or(Value::Null);
        let result = match method {
            Method::Get => device.get(&identifier).await,
            Method::Set => device.set(&identifier, value).await,
            Method::Invoke => device.invoke(&identifier, value).await,
            Method::Subscribe => device.subscribe(&identifier).await,
            Method::Describe => device.describe(&identifier).await,
            Method::Config => device.config(&identifier, value).await,
            Method::Put | Method::Notify => unreachable!("upstream verbs are routed separately"),
        };

        match result {
            Ok(value) => self.send(Frame::response_success(reqid, value)).await,
            Err(err) => self.send(Frame::response_failure(reqid, err.wire_message())).await,
        }
    }

    async fn handle_upstream_verb(&self, frame: Frame, method: Method) {
        let reqid = frame.reqid;
        let deviceid = frame.deviceid.unwrap_or_default();
        let identifier = frame.identifier.unwrap_or_default();
        let kind = match method {
            Method::Put => NotificationKind::Put,
            Method::Notify => NotificationKind::Notify,
            _ => unreachable!("downstream verbs are routed separately"),
        };

        let value = match method {
            Method::Notify => match frame.params {
                Some(params) => Value::Array(params),
                None => match frame.value {
                    Some(v @ Value::Array(_)) => v,
                    Some(v) => Value::Array(vec![v]),
                    None => Value::Array(Vec::new()),
                },
            },
            _ => frame.value.unwrap_or(Value::Null),
        };

        if self.proxies_by_deviceid.read().expect("session poisoned").contains_key(&deviceid) {
            let req = Request::new(&deviceid, method, &identifier).with_value(value);
            let _ = self.node.dispatch(req).await;
        } else if let Some(proxy) = self
            .proxy_connections_by_deviceid
            .read()
            .expect("session poisoned")
            .get(&deviceid)
            .cloned()
        {
            let _ = proxy.deliver_notification(kind, &identifier, &value).await;
        }

        self.send(Frame::response_success(reqid, Value::Bool(true))).await;
    }

    async fn handle_response(&self, frame: Frame) {
        let sender = self.pending.lock().await.remove(&frame.reqid);
        if let Some(sender) = sender {
            let result = if frame.success.unwrap_or(false) {
                Ok(frame.res.unwrap_or(Value::Null))
            } else {
                Err(DeviceError::Other(frame.err.unwrap_or_else(|| "unknown failure".to_string())))
            };
            let _ = sender.send(result);
        }
    }

    /// Tear the session down: deregister every device registered on behalf
    /// of the peer, release a gateway slot if this session held one, fail
    /// every pending request, and clear all session-scoped maps.
    pub async fn close(&self) {
        let deviceids: Vec<String> = self
            .proxies_by_deviceid
            .write()
            .expect("session poisoned")
            .drain()
            .map(|(id, _)| id)
            .collect();

        let mut deregistered = 0usize;
        for deviceid in deviceids {
            if self.node.deregister(&deviceid).await.is_ok() {
                deregistered += 1;
            }
        }

        let domain = self.gateway_domain.write().expect("session poisoned").take();
        if let Some(domain) = &domain {
            let _ = self.node.remove_gateway(domain);
        }

        let pending: Vec<_> = self.pending.lock().await.drain().collect();
        let failed = pending.len();
        for (_, sender) in pending {
            let _ = sender.send(Err(DeviceError::Transport("link session closed".to_string())));
        }

        self.devices_by_connid.write().expect("session poisoned").clear();
        self.proxy_connections_by_deviceid.write().expect("session poisoned").clear();

        let lifetime_secs = (chrono::Utc::now() - self.opened_at).num_seconds();
        tracing::info!(deregistered, failed, gateway_domain = ?domain, lifetime_secs, "link session closed");
    }
}
