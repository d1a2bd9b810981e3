//! The `MiddlewareDispatcher`: a user-installed handler chain wrapping two
//! final handlers, `deliverDownstream` and `fanOutUpstream`, selected by the
//! direction of the request being dispatched.
//!
//! Handler semantics (spec.md §4.4, §9 "Return the last defined result"):
//! a handler may invoke `next` and return its value, return a value
//! directly (short-circuit), return nothing (the dispatcher substitutes
//! the most recently produced result), or fail — and a failure is visible
//! to every handler still on the stack above it, exactly like a normal
//! `Result` returned up through nested calls.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::domain::device::NotificationKind;
use crate::domain::error::DeviceError;
use crate::domain::request::{Method, Request};
use crate::registry::{DeviceRegistry, ProxyRegistry};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// One installed middleware layer.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle `req`, optionally forwarding to `next`.
    ///
    /// Returning `Ok(Some(value))` short-circuits with `value` if `next`
    /// was never called, or forwards `next`'s value if it was.
    /// Returning `Ok(None)` asks the dispatcher to substitute the most
    /// recently produced result (see the module docs). Returning `Err`
    /// propagates to whichever handler is currently awaiting this one
    /// through `next`.
    async fn handle(&self, req: Request, next: Next) -> Result<Option<Value>, DeviceError>;
}

/// The continuation a [`Handler`] invokes to run the rest of the chain.
pub struct Next {
    dispatcher: Arc<MiddlewareDispatcher>,
    handlers: Vec<Arc<dyn Handler>>,
    idx: usize,
    req: Request,
    last: Arc<AsyncMutex<Option<Value>>>,
}

impl Next {
    /// Run the remainder of the chain and return its resolved value.
    pub async fn call(self) -> Result<Value, DeviceError> {
        self.dispatcher.run(self.handlers, self.idx, self.req, self.last).await
    }
}

/// Bidirectional request pipeline: a user-supplied handler chain plus the
/// two built-in final handlers `deliverDownstream`/`fanOutUpstream`.
pub struct MiddlewareDispatcher {
    handlers: RwLock<Vec<Arc<dyn Handler>>>,
    device_registry: Arc<DeviceRegistry>,
    proxy_registry: Arc<ProxyRegistry>,
}

impl MiddlewareDispatcher {
    /// Build an empty pipeline over the given node registries.
    #[must_use]
    pub fn new(device_registry: Arc<DeviceRegistry>, proxy_registry: Arc<ProxyRegistry>) -> Arc<Self> {
        Arc::new(Self {
            handlers: RwLock::new(Vec::new()),
            device_registry,
            proxy_registry,
        })
    }

    /// Append a handler to the end of the pipeline (last to be visited
    /// downstream, first to be visited upstream).
    pub fn push_handler(&self, handler: Arc<dyn Handler>) {
        self.handlers.write().expect("dispatcher poisoned").push(handler);
    }

    /// Number of installed handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().expect("dispatcher poisoned").len()
    }

    /// Whether no handlers are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch `req` through the pipeline, direction chosen by
    /// `req.is_application_originated()`.
    pub async fn dispatch(self: &Arc<Self>, req: Request) -> Result<Value, DeviceError> {
        let ordered = self.ordered_for(&req);
        let last = Arc::new(AsyncMutex::new(None));
        self.run(ordered, 0, req, last).await
    }

    fn ordered_for(&self, req: &Request) -> Vec<Arc<dyn Handler>> {
        let handlers = self.handlers.read().expect("dispatcher poisoned").clone();
        if req.is_application_originated() {
            handlers
        } else {
            let mut reversed = handlers;
            reversed.reverse();
            reversed
        }
    }

    fn run(
        self: &Arc<Self>,
        handlers: Vec<Arc<dyn Handler>>,
        idx: usize,
        req: Request,
        last: Arc<AsyncMutex<Option<Value>>>,
    ) -> BoxFuture<Result<Value, DeviceError>> {
        let dispatcher = Arc::clone(self);
        Box::pin(async move {
            if idx == handlers.len() {
                let value = if req.is_application_originated() {
                    dispatcher.deliver_downstream(&req).await?
                } else {
                    dispatcher.fan_out_upstream(&req).await?
                };
                *last.lock().await = Some(value.clone());
                return Ok(value);
            }

            let handler = Arc::clone(&handlers[idx]);
            let next = Next {
                dispatcher: Arc::clone(&dispatcher),
                handlers: handlers.clone(),
                idx: idx + 1,
                req: req.clone(),
                last: Arc::clone(&last),
            };

            match handler.handle(req, next).await? {
                Some(value) => {
                    *last.lock().await = Some(value.clone());
                    Ok(value)
                }
                None => {
                    let observed = last.lock().await;
                    match observed.clone() {
                        Some(value) => Ok(value),
                        None => Err(DeviceError::Middleware(
                            "layer must invoke next or return".to_string(),
                        )),
                    }
                }
            }
        })
    }

    async fn deliver_downstream(&self, req: &Request) -> Result<Value, DeviceError> {
        let device = self
            .device_registry
            .get(&req.deviceid)
            .ok_or_else(|| DeviceError::NotConnected(req.deviceid.clone()))?;

        let result = match req.method {
            Method::Get => device.get(&req.identifier).await?,
            Method::Set => {
                let value = req.value().cloned().unwrap_or(Value::Null);
                substitute_true_if_empty(device.set(&req.identifier, value).await?)
            }
            Method::Invoke => {
                substitute_true_if_empty(device.invoke(&req.identifier, Value::Array(req.params())).await?)
            }
            Method::Subscribe => device.subscribe(&req.identifier).await?,
            Method::Describe => device.describe(&req.identifier).await?,
            Method::Config => {
                let value = req.value().cloned().unwrap_or(Value::Null);
                device.config(&req.identifier, value).await?
            }
            Method::Put | Method::Notify => {
                return Err(DeviceError::Validation(
                    "PUT/NOTIFY are upstream-only verbs".to_string(),
                ))
            }
        };
        Ok(result)
    }

    async fn fan_out_upstream(&self, req: &Request) -> Result<Value, DeviceError> {
        let kind = match req.method {
            Method::Put => NotificationKind::Put,
            Method::Notify => NotificationKind::Notify,
            _ => {
                return Err(DeviceError::Validation(
                    "fan-out only handles PUT/NOTIFY".to_string(),
                ))
            }
        };
        let value = req.value().cloned().unwrap_or(Value::Null);

        for proxy in self.proxy_registry.list(&req.deviceid) {
            if let Err(err) = proxy.deliver_notification(kind, &req.identifier, &value).await {
                tracing::warn!(
                    deviceid = %req.deviceid,
                    method = %req.method,
                    identifier = %req.identifier,
                    %err,
                    "upstream fan-out: one proxy failed, continuing with the rest"
                );
            }
        }

        Ok(Value::Bool(true))
    }
}

fn substitute_true_if_empty(value: Value) -> Value {
    if value.is_null() {
        Value::Bool(true)
    } else {
        value
    }
}
