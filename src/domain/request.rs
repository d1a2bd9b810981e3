//! The `Request` value object and the `Method` verb enum that drives both
//! the middleware dispatcher's direction and the link session's wire
//! protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

/// The nine verbs a device operation can carry, shared between the
/// internal dispatcher and the peer wire protocol (where the allowed
/// `method` values are exactly these nine plus the four peer-lifecycle
/// verbs and `RESPONSE`, modeled separately by [`crate::link::frame::Frame`]).
///
/// `Display` (via `strum`) renders the same uppercase spelling the wire
/// protocol uses, so a verb can be dropped straight into a `tracing` field
/// without a separate formatting step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    /// `get(property) -> value`
    Get,
    /// `set(property, value) -> any`
    Set,
    /// `invoke(method, params) -> any`
    Invoke,
    /// `subscribe(event) -> any`
    Subscribe,
    /// `describe(property) -> schema`
    Describe,
    /// `config(property, value) -> any`
    Config,
    /// Device-originated metric sample, fed into upstream fan-out.
    Put,
    /// Device-originated event, fed into upstream fan-out.
    Notify,
}

impl Method {
    /// GET/SET/INVOKE/SUBSCRIBE/DESCRIBE/CONFIG are application-originated
    /// (downstream); PUT/NOTIFY are device-originated (upstream).
    #[must_use]
    pub fn is_application_originated(self) -> bool {
        !matches!(self, Method::Put | Method::Notify)
    }
}

/// The payload attached to a [`Request`]: a single value for SET/CONFIG/PUT,
/// or an array of params for INVOKE/NOTIFY.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// SET, CONFIG, PUT carry a single value.
    Value(Value),
    /// INVOKE, NOTIFY carry params.
    Params(Vec<Value>),
    /// GET/SUBSCRIBE/DESCRIBE carry neither.
    None,
}

impl Default for Payload {
    fn default() -> Self {
        Payload::None
    }
}

/// A request routed through the Middleware Dispatcher, either originated
/// by application code calling a [`crate::proxy::local::LocalProxy`] or
/// synthesized by the Device Registry from a device's own `put`/`notify`
/// notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The normalized target device id.
    pub deviceid: String,
    /// Which of the nine verbs this request carries.
    pub method: Method,
    /// The property/method/event/metric name.
    pub identifier: String,
    /// The value or params payload, if any.
    pub payload: Payload,
}

impl Request {
    /// Build a new request.
    #[must_use]
    pub fn new(deviceid: impl Into<String>, method: Method, identifier: impl Into<String>) -> Self {
        Self {
            deviceid: deviceid.into(),
            method,
            identifier: identifier.into(),
            payload: Payload::None,
        }
    }

    /// Attach a single value payload (SET/CONFIG/PUT).
    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.payload = Payload::Value(value);
        self
    }

    /// Attach a params payload (INVOKE/NOTIFY).
    #[must_use]
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.payload = Payload::Params(params);
        self
    }

    /// GET/SET/INVOKE/SUBSCRIBE/DESCRIBE/CONFIG are application-originated;
    /// PUT/NOTIFY are not.
    #[must_use]
    pub fn is_application_originated(&self) -> bool {
        self.method.is_application_originated()
    }

    /// The single value payload, if this request carries one.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The params payload, if this request carries one. NOTIFY requests
    /// whose `value` was not already a list are wrapped in a one-element
    /// list by the link session before reaching here.
    #[must_use]
    pub fn params(&self) -> Vec<Value> {
        match &self.payload {
            Payload::Params(p) => p.clone(),
            Payload::Value(v) => vec![v.clone()],
            Payload::None => Vec::new(),
        }
    }
}
