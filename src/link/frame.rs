//! The peer wire frame: a UTF-8 JSON object carrying `method` and `reqid`
//! plus verb-dependent fields, exactly as spec.md §6.1 describes it.
//! Binary messages never reach this type — the transport adapter rejects
//! them before decoding is attempted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::DeviceError;
use crate::domain::request::Method;

/// The thirteen allowed wire verbs: the nine [`Method`] verbs plus the four
/// peer-lifecycle verbs and `RESPONSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameMethod {
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
    /// Device-originated metric sample.
    Put,
    /// Device-originated event.
    Notify,
    /// Container → master: register a local device.
    Register,
    /// Container → master: tear down a REGISTER.
    Deregister,
    /// Caller → master: obtain a `connid`.
    Connect,
    /// Caller → master: release a CONNECT.
    Disconnect,
    /// Reply to any of the above, indexed by `reqid`.
    Response,
}

impl From<Method> for FrameMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => FrameMethod::Get,
            Method::Set => FrameMethod::Set,
            Method::Invoke => FrameMethod::Invoke,
            Method::Subscribe => FrameMethod::Subscribe,
            Method::Describe => FrameMethod::Describe,
            Method::Config => FrameMethod::Config,
            Method::Put => FrameMethod::Put,
            Method::Notify => FrameMethod::Notify,
        }
    }
}

impl FrameMethod {
    /// The [`Method`] this wire verb corresponds to, if it is one of the
    /// nine device-operation verbs rather than a peer-lifecycle verb.
    #[must_use]
    pub fn as_device_method(self) -> Option<Method> {
        match self {
            FrameMethod::Get => Some(Method::Get),
            FrameMethod::Set => Some(Method::Set),
            FrameMethod::Invoke => Some(Method::Invoke),
            FrameMethod::Subscribe => Some(Method::Subscribe),
            FrameMethod::Describe => Some(Method::Describe),
            FrameMethod::Config => Some(Method::Config),
            FrameMethod::Put => Some(Method::Put),
            FrameMethod::Notify => Some(Method::Notify),
            FrameMethod::Register
            | FrameMethod::Deregister
            | FrameMethod::Connect
            | FrameMethod::Disconnect
            | FrameMethod::Response => None,
        }
    }
}

/// One wire frame. Fields not meaningful for a given `method` are simply
/// left `None` and omitted from the JSON encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Which of the thirteen allowed verbs this frame carries.
    pub method: FrameMethod,
    /// Monotone per-session, per-direction request identifier.
    pub reqid: u64,
    /// Target device id, for all device and peer-lifecycle verbs.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deviceid: Option<String>,
    /// Connection handle, for CONNECT replies and subsequent verbs.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub connid: Option<String>,
    /// Property/method/event/metric name, for device verbs.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub identifier: Option<String>,
    /// Single-value payload, for SET/CONFIG/INVOKE/PUT.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<Value>,
    /// Params payload, for NOTIFY.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub params: Option<Vec<Value>>,
    /// Whether a RESPONSE carries a success or a failure.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub success: Option<bool>,
    /// The successful result, for a RESPONSE with `success: true`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub res: Option<Value>,
    /// The failure's message text, for a RESPONSE with `success: false`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub err: Option<String>,
}

impl Frame {
    /// Build a bare frame for `method`/`reqid`, no optional fields set.
    #[must_use]
    pub fn new(method: FrameMethod, reqid: u64) -> Self {
        Self {
            method,
            reqid,
            deviceid: None,
            connid: None,
            identifier: None,
            value: None,
            params: None,
            success: None,
            res: None,
            err: None,
        }
    }

    /// A `RESPONSE` frame carrying a successful result.
    #[must_use]
    pub fn response_success(reqid: u64, res: Value) -> Self {
        Self {
            success: Some(true),
            res: Some(res),
            ..Self::new(FrameMethod::Response, reqid)
        }
    }

    /// A `RESPONSE` frame carrying a failure's message text.
    #[must_use]
    pub fn response_failure(reqid: u64, err: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            err: Some(err.into()),
            ..Self::new(FrameMethod::Response, reqid)
        }
    }

    /// Decode a frame from a UTF-8 text message.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Validation`] if the text is not a JSON
    /// object shaped like a [`Frame`], or if `method` is not one of the
    /// thirteen allowed verbs.
    pub fn decode(text: &str) -> Result<Self, DeviceError> {
        serde_json::from_str(text).map_err(|err| DeviceError::Validation(format!("malformed frame: {err}")))
    }

    /// Encode this frame to its wire JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Validation`] only if the frame contains a
    /// `value`/`res`/`params` payload that cannot be serialized (not
    /// possible for well-formed [`serde_json::Value`]s, but kept fallible
    /// since the encoder is a boundary).
    pub fn encode(&self) -> Result<String, DeviceError> {
        serde_json::to_string(self).map_err(|err| DeviceError::Validation(format!("unencodable frame: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_success_round_trips() {
        let frame = Frame::response_success(7, Value::from(42));
        let text = frame.encode().unwrap();
        let decoded = Frame::decode(&text).unwrap();
        assert_eq!(decoded.reqid, 7);
        assert_eq!(decoded.success, Some(true));
        assert_eq!(decoded.res, Some(Value::from(42)));
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = Frame::decode(r#"{"method":"EXPLODE","reqid":1}"#).unwrap_err();
        assert!(matches!(err, DeviceError::Validation(_)));
    }

    #[test]
    fn omitted_fields_are_not_encoded() {
        let frame = Frame::new(FrameMethod::Get, 1);
        let text = frame.encode().unwrap();
        assert!(!text.contains("deviceid"));
        assert!(!text.contains("connid"));
    }
}
