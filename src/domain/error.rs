//! Domain errors, covering four surfaces: validation, state, transport,
//! and middleware.

use thiserror::Error;

/// Errors surfaced by the node engine and the link session.
///
/// `Display` text for the state-error variants matches the human-readable
/// messages quoted by the spec verbatim, since those messages also cross
/// the peer boundary verbatim in a `RESPONSE`'s `err` field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Malformed device id, invalid/unknown verb, a binary frame, or a
    /// non-JSON frame.
    #[error("Validation error: {0}")]
    Validation(String),

    /// `register` called for an id that is already in the Device Registry.
    #[error("Already registered")]
    AlreadyRegistered(String),

    /// `deregister` called for an id that is not in the Device Registry.
    #[error("Unknown device")]
    NotRegistered(String),

    /// Dispatch (or a downstream verb over a link) targeted a device id
    /// with no local device and no live connection.
    #[error("Device '{0}' is not connected")]
    NotConnected(String),

    /// A gateway is already registered for this domain.
    #[error("Gateway already registered for domain '{0}'")]
    GatewayExists(String),

    /// No gateway is registered for this domain.
    #[error("No gateway registered for domain '{0}'")]
    NoGateway(String),

    /// A middleware handler violated the "invoke next or return" contract,
    /// or dispatch unwound with no produced value.
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// A send over the underlying transport failed, or the session the
    /// request belonged to was torn down before a response arrived.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A device capability call itself failed; `message` carries the
    /// device's own error text verbatim.
    #[error("{0}")]
    Other(String),
}

impl DeviceError {
    /// The message text that crosses the peer boundary in a `RESPONSE`'s
    /// `err` field. The peer protocol transmits message text only.
    #[must_use]
    pub fn wire_message(&self) -> String {
        self.to_string()
    }
}

impl From<DeviceError> for String {
    fn from(err: DeviceError) -> Self {
        err.to_string()
    }
}
