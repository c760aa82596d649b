//! Error types for the bridge core

use rumqttc::ConnectReturnCode;
use std::num::ParseFloatError;
use thiserror::Error;

use crate::device::DeviceError;
use crate::mqtt::MqttError;

/// A recognized command carried a payload we cannot act on
///
/// These are user errors: reported on `<prefix>/err`, never fatal.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unrecognized output value '{0}'")]
    UnknownOutput(String),

    #[error("invalid {quantity} value '{value}': {source}")]
    InvalidNumber {
        quantity: &'static str,
        value: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("invalid {quantity} value '{value}': not a finite number")]
    NotFinite {
        quantity: &'static str,
        value: String,
    },

    #[error("payload is not valid UTF-8: '{0}'")]
    NotUtf8(String),
}

/// Errors that end or disturb a bridge session
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Serial link failure; always fatal
    #[error("Power supply error: {0}")]
    Device(#[from] DeviceError),

    /// A request could not be queued on the MQTT client
    #[error(transparent)]
    Mqtt(#[from] MqttError),

    #[error("Failed to encode status: {0}")]
    Encode(#[from] serde_json::Error),

    /// The broker rejected our credentials; retrying cannot help
    #[error("Incorrect MQTT login credentials ({0:?})")]
    AuthenticationRejected(ConnectReturnCode),

    /// The MQTT event pump stopped while the session was running
    #[error("MQTT event loop stopped unexpectedly")]
    TransportClosed,
}
