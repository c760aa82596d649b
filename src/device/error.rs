//! Error types for the serial power supply driver

use thiserror::Error;

/// Errors raised while talking to the power supply
///
/// Every variant is treated as fatal by the bridge: a serial link that breaks
/// mid-operation is handled the same way as one that never opened.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The serial port could not be opened
    #[error("Bad serial port: {port}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Reading from or writing to the port failed
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device stayed silent after a query
    #[error("No response to {command}")]
    NoResponse { command: String },

    /// The device answered with something we could not decode
    #[error("Invalid response to {command}: {response:?}")]
    InvalidResponse { command: String, response: String },

    /// Channel index beyond what the driver was configured for
    #[error("Channel {0} does not exist")]
    NoSuchChannel(usize),

    /// The port has already been released
    #[error("Serial port already closed")]
    Closed,
}
