//! # Power Supply Device Layer
//!
//! Wraps the bench power supply behind the [`PowerSupply`] trait so the bridge
//! never sees serial frames, only typed getters and setters.
//!
//! ```text
//! device/
//! ├── status.rs  - DeviceStatus and its enumerated fields
//! ├── korad.rs   - KORAD serial protocol driver
//! └── error.rs   - DeviceError
//! ```
//!
//! All operations block on the serial round-trip. The bridge calls them from a
//! single task, one command at a time, because the firmware does not tolerate
//! overlapping writes.

pub mod error;
pub mod korad;
pub mod status;

#[cfg(test)]
pub mod mock_device;

pub use error::DeviceError;
pub use korad::KoradSerial;
pub use status::{ChannelMode, ChannelSetpoint, DeviceStatus, OnOffState, Tracking};

/// Typed access to a programmable power supply
///
/// Values are passed through unvalidated; the firmware is the authority on
/// what is in range.
pub trait PowerSupply: Send {
    /// Model identification string, used for diagnostics only
    fn model(&mut self) -> Result<String, DeviceError>;

    /// Reads a full status snapshot
    fn status(&mut self) -> Result<DeviceStatus, DeviceError>;

    /// Reads whether the output is currently enabled
    fn output(&mut self) -> Result<OnOffState, DeviceError> {
        Ok(self.status()?.output)
    }

    fn set_output(&mut self, state: OnOffState) -> Result<(), DeviceError>;

    /// Writes the target voltage of a 0-based channel
    fn set_voltage(&mut self, channel: usize, volts: f64) -> Result<(), DeviceError>;

    /// Writes the target current of a 0-based channel
    fn set_current(&mut self, channel: usize, amps: f64) -> Result<(), DeviceError>;

    /// Releases the serial handle. Callers invoke this at most once.
    fn close(&mut self) -> Result<(), DeviceError>;
}
