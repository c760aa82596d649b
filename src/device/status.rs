//! Point-in-time device status
//!
//! Every enumerated field carries its own name table (`as_str`) and serializes
//! through it, so the JSON snapshot shows `"ON"` rather than `1`.

use serde::{Serialize, Serializer};
use std::fmt;

/// Binary on/off state used for output, beep and key lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnOffState {
    Off,
    On,
}

impl OnOffState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnOffState::Off => "OFF",
            OnOffState::On => "ON",
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, OnOffState::On)
    }
}

impl From<bool> for OnOffState {
    fn from(enabled: bool) -> Self {
        if enabled {
            OnOffState::On
        } else {
            OnOffState::Off
        }
    }
}

/// Regulation mode a channel is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    ConstantCurrent,
    ConstantVoltage,
}

impl ChannelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelMode::ConstantCurrent => "CONSTANT_CURRENT",
            ChannelMode::ConstantVoltage => "CONSTANT_VOLTAGE",
        }
    }
}

impl From<bool> for ChannelMode {
    fn from(bit: bool) -> Self {
        if bit {
            ChannelMode::ConstantVoltage
        } else {
            ChannelMode::ConstantCurrent
        }
    }
}

/// Channel tracking mode on multi-channel supplies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tracking {
    Independent,
    Series,
    Parallel,
    Unknown,
}

impl Tracking {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tracking::Independent => "INDEPENDENT",
            Tracking::Series => "SERIES",
            Tracking::Parallel => "PARALLEL",
            Tracking::Unknown => "UNKNOWN",
        }
    }

    /// Decodes the two tracking bits of the status byte
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Tracking::Independent,
            1 => Tracking::Series,
            3 => Tracking::Parallel,
            _ => Tracking::Unknown,
        }
    }
}

macro_rules! serialize_by_name {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.serialize_str(self.as_str())
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

serialize_by_name!(OnOffState, ChannelMode, Tracking);

/// Target set-points of one output channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelSetpoint {
    pub voltage: f64,
    pub current: f64,
}

/// Full status snapshot as read from the hardware
///
/// Never cached: each status-producing command reads a fresh one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    /// The undecoded status byte
    pub raw: u8,
    pub channel1: ChannelMode,
    pub channel2: ChannelMode,
    pub tracking: Tracking,
    pub beep: OnOffState,
    pub lock: OnOffState,
    pub output: OnOffState,
    pub channels: Vec<ChannelSetpoint>,
}

impl DeviceStatus {
    /// Decodes a status byte; set-points are filled in by the caller
    pub fn from_status_byte(raw: u8) -> Self {
        Self {
            raw,
            channel1: ChannelMode::from(raw & 0x01 != 0),
            channel2: ChannelMode::from(raw & 0x02 != 0),
            tracking: Tracking::from_bits(raw >> 2),
            beep: OnOffState::from(raw & 0x10 != 0),
            lock: OnOffState::from(raw & 0x20 != 0),
            output: OnOffState::from(raw & 0x40 != 0),
            channels: Vec::new(),
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "output={} ch1={} ch2={} tracking={} beep={} lock={}",
            self.output, self.channel1, self.channel2, self.tracking, self.beep, self.lock
        )?;
        for (idx, channel) in self.channels.iter().enumerate() {
            write!(f, " [{}: {:.2}V {:.3}A]", idx, channel.voltage, channel.current)?;
        }
        Ok(())
    }
}
