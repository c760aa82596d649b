//! Serial driver for KORAD KA-series programmable power supplies
//!
//! The protocol is plain ASCII without terminators. The device needs a short
//! pause after every write, and its replies are read until the port times out.
//!
//! | operation          | command        | reply        |
//! |--------------------|----------------|--------------|
//! | identification     | `*IDN?`        | model string |
//! | status byte        | `STATUS?`      | one byte     |
//! | voltage set-point  | `VSET1?`       | `12.50`      |
//! | current set-point  | `ISET1?`       | `1.000`      |
//! | set voltage        | `VSET1:12.50`  | none         |
//! | set current        | `ISET1:1.000`  | none         |
//! | output on/off      | `OUT1`/`OUT0`  | none         |

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use serialport::{DataBits, Parity, StopBits};
use tracing::{debug, trace};

use super::{ChannelSetpoint, DeviceError, DeviceStatus, OnOffState, PowerSupply};

pub const DEFAULT_BAUD_RATE: u32 = 9600;

const READ_TIMEOUT: Duration = Duration::from_millis(200);
const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Some firmware appends a stray byte to set-point replies
const SETPOINT_WIDTH: usize = 5;

/// KORAD power supply on any byte stream
///
/// `P` is normally a `serialport` handle; tests substitute a scripted port.
pub struct KoradSerial<P: Read + Write + Send> {
    port: Option<P>,
    channels: usize,
    settle_delay: Duration,
}

impl KoradSerial<Box<dyn serialport::SerialPort>> {
    /// Opens the serial port with the supply's fixed 8N1 framing
    pub fn open(path: &str, baud_rate: u32, channels: usize) -> Result<Self, DeviceError> {
        debug!("Opening serial port {} at {} baud", path, baud_rate);
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| DeviceError::Open {
                port: path.to_string(),
                source,
            })?;

        Ok(Self::new(port, channels))
    }
}

impl<P: Read + Write + Send> KoradSerial<P> {
    pub fn new(port: P, channels: usize) -> Self {
        Self {
            port: Some(port),
            channels: channels.max(1),
            settle_delay: SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    fn port(&mut self) -> Result<&mut P, DeviceError> {
        self.port.as_mut().ok_or(DeviceError::Closed)
    }

    fn wire_channel(&self, channel: usize) -> Result<usize, DeviceError> {
        if channel < self.channels {
            Ok(channel + 1)
        } else {
            Err(DeviceError::NoSuchChannel(channel))
        }
    }

    fn send(&mut self, command: &str) -> Result<(), DeviceError> {
        trace!("-> {}", command);
        let settle_delay = self.settle_delay;
        let port = self.port()?;
        port.write_all(command.as_bytes())?;
        port.flush()?;

        if !settle_delay.is_zero() {
            thread::sleep(settle_delay);
        }
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<Vec<u8>, DeviceError> {
        self.send(command)?;

        let port = self.port()?;
        let mut response = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            match port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => response.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        trace!("<- {:?}", response);

        if response.is_empty() {
            return Err(DeviceError::NoResponse {
                command: command.to_string(),
            });
        }
        Ok(response)
    }

    fn query_text(&mut self, command: &str) -> Result<String, DeviceError> {
        let response = self.query(command)?;
        Ok(String::from_utf8_lossy(&response)
            .trim_matches(|c: char| c.is_whitespace() || c == '\0')
            .to_string())
    }

    fn query_setpoint(&mut self, command: &str) -> Result<f64, DeviceError> {
        let text = self.query_text(command)?;
        parse_setpoint(&text).ok_or_else(|| DeviceError::InvalidResponse {
            command: command.to_string(),
            response: text,
        })
    }

    fn status_byte(&mut self) -> Result<u8, DeviceError> {
        let response = self.query("STATUS?")?;
        // query() guarantees at least one byte
        Ok(response[0])
    }
}

fn parse_setpoint(text: &str) -> Option<f64> {
    text.parse::<f64>()
        .ok()
        .or_else(|| text.get(..SETPOINT_WIDTH)?.parse::<f64>().ok())
}

impl<P: Read + Write + Send> PowerSupply for KoradSerial<P> {
    fn model(&mut self) -> Result<String, DeviceError> {
        self.query_text("*IDN?")
    }

    fn status(&mut self) -> Result<DeviceStatus, DeviceError> {
        let mut status = DeviceStatus::from_status_byte(self.status_byte()?);
        for wire in 1..=self.channels {
            let voltage = self.query_setpoint(&format!("VSET{}?", wire))?;
            let current = self.query_setpoint(&format!("ISET{}?", wire))?;
            status.channels.push(ChannelSetpoint { voltage, current });
        }
        Ok(status)
    }

    fn output(&mut self) -> Result<OnOffState, DeviceError> {
        Ok(DeviceStatus::from_status_byte(self.status_byte()?).output)
    }

    fn set_output(&mut self, state: OnOffState) -> Result<(), DeviceError> {
        let command = if state.is_on() { "OUT1" } else { "OUT0" };
        self.send(command)
    }

    fn set_voltage(&mut self, channel: usize, volts: f64) -> Result<(), DeviceError> {
        let wire = self.wire_channel(channel)?;
        self.send(&format!("VSET{}:{:05.2}", wire, volts))
    }

    fn set_current(&mut self, channel: usize, amps: f64) -> Result<(), DeviceError> {
        let wire = self.wire_channel(channel)?;
        self.send(&format!("ISET{}:{:05.3}", wire, amps))
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        let port = self.port.take().ok_or(DeviceError::Closed)?;
        drop(port);
        debug!("Serial port closed");
        Ok(())
    }
}
