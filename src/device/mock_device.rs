//! In-memory power supply used by the bridge unit tests.

use std::sync::{Arc, Mutex};

use super::{ChannelSetpoint, DeviceError, DeviceStatus, OnOffState, PowerSupply};

/// A device call as seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Model,
    Status,
    Output,
    SetOutput(OnOffState),
    SetVoltage(usize, f64),
    SetCurrent(usize, f64),
    Close,
}

#[derive(Debug)]
struct MockState {
    output: OnOffState,
    setpoint: ChannelSetpoint,
    calls: Vec<DeviceCall>,
    fail_writes: bool,
}

/// Simulated supply with one channel; clones share state so tests can keep a
/// handle after boxing the device into a session.
#[derive(Debug, Clone)]
pub struct MockPowerSupply {
    state: Arc<Mutex<MockState>>,
}

impl MockPowerSupply {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                output: OnOffState::Off,
                setpoint: ChannelSetpoint {
                    voltage: 0.0,
                    current: 0.0,
                },
                calls: Vec::new(),
                fail_writes: false,
            })),
        }
    }

    /// Makes every mutating call fail as if the serial link dropped
    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change device state
    pub fn mutations(&self) -> Vec<DeviceCall> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    DeviceCall::SetOutput(_) | DeviceCall::SetVoltage(..) | DeviceCall::SetCurrent(..)
                )
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == DeviceCall::Close)
            .count()
    }

    pub fn output_state(&self) -> OnOffState {
        self.state.lock().unwrap().output
    }

    fn record(&self, call: DeviceCall) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        let mutating = matches!(
            call,
            DeviceCall::SetOutput(_) | DeviceCall::SetVoltage(..) | DeviceCall::SetCurrent(..)
        );
        state.calls.push(call);
        if mutating && state.fail_writes {
            return Err(DeviceError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "serial link lost",
            )));
        }
        Ok(())
    }
}

impl PowerSupply for MockPowerSupply {
    fn model(&mut self) -> Result<String, DeviceError> {
        self.record(DeviceCall::Model)?;
        Ok("KORADKA3005PV2.0".to_string())
    }

    fn status(&mut self) -> Result<DeviceStatus, DeviceError> {
        self.record(DeviceCall::Status)?;
        let state = self.state.lock().unwrap();
        let raw = if state.output.is_on() { 0x41 } else { 0x01 };
        let mut status = DeviceStatus::from_status_byte(raw);
        status.channels.push(state.setpoint);
        Ok(status)
    }

    fn output(&mut self) -> Result<OnOffState, DeviceError> {
        self.record(DeviceCall::Output)?;
        Ok(self.state.lock().unwrap().output)
    }

    fn set_output(&mut self, output: OnOffState) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetOutput(output))?;
        self.state.lock().unwrap().output = output;
        Ok(())
    }

    fn set_voltage(&mut self, channel: usize, volts: f64) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetVoltage(channel, volts))?;
        self.state.lock().unwrap().setpoint.voltage = volts;
        Ok(())
    }

    fn set_current(&mut self, channel: usize, amps: f64) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetCurrent(channel, amps))?;
        self.state.lock().unwrap().setpoint.current = amps;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.record(DeviceCall::Close)
    }
}
