//! Command dispatch: one inbound (name, payload) pair in, device mutation and
//! status publications out.
//!
//! | name      | payload        | effect                                   |
//! |-----------|----------------|------------------------------------------|
//! | `output`  | `on` / `off`   | switch output, then publish output state |
//! | `output`  | `?` / empty    | publish output state only                |
//! | `status`  | ignored        | publish the JSON snapshot                |
//! | `voltage` | decimal        | set channel 0 voltage, no echo           |
//! | `current` | decimal        | set channel 0 current, no echo           |
//!
//! Unknown names are somebody else's traffic and are dropped silently. Known
//! names with bad payloads are reported on the error topic.

use tracing::{debug, error, trace};

use super::command::{Command, CommandKind};
use super::error::{BridgeError, CommandError};
use super::status::StatusPublisher;
use crate::device::PowerSupply;
use crate::mqtt::{MqttPublisher, Topics};

/// The only channel this bridge addresses
const CHANNEL: usize = 0;

/// What happened to a dispatched command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Executed(CommandKind),
    /// Known command, bad payload; reported on the error topic
    Rejected(CommandKind),
    /// Not one of our command names
    Ignored,
}

pub struct CommandRouter<'a> {
    device: &'a mut dyn PowerSupply,
    status: StatusPublisher<'a>,
    topics: &'a Topics,
}

impl<'a> CommandRouter<'a> {
    pub fn new(
        device: &'a mut dyn PowerSupply,
        mqtt: &'a dyn MqttPublisher,
        topics: &'a Topics,
    ) -> Self {
        Self {
            device,
            status: StatusPublisher::new(mqtt, topics),
            topics,
        }
    }

    /// Routes one command
    ///
    /// Device errors propagate and are fatal to the caller; payload errors are
    /// published and swallowed.
    pub fn dispatch(&mut self, name: &str, payload: &[u8]) -> Result<Dispatch, BridgeError> {
        let Some(kind) = CommandKind::from_name(name) else {
            trace!("Ignoring unknown command {:?}", name);
            return Ok(Dispatch::Ignored);
        };

        match Command::parse(kind, payload) {
            Ok(command) => {
                self.execute(command)?;
                Ok(Dispatch::Executed(kind))
            }
            Err(err) => {
                self.reject(kind, &err)?;
                Ok(Dispatch::Rejected(kind))
            }
        }
    }

    fn execute(&mut self, command: Command) -> Result<(), BridgeError> {
        debug!("Executing {:?}", command);
        match command {
            Command::Output(request) => {
                if let Some(target) = request.target() {
                    self.device.set_output(target)?;
                }
                self.status.publish_output(&mut *self.device)?;
            }
            Command::Status => self.status.publish_json(&mut *self.device)?,
            Command::Voltage(volts) => self.device.set_voltage(CHANNEL, volts)?,
            Command::Current(amps) => self.device.set_current(CHANNEL, amps)?,
        }
        Ok(())
    }

    fn reject(&self, kind: CommandKind, err: &CommandError) -> Result<(), BridgeError> {
        let message = format!(
            "Unknown command for {}: {}",
            self.topics.cmnd_topic(kind.name()),
            err
        );
        error!("{}", message);
        self.status.publish_error(&message)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock_device::{DeviceCall, MockPowerSupply};
    use crate::device::OnOffState;
    use crate::mqtt::publisher::recording::RecordingPublisher;

    struct Fixture {
        device: MockPowerSupply,
        mqtt: RecordingPublisher,
        topics: Topics,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                device: MockPowerSupply::new(),
                mqtt: RecordingPublisher::new(),
                topics: Topics::new("lab/KORAD"),
            }
        }

        fn dispatch(&mut self, name: &str, payload: &str) -> Dispatch {
            let mut device = self.device.clone();
            CommandRouter::new(&mut device, &self.mqtt, &self.topics)
                .dispatch(name, payload.as_bytes())
                .unwrap()
        }

        fn errors(&self) -> Vec<String> {
            self.mqtt.published_to("lab/KORAD/err")
        }
    }

    #[test]
    fn output_on_switches_and_reports() {
        let mut fx = Fixture::new();

        assert_eq!(
            fx.dispatch("output", "on"),
            Dispatch::Executed(CommandKind::Output)
        );
        assert_eq!(
            fx.device.mutations(),
            vec![DeviceCall::SetOutput(OnOffState::On)]
        );
        assert_eq!(
            fx.mqtt.published(),
            vec![("lab/KORAD/stat/output".to_string(), "ON".to_string(), false)]
        );
        assert!(fx.errors().is_empty());
    }

    #[test]
    fn output_off_switches_and_reports() {
        let mut fx = Fixture::new();
        fx.dispatch("output", "on");
        fx.dispatch("output", "off");

        assert_eq!(
            fx.device.mutations(),
            vec![
                DeviceCall::SetOutput(OnOffState::On),
                DeviceCall::SetOutput(OnOffState::Off)
            ]
        );
        assert_eq!(
            fx.mqtt.published_to("lab/KORAD/stat/output"),
            vec!["ON", "OFF"]
        );
    }

    #[test]
    fn output_query_never_mutates() {
        let mut fx = Fixture::new();
        for payload in ["?", "", "?", "?"] {
            fx.dispatch("output", payload);
        }

        assert!(fx.device.mutations().is_empty());
        assert_eq!(
            fx.mqtt.published_to("lab/KORAD/stat/output"),
            vec!["OFF"; 4]
        );
        assert!(fx.errors().is_empty());
    }

    #[test]
    fn unknown_output_value_is_reported_once() {
        let mut fx = Fixture::new();

        assert_eq!(
            fx.dispatch("output", "xyz"),
            Dispatch::Rejected(CommandKind::Output)
        );
        assert!(fx.device.calls().is_empty());

        let errors = fx.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("xyz"));
        assert!(errors[0].starts_with("Unknown command for lab/KORAD/cmnd/output: "));
        assert_eq!(fx.mqtt.published().len(), 1);
    }

    #[test]
    fn status_publishes_json_snapshot() {
        let mut fx = Fixture::new();

        assert_eq!(
            fx.dispatch("status", "whatever"),
            Dispatch::Executed(CommandKind::Status)
        );
        let payloads = fx.mqtt.published_to("lab/KORAD/stat/json");
        assert_eq!(payloads.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(json["output"], "OFF");
        assert!(fx.device.mutations().is_empty());
    }

    #[test]
    fn voltage_sets_channel_zero_without_echo() {
        let mut fx = Fixture::new();

        assert_eq!(
            fx.dispatch("voltage", "12.5"),
            Dispatch::Executed(CommandKind::Voltage)
        );
        assert_eq!(fx.device.mutations(), vec![DeviceCall::SetVoltage(0, 12.5)]);
        assert!(fx.mqtt.published().is_empty());
    }

    #[test]
    fn current_sets_channel_zero_without_echo() {
        let mut fx = Fixture::new();

        fx.dispatch("current", "1.25");
        assert_eq!(fx.device.mutations(), vec![DeviceCall::SetCurrent(0, 1.25)]);
        assert!(fx.mqtt.published().is_empty());
    }

    #[test]
    fn out_of_range_values_pass_through() {
        let mut fx = Fixture::new();

        fx.dispatch("voltage", "-3");
        fx.dispatch("current", "1000");
        assert_eq!(
            fx.device.mutations(),
            vec![
                DeviceCall::SetVoltage(0, -3.0),
                DeviceCall::SetCurrent(0, 1000.0)
            ]
        );
    }

    #[test]
    fn bad_voltage_never_reaches_device() {
        let mut fx = Fixture::new();

        assert_eq!(
            fx.dispatch("voltage", "abc"),
            Dispatch::Rejected(CommandKind::Voltage)
        );
        assert!(fx.device.calls().is_empty());
        let errors = fx.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("abc"));
    }

    #[test]
    fn bad_current_is_reported() {
        let mut fx = Fixture::new();

        fx.dispatch("current", "1.2.3");
        assert!(fx.device.calls().is_empty());
        assert!(fx.errors()[0].contains("1.2.3"));
        assert!(fx.errors()[0].contains("lab/KORAD/cmnd/current"));
    }

    #[test]
    fn unknown_name_is_silently_ignored() {
        let mut fx = Fixture::new();

        assert_eq!(fx.dispatch("banana", "on"), Dispatch::Ignored);
        assert_eq!(fx.dispatch("output/extra", "on"), Dispatch::Ignored);
        assert!(fx.device.calls().is_empty());
        assert!(fx.mqtt.requests().is_empty());
    }

    #[test]
    fn device_failure_propagates() {
        let fx = Fixture::new();
        fx.device.fail_writes();

        let mut device = fx.device.clone();
        let result = CommandRouter::new(&mut device, &fx.mqtt, &fx.topics).dispatch("output", b"on");
        assert!(matches!(result, Err(BridgeError::Device(_))));
        assert!(fx.mqtt.published().is_empty());
    }
}
