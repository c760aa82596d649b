//! Renders device state onto the outbound status topics

use tracing::debug;

use super::error::BridgeError;
use crate::device::{OnOffState, PowerSupply};
use crate::mqtt::{Availability, MqttError, MqttPublisher, Topics};

/// Read-then-publish helper for everything under `<prefix>/stat` and `<prefix>/err`
///
/// Holds no device state of its own: every call reads the hardware afresh.
pub struct StatusPublisher<'a> {
    mqtt: &'a dyn MqttPublisher,
    topics: &'a Topics,
}

impl<'a> StatusPublisher<'a> {
    pub fn new(mqtt: &'a dyn MqttPublisher, topics: &'a Topics) -> Self {
        Self { mqtt, topics }
    }

    /// Publishes the output state name (`ON`/`OFF`) to `<stat>/output`
    pub fn publish_output(&self, device: &mut dyn PowerSupply) -> Result<OnOffState, BridgeError> {
        let output = device.output()?;
        debug!("Output state: {}", output);
        self.mqtt
            .publish(&self.topics.stat_topic("output"), output.as_str(), false)?;
        Ok(output)
    }

    /// Publishes the full status snapshot as JSON to `<stat>/json`
    pub fn publish_json(&self, device: &mut dyn PowerSupply) -> Result<(), BridgeError> {
        let status = device.status()?;
        let json = serde_json::to_string(&status)?;
        debug!("Sending JSON status");
        self.mqtt
            .publish(&self.topics.stat_topic("json"), &json, false)?;
        Ok(())
    }

    /// Publishes retained availability so late subscribers see it at once
    pub fn publish_availability(&self, availability: Availability) -> Result<(), MqttError> {
        debug!("Availability: {}", availability.as_str());
        self.mqtt
            .publish(&self.topics.availability(), availability.as_str(), true)
    }

    pub fn publish_error(&self, message: &str) -> Result<(), MqttError> {
        self.mqtt.publish(self.topics.err(), message, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock_device::{DeviceCall, MockPowerSupply};
    use crate::mqtt::publisher::recording::RecordingPublisher;

    #[test]
    fn output_is_published_by_name() {
        let mqtt = RecordingPublisher::new();
        let topics = Topics::new("lab/KORAD");
        let mut device = MockPowerSupply::new();
        device.set_output(OnOffState::On).unwrap();

        let status = StatusPublisher::new(&mqtt, &topics);
        assert_eq!(status.publish_output(&mut device).unwrap(), OnOffState::On);
        assert_eq!(
            mqtt.published(),
            vec![("lab/KORAD/stat/output".to_string(), "ON".to_string(), false)]
        );
    }

    #[test]
    fn json_snapshot_is_read_fresh() {
        let mqtt = RecordingPublisher::new();
        let topics = Topics::new("lab/KORAD");
        let mut device = MockPowerSupply::new();

        let status = StatusPublisher::new(&mqtt, &topics);
        status.publish_json(&mut device).unwrap();
        device.set_voltage(0, 5.0).unwrap();
        status.publish_json(&mut device).unwrap();

        let payloads = mqtt.published_to("lab/KORAD/stat/json");
        assert_eq!(payloads.len(), 2);
        let latest: serde_json::Value = serde_json::from_str(&payloads[1]).unwrap();
        assert_eq!(latest["output"], "OFF");
        assert_eq!(latest["channels"][0]["voltage"], 5.0);
        assert_eq!(
            device
                .calls()
                .iter()
                .filter(|call| **call == DeviceCall::Status)
                .count(),
            2
        );
    }

    #[test]
    fn availability_is_retained() {
        let mqtt = RecordingPublisher::new();
        let topics = Topics::new("lab/KORAD");

        let status = StatusPublisher::new(&mqtt, &topics);
        status.publish_availability(Availability::Online).unwrap();
        status.publish_availability(Availability::Offline).unwrap();

        assert_eq!(
            mqtt.published(),
            vec![
                (
                    "lab/KORAD/stat/availability".to_string(),
                    "online".to_string(),
                    true
                ),
                (
                    "lab/KORAD/stat/availability".to_string(),
                    "offline".to_string(),
                    true
                ),
            ]
        );
    }
}
