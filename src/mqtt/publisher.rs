use rumqttc::{AsyncClient, ClientError, QoS};
use thiserror::Error;

/// Errors from queueing a request on the MQTT client
#[derive(Debug, Error)]
pub enum MqttError {
    /// The client request queue is full or the event loop is gone
    #[error("MQTT request failed: {0}")]
    Request(String),
}

impl From<ClientError> for MqttError {
    fn from(err: ClientError) -> Self {
        MqttError::Request(err.to_string())
    }
}

/// Outbound half of the pub/sub client
///
/// Calls only enqueue; they never wait for the broker. Requests reach the
/// wire in the order they were made.
pub trait MqttPublisher: Send {
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), MqttError>;

    fn subscribe(&self, filter: &str) -> Result<(), MqttError>;

    fn disconnect(&self) -> Result<(), MqttError>;
}

impl MqttPublisher for AsyncClient {
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), MqttError> {
        self.try_publish(topic, QoS::AtMostOnce, retain, payload.as_bytes().to_vec())?;
        Ok(())
    }

    fn subscribe(&self, filter: &str) -> Result<(), MqttError> {
        self.try_subscribe(filter, QoS::AtMostOnce)?;
        Ok(())
    }

    fn disconnect(&self) -> Result<(), MqttError> {
        self.try_disconnect()?;
        Ok(())
    }
}

#[cfg(test)]
pub mod recording {
    //! Publisher double that records every request in order.

    use super::{MqttError, MqttPublisher};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Request {
        Publish {
            topic: String,
            payload: String,
            retain: bool,
        },
        Subscribe(String),
        Disconnect,
    }

    #[derive(Debug, Clone, Default)]
    pub struct RecordingPublisher {
        requests: Arc<Mutex<Vec<Request>>>,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        /// `(topic, payload, retain)` of every publish, in order
        pub fn published(&self) -> Vec<(String, String, bool)> {
            self.requests()
                .into_iter()
                .filter_map(|request| match request {
                    Request::Publish {
                        topic,
                        payload,
                        retain,
                    } => Some((topic, payload, retain)),
                    _ => None,
                })
                .collect()
        }

        pub fn published_to(&self, topic: &str) -> Vec<String> {
            self.published()
                .into_iter()
                .filter(|(t, _, _)| t == topic)
                .map(|(_, payload, _)| payload)
                .collect()
        }

        pub fn subscriptions(&self) -> Vec<String> {
            self.requests()
                .into_iter()
                .filter_map(|request| match request {
                    Request::Subscribe(filter) => Some(filter),
                    _ => None,
                })
                .collect()
        }
    }

    impl MqttPublisher for RecordingPublisher {
        fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), MqttError> {
            self.requests.lock().unwrap().push(Request::Publish {
                topic: topic.to_string(),
                payload: payload.to_string(),
                retain,
            });
            Ok(())
        }

        fn subscribe(&self, filter: &str) -> Result<(), MqttError> {
            self.requests
                .lock()
                .unwrap()
                .push(Request::Subscribe(filter.to_string()));
            Ok(())
        }

        fn disconnect(&self) -> Result<(), MqttError> {
            self.requests.lock().unwrap().push(Request::Disconnect);
            Ok(())
        }
    }
}
