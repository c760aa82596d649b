use chrono::NaiveDateTime;
use rumqttc::ConnectReturnCode;
use std::fmt;

/// One inbound publish, stamped on arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: NaiveDateTime,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        InboundMessage {
            topic: topic.into(),
            payload: payload.into(),
            received_at: chrono::Local::now().naive_local(),
        }
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}: {:?}",
            self.received_at,
            self.topic,
            String::from_utf8_lossy(&self.payload)
        )
    }
}

/// Everything the session loop reacts to, in delivery order
///
/// Connection lifecycle changes travel on the same queue as messages so they
/// can never overtake or interleave with command handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// The broker accepted the connection (first connect or reconnect)
    Connected { session_present: bool },
    /// The broker refused the connection
    ConnectionRefused(ConnectReturnCode),
    /// The transport dropped; it will retry on its own
    ConnectionLost(String),
    Message(InboundMessage),
}

/// Transport-level connection state tracked by the running session
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Retained payload on `<stat>/availability`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Online,
    Offline,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Online => "online",
            Availability::Offline => "offline",
        }
    }
}
