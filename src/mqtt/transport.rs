//! rumqttc wiring: connection options and the event pump task
//!
//! The pump is the only code that polls the rumqttc `EventLoop`. It turns
//! broker traffic into [`BridgeEvent`]s on a bounded channel and keeps polling
//! across connection errors, which is what makes rumqttc reconnect.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, LastWill, MqttOptions,
    Outgoing, Packet, QoS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::message::{Availability, BridgeEvent, InboundMessage};
use super::topics::Topics;
use crate::config::MqttSettings;

/// Capacity of the client request queue
pub const REQUEST_CAPACITY: usize = 64;

/// Capacity of the pump -> session event queue
pub const EVENT_CAPACITY: usize = 64;

/// Builds client options with the retained `offline` last will already set,
/// so an unclean drop is visible without our cooperation.
pub fn build_options(settings: &MqttSettings, topics: &Topics) -> MqttOptions {
    let mut options = MqttOptions::new(
        settings.client_id.clone(),
        settings.host.clone(),
        settings.port,
    );
    options.set_keep_alive(settings.keep_alive);

    if let Some(credentials) = &settings.credentials {
        options.set_credentials(
            credentials.username.clone(),
            credentials.password.clone(),
        );
    }

    options.set_last_will(LastWill::new(
        topics.availability(),
        Availability::Offline.as_str(),
        QoS::AtMostOnce,
        true,
    ));

    options
}

/// Creates the client and its event loop. Nothing touches the network until
/// the event loop is first polled.
pub fn connect(settings: &MqttSettings, topics: &Topics) -> (AsyncClient, EventLoop) {
    AsyncClient::new(build_options(settings, topics), REQUEST_CAPACITY)
}

/// rumqttc only yields accepted CONNACKs here; refusals come back from
/// `poll()` as [`ConnectionError::ConnectionRefused`].
fn translate(event: Event) -> Option<BridgeEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => Some(BridgeEvent::Connected {
            session_present: ack.session_present,
        }),
        Event::Incoming(Packet::Publish(publish)) => Some(BridgeEvent::Message(
            InboundMessage::new(publish.topic, publish.payload.to_vec()),
        )),
        other => {
            trace!("MQTT event: {:?}", other);
            None
        }
    }
}

fn translate_error(err: ConnectionError) -> BridgeEvent {
    match err {
        ConnectionError::ConnectionRefused(code) => BridgeEvent::ConnectionRefused(code),
        other => {
            warn!("MQTT connection error: {}", other);
            BridgeEvent::ConnectionLost(other.to_string())
        }
    }
}

/// Spawns the task that drives the rumqttc event loop
///
/// Stops once the outgoing DISCONNECT has been written, or when a connection
/// error occurs after the session side has hung up.
pub fn spawn_event_pump(
    mut eventloop: EventLoop,
    events: mpsc::Sender<BridgeEvent>,
    reconnect_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("DISCONNECT sent, stopping event pump");
                    break;
                }
                Ok(event) => {
                    if let Some(event) = translate(event) {
                        if events.send(event).await.is_err() {
                            trace!("Session gone, dropping event");
                        }
                    }
                }
                Err(err) => {
                    if events.send(translate_error(err)).await.is_err() {
                        debug!("Session gone, stopping event pump");
                        break;
                    }
                    tokio::time::sleep(reconnect_delay).await;
                }
            }
        }
    })
}
