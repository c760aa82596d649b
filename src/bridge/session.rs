//! Bridge session with statum state machine for the connection lifecycle
//!
//! # State Machine
//!
//! ```text
//! Idle ──start──► Running ──run_until_shutdown──► Stopping ──shutdown──► Stopped
//! ```
//!
//! While `Running`, broker reconnects are tracked with [`ConnectionState`]:
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected ──► Connecting ──► ...
//!                       │
//!                       └──(credentials rejected)──► Failed
//! ```
//!
//! The session owns the device and the MQTT client for the whole process. All
//! events arrive on one queue and are handled to completion one at a time,
//! including the serial round-trip of each command.

use rumqttc::ConnectReturnCode;
use statum::{machine, state};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::error::BridgeError;
use super::router::CommandRouter;
use super::status::StatusPublisher;
use crate::device::{DeviceError, PowerSupply};
use crate::mqtt::{
    Availability, BridgeEvent, ConnectionState, InboundMessage, MqttError, MqttPublisher, Topics,
};

/// States for the bridge session lifecycle using statum
#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Idle,     // Device open, broker not contacted yet
    Running,  // Consuming broker events
    Stopping, // Loop left, resources still held
    Stopped,  // Device closed, client disconnected
}

/// Why the event loop ended; decides the release sequence and exit status
#[derive(Debug)]
pub enum ExitReason {
    Interrupted,
    AuthenticationRejected(ConnectReturnCode),
    DeviceFailure(DeviceError),
    TransportClosed,
}

/// Single-device MQTT bridge with compile-time lifecycle states
#[machine]
pub struct BridgeSession<S: SessionState> {
    device: Box<dyn PowerSupply>,
    mqtt: Box<dyn MqttPublisher>,
    topics: Topics,
    connection: ConnectionState,
    ever_connected: bool,
    /// `None` until the event loop has ended
    exit_reason: Option<ExitReason>,
}

impl<S: SessionState> BridgeSession<S> {
    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    fn status_publisher(&self) -> StatusPublisher<'_> {
        StatusPublisher::new(self.mqtt.as_ref(), &self.topics)
    }
}

fn is_auth_failure(code: ConnectReturnCode) -> bool {
    matches!(
        code,
        ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized
    )
}

impl BridgeSession<Idle> {
    pub fn create(
        device: Box<dyn PowerSupply>,
        mqtt: Box<dyn MqttPublisher>,
        topics: Topics,
    ) -> Self {
        debug!("Creating bridge session: {}", topics);
        Self::new(
            device,
            mqtt,
            topics,
            ConnectionState::Disconnected,
            false,
            None,
        )
    }

    /// Logs what is on the other end of the serial line and starts running
    ///
    /// A device that cannot answer here is closed again and reported.
    pub fn start(mut self) -> Result<BridgeSession<Running>, BridgeError> {
        let probe = self
            .device
            .model()
            .and_then(|model| self.device.status().map(|status| (model, status)));

        match probe {
            Ok((model, status)) => {
                info!("Power supply model: {}", model);
                info!("Power supply status: {}", status);
                self.connection = ConnectionState::Connecting;
                Ok(self.transition())
            }
            Err(e) => {
                error!("Power supply did not answer: {}", e);
                if let Err(close_err) = self.device.close() {
                    warn!("Closing power supply failed: {}", close_err);
                }
                Err(e.into())
            }
        }
    }
}

impl BridgeSession<Running> {
    /// Main event loop
    ///
    /// Runs until the shutdown token fires or a fatal event arrives. Shutdown
    /// takes priority over queued events; a command already running finishes
    /// first.
    pub async fn run_until_shutdown(
        mut self,
        events: &mut mpsc::Receiver<BridgeEvent>,
        shutdown: &CancellationToken,
    ) -> BridgeSession<Stopping> {
        info!("Bridge running, waiting for broker events");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("^C received. Stopping");
                    self.exit_reason = Some(ExitReason::Interrupted);
                    break;
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        error!("MQTT event queue closed");
                        self.exit_reason = Some(ExitReason::TransportClosed);
                        break;
                    };
                    if let Some(reason) = self.handle_event(event) {
                        self.exit_reason = Some(reason);
                        break;
                    }
                }
            }
        }

        debug!("Leaving event loop: {:?}", self.exit_reason);
        self.transition()
    }

    /// Handles one event; `Some` ends the loop
    fn handle_event(&mut self, event: BridgeEvent) -> Option<ExitReason> {
        match event {
            BridgeEvent::Connected { session_present } => {
                info!("MQTT connected (session present: {})", session_present);
                self.connection = ConnectionState::Connected;
                self.ever_connected = true;
                if let Err(e) = self.on_connect() {
                    warn!("Failed to announce availability: {}", e);
                }
                None
            }
            BridgeEvent::ConnectionRefused(code) if is_auth_failure(code) => {
                error!("Incorrect MQTT login credentials ({:?})", code);
                self.connection = ConnectionState::Failed;
                Some(ExitReason::AuthenticationRejected(code))
            }
            BridgeEvent::ConnectionRefused(code) => {
                warn!("MQTT connection refused: {:?}", code);
                self.connection = ConnectionState::Connecting;
                None
            }
            BridgeEvent::ConnectionLost(reason) => {
                if self.connection == ConnectionState::Connected {
                    warn!("MQTT connection lost: {}", reason);
                }
                self.connection = ConnectionState::Connecting;
                None
            }
            BridgeEvent::Message(message) => self.handle_message(message),
        }
    }

    /// Runs on every successful connect, reconnects included: broker-side
    /// subscriptions are not assumed to survive.
    fn on_connect(&self) -> Result<(), MqttError> {
        self.status_publisher()
            .publish_availability(Availability::Online)?;

        let filter = self.topics.command_filter();
        debug!("Subscribing to {}", filter);
        self.mqtt.subscribe(&filter)
    }

    fn handle_message(&mut self, message: InboundMessage) -> Option<ExitReason> {
        debug!("{}", message);

        let Some(name) = self.topics.command_name(&message.topic) else {
            trace!("Not a command topic: {}", message.topic);
            return None;
        };

        let mut router = CommandRouter::new(self.device.as_mut(), self.mqtt.as_ref(), &self.topics);
        match router.dispatch(name, &message.payload) {
            Ok(dispatch) => {
                trace!("{} -> {:?}", message.topic, dispatch);
                None
            }
            Err(BridgeError::Device(e)) => {
                error!("Power supply failure while handling {}: {}", message.topic, e);
                Some(ExitReason::DeviceFailure(e))
            }
            Err(e) => {
                warn!("Failed to handle {}: {}", message.topic, e);
                None
            }
        }
    }
}

impl BridgeSession<Stopping> {
    /// Releases both owned resources, best effort
    ///
    /// Order: retained `offline`, MQTT disconnect, device close. Offline is only
    /// announced when the broker accepted us at some point and did not reject
    /// us at the end. Returns an error when the loop ended for a fatal reason.
    pub fn shutdown(mut self) -> Result<BridgeSession<Stopped>, BridgeError> {
        info!("Shutting down bridge");

        let rejected = matches!(self.exit_reason, Some(ExitReason::AuthenticationRejected(_)));
        if self.ever_connected && !rejected {
            if let Err(e) = self
                .status_publisher()
                .publish_availability(Availability::Offline)
            {
                warn!("Failed to announce offline availability: {}", e);
            }
        }

        if let Err(e) = self.mqtt.disconnect() {
            warn!("MQTT disconnect failed: {}", e);
        }

        if let Err(e) = self.device.close() {
            warn!("Closing power supply failed: {}", e);
        }
        self.connection = ConnectionState::Disconnected;

        match self.exit_reason.take() {
            Some(ExitReason::Interrupted) | None => {
                info!("Bridge stopped");
                Ok(self.transition())
            }
            Some(ExitReason::AuthenticationRejected(code)) => {
                Err(BridgeError::AuthenticationRejected(code))
            }
            Some(ExitReason::DeviceFailure(e)) => Err(BridgeError::Device(e)),
            Some(ExitReason::TransportClosed) => Err(BridgeError::TransportClosed),
        }
    }
}

impl BridgeSession<Stopped> {}
