//! # MQTT Integration Module
//!
//! Pub/sub plumbing between the bridge core and the broker.
//!
//! ```text
//! mqtt/
//! ├── topics.rs     - topic tree derived from the configured prefix
//! ├── message.rs    - events delivered to the session, availability payloads
//! ├── publisher.rs  - outbound request trait over the rumqttc client
//! └── transport.rs  - options, last will and the event pump task
//! ```
//!
//! ## Flow
//!
//! ```text
//! Broker ──► EventLoop ──► event pump ──[BridgeEvent]──► BridgeSession
//!   ▲                                                      │
//!   └──────────── AsyncClient (try_publish/subscribe) ◄────┘
//! ```
//!
//! The session is the single consumer of the event queue, so inbound
//! commands are handled strictly one after another.

pub mod message;
pub mod publisher;
pub mod topics;
pub mod transport;

pub use message::{Availability, BridgeEvent, ConnectionState, InboundMessage};
pub use publisher::{MqttError, MqttPublisher};
pub use topics::Topics;
