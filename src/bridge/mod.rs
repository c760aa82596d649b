//! # Bridge Core
//!
//! Maps MQTT command topics onto power supply operations and device state
//! back onto status topics.
//!
//! ```text
//! bridge/
//! ├── command.rs  - command name table and payload parsing
//! ├── router.rs   - CommandRouter: command -> device call + publications
//! ├── status.rs   - StatusPublisher: device state -> stat/err topics
//! ├── session.rs  - BridgeSession: connection lifecycle state machine
//! └── error.rs    - CommandError, BridgeError
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! BridgeEvent::Message ──► BridgeSession ──► CommandRouter ──► PowerSupply
//!                                                 │
//!                                                 ▼
//!                                          StatusPublisher ──► <prefix>/stat/*, <prefix>/err
//! ```
//!
//! Availability is published by the session itself at connect and shutdown.

pub mod command;
pub mod error;
pub mod router;
pub mod session;
pub mod status;

pub use error::{BridgeError, CommandError};
pub use session::{BridgeSession, ExitReason};
