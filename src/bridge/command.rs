//! Command names and payload parsing

use std::fmt;

use super::error::CommandError;
use crate::device::OnOffState;

/// The closed set of command names this bridge answers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Output,
    Status,
    Voltage,
    Current,
}

/// Topic suffix after `cmnd/` -> command
const COMMAND_TABLE: &[(&str, CommandKind)] = &[
    ("output", CommandKind::Output),
    ("status", CommandKind::Status),
    ("voltage", CommandKind::Voltage),
    ("current", CommandKind::Current),
];

impl CommandKind {
    /// Looks up a command name; `None` means the topic is not ours
    pub fn from_name(name: &str) -> Option<Self> {
        COMMAND_TABLE
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, kind)| *kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Output => "output",
            CommandKind::Status => "status",
            CommandKind::Voltage => "voltage",
            CommandKind::Current => "current",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload of an `output` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRequest {
    On,
    Off,
    /// `?` or empty: report only
    Query,
}

impl OutputRequest {
    pub fn parse(payload: &str) -> Result<Self, CommandError> {
        match payload {
            "on" => Ok(OutputRequest::On),
            "off" => Ok(OutputRequest::Off),
            "?" | "" => Ok(OutputRequest::Query),
            other => Err(CommandError::UnknownOutput(other.to_string())),
        }
    }

    /// State to write to the device, if any
    pub fn target(&self) -> Option<OnOffState> {
        match self {
            OutputRequest::On => Some(OnOffState::On),
            OutputRequest::Off => Some(OnOffState::Off),
            OutputRequest::Query => None,
        }
    }
}

/// A validated command, ready to run against the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Output(OutputRequest),
    Status,
    Voltage(f64),
    Current(f64),
}

impl Command {
    pub fn parse(kind: CommandKind, payload: &[u8]) -> Result<Self, CommandError> {
        // status ignores its payload entirely
        if kind == CommandKind::Status {
            return Ok(Command::Status);
        }

        let text = std::str::from_utf8(payload)
            .map_err(|_| CommandError::NotUtf8(String::from_utf8_lossy(payload).into_owned()))?;

        match kind {
            CommandKind::Output => OutputRequest::parse(text).map(Command::Output),
            CommandKind::Voltage => parse_decimal("voltage", text).map(Command::Voltage),
            CommandKind::Current => parse_decimal("current", text).map(Command::Current),
            CommandKind::Status => Ok(Command::Status),
        }
    }
}

/// Dot-decimal, locale independent. Surrounding whitespace is tolerated.
fn parse_decimal(quantity: &'static str, text: &str) -> Result<f64, CommandError> {
    let value = text
        .trim()
        .parse::<f64>()
        .map_err(|source| CommandError::InvalidNumber {
            quantity,
            value: text.to_string(),
            source,
        })?;

    if !value.is_finite() {
        return Err(CommandError::NotFinite {
            quantity,
            value: text.to_string(),
        });
    }
    Ok(value)
}
