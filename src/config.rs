//! Startup configuration
//!
//! Settings are merged once, in this order of precedence:
//!
//! 1. command line flags
//! 2. environment (`KORADSERIAL_MQTT_USERNAME`, `KORADSERIAL_MQTT_PASSWORD`)
//! 3. TOML config file (`--config`, or `<config_dir>/korad-mqtt/config.toml`)
//! 4. built-in defaults
//!
//! A password prompt is only shown when a username is known but no password.

use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::device::korad::DEFAULT_BAUD_RATE;

pub const USERNAME_ENV: &str = "KORADSERIAL_MQTT_USERNAME";
pub const PASSWORD_ENV: &str = "KORADSERIAL_MQTT_PASSWORD";

const DEFAULT_HOSTNAME: &str = "localhost";
const DEFAULT_PORT: u16 = 1883;
const DEFAULT_TOPIC: &str = "lab/KORAD";
const DEFAULT_CLIENT_ID: &str = "korad-mqtt";
const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

/// Bridge a KORAD bench power supply to an MQTT broker.
#[derive(Parser, Debug, Default)]
#[command(name = "korad-mqtt", version, disable_help_flag = true)]
pub struct Cli {
    /// Show this help message and exit
    #[arg(short = 'H', long, action = ArgAction::Help)]
    help: Option<bool>,

    /// MQTT broker host [default: localhost]
    #[arg(short = 'h', long)]
    pub hostname: Option<String>,

    /// MQTT broker port [default: 1883]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// MQTT topic prefix [default: lab/KORAD]
    #[arg(short, long)]
    pub topic: Option<String>,

    /// MQTT username (anonymous login if unset)
    #[arg(short, long, env = USERNAME_ENV)]
    pub username: Option<String>,

    /// MQTT password (prompted for if a username is set but no password)
    #[arg(short = 'P', long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: Option<String>,

    /// MQTT client identifier [default: korad-mqtt]
    #[arg(long)]
    pub client_id: Option<String>,

    /// MQTT keep-alive interval in seconds [default: 60]
    #[arg(long, value_name = "SECS")]
    pub keep_alive: Option<u64>,

    /// Delay before reconnecting after a broker connection error [default: 5]
    #[arg(long, value_name = "SECS")]
    pub reconnect_delay: Option<u64>,

    /// Serial baud rate [default: 9600]
    #[arg(long)]
    pub baud_rate: Option<u32>,

    /// Number of output channels on the supply [default: 1]
    #[arg(long)]
    pub channels: Option<usize>,

    /// Log debug level messages
    #[arg(short, long)]
    pub verbose: bool,

    /// File to write the log to (stderr keeps info level)
    #[arg(long)]
    pub logfile: Option<PathBuf>,

    /// Config file [default: <config dir>/korad-mqtt/config.toml]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serial port the power supply is attached to
    pub device: Option<String>,
}

/// Contents of the optional TOML config file; every key may be omitted
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub device: Option<String>,
    pub baud_rate: Option<u32>,
    pub channels: Option<usize>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub topic: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub reconnect_delay_secs: Option<u64>,
    pub verbose: Option<bool>,
    pub logfile: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the explicit file if given (it must exist), otherwise the default
    /// location if a file is there.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!("Loading config file {}", path.display());
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.is_file() => {
                debug!("Loading config file {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("korad-mqtt").join("config.toml"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No serial device given (positional DEVICE or `device` in the config file)")]
    MissingDevice,

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to read password: {0}")]
    Prompt(#[source] io::Error),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the MQTT transport needs to connect
#[derive(Debug, Clone, PartialEq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub verbose: bool,
    pub file: Option<PathBuf>,
}

/// Fully resolved, immutable process configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub device: String,
    pub baud_rate: u32,
    pub channels: usize,
    pub topic_prefix: String,
    pub mqtt: MqttSettings,
    pub log: LogSettings,
}

impl BridgeConfig {
    /// Merges command line and file settings
    ///
    /// `prompt` is asked for a password when a username has none.
    pub fn resolve<F>(cli: Cli, file: FileConfig, prompt: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(&str) -> io::Result<String>,
    {
        let device = cli
            .device
            .or(file.device)
            .ok_or(ConfigError::MissingDevice)?;

        let topic_prefix = cli
            .topic
            .or(file.topic)
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string())
            .trim_end_matches('/')
            .to_string();
        if topic_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "topic",
                reason: "prefix must not be empty".to_string(),
            });
        }

        let keep_alive_secs = cli
            .keep_alive
            .or(file.keep_alive_secs)
            .unwrap_or(DEFAULT_KEEP_ALIVE_SECS);
        if keep_alive_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "keep_alive",
                reason: "must be at least one second".to_string(),
            });
        }

        let channels = cli.channels.or(file.channels).unwrap_or(1);
        if channels == 0 {
            return Err(ConfigError::Invalid {
                field: "channels",
                reason: "a supply has at least one channel".to_string(),
            });
        }

        let credentials = match cli.username.or(file.username) {
            Some(username) => {
                let password = match cli.password.or(file.password) {
                    Some(password) => password,
                    None => prompt(&username).map_err(ConfigError::Prompt)?,
                };
                Some(Credentials { username, password })
            }
            None => None,
        };

        Ok(Self {
            device,
            baud_rate: cli.baud_rate.or(file.baud_rate).unwrap_or(DEFAULT_BAUD_RATE),
            channels,
            topic_prefix,
            mqtt: MqttSettings {
                host: cli
                    .hostname
                    .or(file.hostname)
                    .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
                port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
                client_id: cli
                    .client_id
                    .or(file.client_id)
                    .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
                keep_alive: Duration::from_secs(keep_alive_secs),
                reconnect_delay: Duration::from_secs(
                    cli.reconnect_delay
                        .or(file.reconnect_delay_secs)
                        .unwrap_or(DEFAULT_RECONNECT_DELAY_SECS),
                ),
                credentials,
            },
            log: LogSettings {
                verbose: cli.verbose || file.verbose.unwrap_or(false),
                file: cli.logfile.or(file.logfile),
            },
        })
    }
}

/// Interactive password prompt without echo
pub fn prompt_password(username: &str) -> io::Result<String> {
    rpassword::prompt_password(format!("MQTT password for {}: ", username))
}
