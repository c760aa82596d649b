pub mod bridge;
pub mod config;
pub mod device;
pub mod mqtt;

use crate::bridge::BridgeSession;
use crate::config::{BridgeConfig, Cli, FileConfig, LogSettings};
use crate::device::KoradSerial;
use crate::mqtt::{transport, Topics};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// How long the event pump gets to flush the offline message and DISCONNECT
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let cli = Cli::parse();
    let file = FileConfig::discover(cli.config.as_deref())?;
    let config = BridgeConfig::resolve(cli, file, config::prompt_password)?;

    let _log_guard = setup_logging(&config.log)?;

    run(config).await
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

/// Stderr at info (debug with `-v`); with a log file, stderr stays at info and
/// the file gets the configured level.
fn setup_logging(settings: &LogSettings) -> Result<Option<WorkerGuard>> {
    let level = if settings.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let Some(path) = &settings.file else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(level),
            )
            .init();
        return Ok(None);
    };

    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(LevelFilter::INFO),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_filter(level),
        )
        .init();

    Ok(Some(guard))
}

fn spawn_interrupt_watcher(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.cancel(),
            Err(e) => error!("Unable to listen for interrupt signal: {}", e),
        }
    });
}

async fn run(config: BridgeConfig) -> Result<()> {
    let topics = Topics::new(&config.topic_prefix);
    debug!("err topic: {}", topics.err());
    debug!("stat topic: {}", topics.stat());
    debug!("cmnd topic: {}", topics.cmnd());

    info!("Connecting to the power supply");
    let device = KoradSerial::open(&config.device, config.baud_rate, config.channels)
        .inspect_err(|e| error!("{}", e))?;

    let (client, eventloop) = transport::connect(&config.mqtt, &topics);
    let session = BridgeSession::create(Box::new(device), Box::new(client), topics).start()?;

    let shutdown = CancellationToken::new();
    spawn_interrupt_watcher(shutdown.clone());

    info!(
        "Connecting to MQTT on {}:{}",
        config.mqtt.host, config.mqtt.port
    );
    let (event_tx, mut event_rx) = mpsc::channel(transport::EVENT_CAPACITY);
    let mut pump = transport::spawn_event_pump(eventloop, event_tx, config.mqtt.reconnect_delay);

    let result = session
        .run_until_shutdown(&mut event_rx, &shutdown)
        .await
        .shutdown();
    drop(event_rx);

    if tokio::time::timeout(FLUSH_TIMEOUT, &mut pump).await.is_err() {
        warn!("MQTT event loop did not finish in time, aborting it");
        pump.abort();
    }

    match result {
        Ok(_stopped) => Ok(()),
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}
