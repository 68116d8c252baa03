//! bdremoted entry point.
//!
//! Wires together the report transport, the listener acceptor, and the relay
//! worker, then blocks until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML config, defaults when absent
//!  └─ start services
//!       ├─ report transport  (hidraw reader thread, Linux)
//!       ├─ listener acceptor (TCP accept thread)
//!       └─ report relay      (worker thread: session + repeats + fanout)
//! ```

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bdremote_daemon::application::manage_listeners::shared_registry;
use bdremote_daemon::application::relay_reports::spawn_relay_thread;
use bdremote_daemon::infrastructure::net::start_listener_acceptor;
use bdremote_daemon::infrastructure::storage::config::{load_config, DaemonConfig};
use bdremote_daemon::infrastructure::transport::mock::MockReportSource;
use bdremote_daemon::infrastructure::transport::ReportSource;
use bdremote_daemon::shutdown::ShutdownSignal;

#[cfg(target_os = "linux")]
use bdremote_daemon::infrastructure::transport::hidraw::HidrawSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    // Initialise structured logging. `RUST_LOG` wins; otherwise the
    // configured level, raised to debug when the remote's debug flag is set.
    let fallback = if config.remote.debug {
        "debug".to_string()
    } else {
        config.daemon.log_level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();

    info!("bdremoted starting");

    let shutdown = ShutdownSignal::new();
    let registry = shared_registry();

    let (queue, source) = build_report_source(&config)?;

    let acceptor = start_listener_acceptor(
        &config.network.bind_address,
        config.network.listen_port,
        Arc::clone(&registry),
        shutdown.clone(),
    )?;

    let relay = spawn_relay_thread(
        config.remote,
        queue,
        Arc::clone(&registry),
        shutdown.clone(),
    );

    info!(
        "bdremoted ready; broadcasting on {}:{}. Press Ctrl-C to exit.",
        config.network.bind_address, config.network.listen_port
    );

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");

    shutdown.cancel();
    source.stop();
    if relay.join().is_err() {
        error!("relay thread panicked");
    }
    if acceptor.join().is_err() {
        error!("acceptor thread panicked");
    }

    info!("bdremoted stopped");
    Ok(())
}

/// Opens the configured report source, falling back to an empty one so the
/// daemon can serve listeners even without hardware attached.
fn build_report_source(
    config: &DaemonConfig,
) -> anyhow::Result<(Receiver<Vec<u8>>, Box<dyn ReportSource>)> {
    match &config.transport.device {
        Some(device) => open_device_source(device),
        None => {
            warn!("no report device configured; running without a hardware source");
            let source = MockReportSource::new(Vec::new());
            let queue = source.start()?;
            Ok((queue, Box::new(source) as Box<dyn ReportSource>))
        }
    }
}

#[cfg(target_os = "linux")]
fn open_device_source(device: &str) -> anyhow::Result<(Receiver<Vec<u8>>, Box<dyn ReportSource>)> {
    let source = HidrawSource::new(device.to_string());
    let queue = source.start()?;
    info!("report transport reading from {device}");
    Ok((queue, Box::new(source) as Box<dyn ReportSource>))
}

#[cfg(not(target_os = "linux"))]
fn open_device_source(device: &str) -> anyhow::Result<(Receiver<Vec<u8>>, Box<dyn ReportSource>)> {
    anyhow::bail!("HID raw transport requires Linux (device {device} configured)")
}
