//! # Serial DAQ
//!
//! Streams CSV telemetry from a serial-attached microcontroller, records it
//! to rotating text files, and feeds a live scrolling-plot consumer.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber
//!    - Load configuration (argv path or `config/default.toml`)
//!    - Open the device and run the init sequence (reset pulse, buffer
//!      clear, start byte)
//!
//! 2. **Main Loop**
//!    - The acquisition task polls the device, assembles lines, gates on
//!      the start sentinel, fills the sample table and paginates the raw
//!      text to disk
//!    - The visualization task redraws the scrolling window from published
//!      snapshots on its own cadence
//!    - Ctrl+C cancels gracefully at the next poll boundary
//!
//! 3. **Shutdown**
//!    - Device reset pulse on cancellation
//!    - Final flush and file close in bounded mode
//!    - One-shot final axis fit on the last snapshot

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use serial_daq::acquisition::session::AcquisitionSession;
use serial_daq::config::Config;
use serial_daq::serial::DaqSerial;
use serial_daq::storage::page_writer::PageWriter;
use serial_daq::storage::table::{TableMode, TableSnapshot};
use serial_daq::viz::{PlotLayout, TracingSurface, VisualizationLoop};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Serial DAQ v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    let device = DaqSerial::open(
        &config.serial.port,
        config.serial.baud_rate,
        Duration::from_millis(config.serial.timeout_ms),
    )
    .context("failed to open DAQ device")?;

    let width = config.acquisition.record_width();
    let mode = config.acquisition.table_mode();
    let pages = match mode {
        TableMode::Bounded { target } => {
            info!("Recording {} samples, {} per page", target, config.storage.max_page_points);
            Some(
                PageWriter::open(&config.storage.data_dir, config.storage.max_page_points)
                    .await
                    .context("failed to open data file")?,
            )
        }
        TableMode::Ring { capacity } => {
            info!("Streaming over a {}-row window, nothing persisted", capacity);
            None
        }
    };

    let (snapshot_tx, snapshot_rx) = watch::channel(TableSnapshot::empty(width));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let session = AcquisitionSession::new(
        device,
        mode,
        width,
        pages,
        Duration::from_millis(config.serial.poll_interval_ms),
        snapshot_tx,
        shutdown_rx,
    );
    let viz = VisualizationLoop::new(
        snapshot_rx,
        PlotLayout::from_config(&config.plot),
        TracingSurface,
        Duration::from_millis(config.plot.refresh_ms),
    );

    let mut acquisition = tokio::spawn(session.run());
    let viz_task = tokio::spawn(viz.run());

    info!("Press Ctrl+C to stop");

    let summary = tokio::select! {
        res = &mut acquisition => res.context("acquisition task panicked")??,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            let _ = shutdown_tx.send(true);
            acquisition.await.context("acquisition task panicked")??
        }
    };

    if let Err(e) = viz_task.await {
        warn!("visualization task ended abnormally: {}", e);
    }

    info!(
        "Collected {} samples in {} batches{}",
        summary.total_rows,
        summary.batches,
        if summary.cancelled { " (cancelled)" } else { "" }
    );

    Ok(())
}
