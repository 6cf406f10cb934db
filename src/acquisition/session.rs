//! # Acquisition Session
//!
//! One continuous run of the pipeline between device init and `Done`.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{DaqError, Result};
use crate::protocol::line_assembler::LineAssembler;
use crate::protocol::record::parse_batch;
use crate::protocol::start_gate::StartGate;
use crate::serial::port_trait::DevicePortIO;
use crate::storage::page_writer::PageWriter;
use crate::storage::table::{SampleTable, TableMode, TableSnapshot, WriteOutcome};

/// Batches between "samples collected" progress notifications
const PROGRESS_INTERVAL_BATCHES: u64 = 20;

/// Serial read buffer size
const READ_BUF_SIZE: usize = 4096;

/// Acquisition loop states.
///
/// `Resetting` is reachable from `Streaming`/`Draining` when a corrupted
/// line boundary defeats even the best-effort write; it loops back to
/// `AwaitingStart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    AwaitingStart,
    Streaming,
    Draining,
    Done,
    Resetting,
}

/// How the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub total_rows: u64,
    pub batches: u64,
    pub cancelled: bool,
}

/// Drives LineAssembler → StartGate → SampleTable → PageWriter once per
/// poll, publishing a fresh table snapshot after every accepted batch.
///
/// The session exclusively owns the device, the table and the page writer;
/// the visualization consumer only ever sees published snapshots.
pub struct AcquisitionSession<P: DevicePortIO> {
    port: P,
    assembler: LineAssembler,
    gate: StartGate,
    table: SampleTable,
    pages: Option<PageWriter>,
    width: usize,
    poll_interval: Duration,
    snapshot_tx: watch::Sender<TableSnapshot>,
    shutdown_rx: watch::Receiver<bool>,
    state: SessionState,
    batches: u64,
}

impl<P: DevicePortIO> AcquisitionSession<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        port: P,
        mode: TableMode,
        width: usize,
        pages: Option<PageWriter>,
        poll_interval: Duration,
        snapshot_tx: watch::Sender<TableSnapshot>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            port,
            assembler: LineAssembler::new(),
            gate: StartGate::new(),
            table: SampleTable::new(mode, width),
            pages,
            width,
            poll_interval,
            snapshot_tx,
            shutdown_rx,
            state: SessionState::Init,
            batches: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run until the bounded target fills or the operator cancels.
    ///
    /// Starts with the device init sequence, then polls the device for at
    /// most the configured poll interval each cycle; an empty poll goes
    /// straight back around, so a chatty device is drained as fast as it
    /// produces.
    ///
    /// # Errors
    ///
    /// Returns `DaqError::Serial` on a transport failure during init or
    /// read; that is fatal, everything else recovers within the session.
    pub async fn run(mut self) -> Result<SessionSummary> {
        self.state = SessionState::Init;
        self.port
            .initialize()
            .await
            .map_err(|e| DaqError::Serial(format!("device init failed: {}", e)))?;
        self.state = SessionState::AwaitingStart;
        let mut buf = vec![0u8; READ_BUF_SIZE];
        let cancelled = loop {
            if *self.shutdown_rx.borrow() {
                break true;
            }
            let n = match timeout(self.poll_interval, self.port.read_chunk(&mut buf)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    return Err(DaqError::Serial(format!("device read failed: {}", e)))
                }
                // Empty poll: nothing buffered yet
                Err(_) => continue,
            };
            if n == 0 {
                continue;
            }
            self.process_chunk(&buf[..n]).await?;
            if self.table.is_full() {
                break false;
            }
        };
        self.drain(cancelled).await
    }

    /// One poll cycle's worth of bytes through the whole pipeline
    async fn process_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let lines = match self.assembler.push_chunk(chunk) {
            Ok(lines) => lines,
            Err(e @ DaqError::Decode(_)) => {
                // Chunk dropped; the stream re-syncs on the next line
                // boundary
                warn!("{}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if lines.is_empty() {
            return Ok(());
        }

        let was_started = self.gate.is_started();
        let accepted = self.gate.filter(lines);
        if accepted.is_empty() {
            return Ok(());
        }
        if !was_started {
            self.state = SessionState::Streaming;
            info!("Start sentinel received, streaming");
        }

        let (records, parse_err) = parse_batch(&accepted, self.width);
        if let Some(e) = parse_err {
            if records.is_empty() {
                // Not one parseable record in a non-empty batch: the line
                // boundary is corrupted beyond local recovery
                warn!("Data Write Error: {}", e);
                return self.reset_session().await;
            }
            warn!(
                "Data Write Error: {} (kept {} of {} records)",
                e,
                records.len(),
                accepted.len()
            );
        }

        let outcome = self.table.write_batch(&records);
        if let WriteOutcome::Truncated { written, dropped } = outcome {
            // Expected on the final batch of a bounded run
            debug!("table truncated batch: wrote {} rows, dropped {}", written, dropped);
        }

        let complete = self.table.is_full();
        if let Some(pages) = self.pages.as_mut() {
            pages.append(&accepted);
            pages.check(complete).await?;
        }

        self.batches += 1;
        if self.batches % PROGRESS_INTERVAL_BATCHES == 0 {
            info!("{} Samples Collected", self.table.total_rows());
        }
        self.publish(false);
        Ok(())
    }

    /// Soft reset to resynchronize after a corrupted line boundary: latch,
    /// counters and buffered text all go back to their session-start state,
    /// the device gets a reset pulse, and already-persisted data stays
    /// where it is.
    async fn reset_session(&mut self) -> Result<()> {
        self.state = SessionState::Resetting;
        self.assembler.reset();
        self.gate.reset();
        self.table.reset();
        self.batches = 0;
        if let Some(pages) = self.pages.as_mut() {
            pages.reset().await?;
        }
        self.port
            .reset_pulse()
            .await
            .map_err(|e| DaqError::Serial(format!("device reset failed: {}", e)))?;
        self.publish(false);
        self.state = SessionState::AwaitingStart;
        info!("Session reset, awaiting start sentinel");
        Ok(())
    }

    /// Final flush and teardown shared by completion and cancellation
    async fn drain(&mut self, cancelled: bool) -> Result<SessionSummary> {
        self.state = SessionState::Draining;
        if cancelled {
            if let Err(e) = self.port.reset_pulse().await {
                warn!("device reset on cancel failed: {}", e);
            }
        }
        if let Some(pages) = self.pages.as_mut() {
            pages.finalize().await?;
        }
        self.state = SessionState::Done;
        self.publish(true);
        info!("Finished Recording");
        Ok(SessionSummary {
            total_rows: self.table.total_rows(),
            batches: self.batches,
            cancelled,
        })
    }

    fn publish(&self, complete: bool) {
        // The consumer may be gone (headless run); that is not an error
        let _ = self.snapshot_tx.send(self.table.snapshot(complete));
    }
}
