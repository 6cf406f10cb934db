//! # Visualization Module
//!
//! Turns published table snapshots into scrolling-window render frames.
//!
//! This module handles:
//! - The layout derived from the plot configuration (channel groups and
//!   y ranges)
//! - Building per-group channel series over the visible time window
//! - The redraw loop on its own cadence, concurrent with acquisition
//! - The one-shot final axis fit once acquisition completes
//!
//! The actual plotting surface is a downstream collaborator behind
//! [`RenderSurface`]; this crate only prepares what to draw.

use std::ops::Range;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::debug;

use crate::config::PlotConfig;
use crate::protocol::record::META_FIELDS;
use crate::storage::table::TableSnapshot;

/// Per-group channel series prepared for a rendering surface
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFrame {
    /// Channel indices drawn on this subplot
    pub channels: Vec<usize>,

    /// Visible time range in milliseconds
    pub x_range: (f64, f64),

    /// Configured y-axis range for this subplot
    pub y_range: (f64, f64),

    /// One polyline per channel: (time_ms, value) points over the window
    pub series: Vec<Vec<(f64, f64)>>,
}

/// Everything a surface needs for one redraw
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub groups: Vec<GroupFrame>,

    /// Terminal axis-fit pass after acquisition completes
    pub finalized: bool,

    pub total_rows: u64,
}

/// Somewhere to hand each prepared frame
pub trait RenderSurface: Send {
    fn render(&mut self, frame: &RenderFrame);
}

/// Surface that reports frame summaries to the log, standing in for a real
/// plotting backend
pub struct TracingSurface;

impl RenderSurface for TracingSurface {
    fn render(&mut self, frame: &RenderFrame) {
        for (index, group) in frame.groups.iter().enumerate() {
            debug!(
                "plot group {}: channels {:?}, x {:.0}..{:.0} ms, {} points",
                index,
                group.channels,
                group.x_range.0,
                group.x_range.1,
                group.series.first().map_or(0, Vec::len)
            );
        }
        if frame.finalized {
            debug!("final frame: {} samples total", frame.total_rows);
        }
    }
}

/// Scrolling-window layout derived from the plot configuration
#[derive(Debug, Clone)]
pub struct PlotLayout {
    groups: Vec<Vec<usize>>,
    ranges: Vec<(f64, f64)>,
    window_ms: f64,
}

impl PlotLayout {
    pub fn new(groups: Vec<Vec<usize>>, ranges: Vec<(f64, f64)>, window_ms: f64) -> Self {
        Self {
            groups,
            ranges,
            window_ms,
        }
    }

    pub fn from_config(plot: &PlotConfig) -> Self {
        Self::new(
            plot.groups.clone(),
            plot.ranges.iter().map(|r| (r[0], r[1])).collect(),
            plot.window_ms as f64,
        )
    }

    /// Build one frame from a snapshot.
    ///
    /// Bounded tables scroll: the x window covers the trailing `window_ms`
    /// of collected time, or the whole run once finalized. Ring tables
    /// always show the full sliding window.
    pub fn build_frame(&self, snap: &TableSnapshot) -> RenderFrame {
        let (x_range, rows) = self.visible_rows(snap);
        let groups = self
            .groups
            .iter()
            .zip(&self.ranges)
            .map(|(channels, &y_range)| GroupFrame {
                channels: channels.clone(),
                x_range,
                y_range,
                series: channels
                    .iter()
                    .map(|&channel| {
                        rows.clone()
                            .map(|i| (snap.time_ms(i), snap.row(i)[META_FIELDS + channel]))
                            .collect()
                    })
                    .collect(),
            })
            .collect();
        RenderFrame {
            groups,
            finalized: snap.complete,
            total_rows: snap.total_rows,
        }
    }

    /// The row range and x range currently on screen
    fn visible_rows(&self, snap: &TableSnapshot) -> ((f64, f64), Range<usize>) {
        let valid = snap.valid_range();
        if valid.is_empty() {
            return ((0.0, self.window_ms), valid);
        }
        let t_first = snap.time_ms(valid.start);
        let t_last = snap.time_ms(valid.end - 1);
        if snap.ring {
            // The ring is itself a sliding window; show all of it
            return ((t_first, t_last), valid);
        }
        if snap.complete || t_last < self.window_ms {
            // Final fit, or the run has not yet outgrown the window
            return ((0.0, t_last), valid);
        }
        // Scroll: the first row newer than the cutoff leads the view
        let cutoff = t_last - self.window_ms;
        let start = valid
            .clone()
            .find(|&i| snap.time_ms(i) > cutoff)
            .unwrap_or(valid.start);
        ((snap.time_ms(start), t_last), start..valid.end)
    }
}

/// Redraws on a fixed cadence until the producer publishes a terminal
/// snapshot, then renders the one-shot final fit and stops.
pub struct VisualizationLoop<S: RenderSurface> {
    snapshot_rx: watch::Receiver<TableSnapshot>,
    layout: PlotLayout,
    surface: S,
    refresh: Duration,
}

impl<S: RenderSurface> VisualizationLoop<S> {
    pub fn new(
        snapshot_rx: watch::Receiver<TableSnapshot>,
        layout: PlotLayout,
        surface: S,
        refresh: Duration,
    ) -> Self {
        Self {
            snapshot_rx,
            layout,
            surface,
            refresh,
        }
    }

    /// Returns the surface so callers can inspect what was drawn
    pub async fn run(mut self) -> S {
        let mut ticker = interval(self.refresh);
        loop {
            ticker.tick().await;
            let snap = self.snapshot_rx.borrow().clone();
            if !snap.is_empty() || snap.complete {
                let frame = self.layout.build_frame(&snap);
                self.surface.render(&frame);
            }
            if snap.complete {
                break;
            }
            if self.snapshot_rx.has_changed().is_err() {
                // Producer is gone without a terminal snapshot; nothing
                // more will arrive
                break;
            }
        }
        self.surface
    }
}
