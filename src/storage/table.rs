//! # Sample Table
//!
//! Fixed-shape numeric buffer between the acquisition loop and the
//! visualization consumer.

use std::ops::Range;
use std::sync::Arc;

use crate::protocol::record::SampleRecord;

/// Write discipline, fixed at construction by the presence or absence of a
/// configured sample target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    /// Fill to `target` rows, then stop acquiring
    Bounded { target: usize },

    /// Sliding window over the most recent `capacity` rows; acquisition
    /// never stops
    Ring { capacity: usize },
}

impl TableMode {
    /// Allocated row count for this mode
    pub fn rows(&self) -> usize {
        match *self {
            TableMode::Bounded { target } => target,
            TableMode::Ring { capacity } => capacity,
        }
    }
}

/// Outcome of one batch write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Every record landed
    Written { rows: usize },

    /// Only a prefix fit (expected on the final batch of a bounded run, or
    /// when a ring batch exceeds the table capacity)
    Truncated { written: usize, dropped: usize },
}

/// Fixed-shape `(rows × width)` buffer of `f64` samples.
///
/// Rows beyond the valid region stay zero-filled; `valid_rows` tracks how
/// many rows hold real samples so consumers never have to tell padding from
/// genuine zero readings by value.
pub struct SampleTable {
    mode: TableMode,
    width: usize,
    data: Vec<f64>,
    cursor: usize,
    valid: usize,
    total_rows: u64,
}

impl SampleTable {
    pub fn new(mode: TableMode, width: usize) -> Self {
        Self {
            mode,
            width,
            data: vec![0.0; mode.rows() * width],
            cursor: 0,
            valid: 0,
            total_rows: 0,
        }
    }

    pub fn mode(&self) -> TableMode {
        self.mode
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rows(&self) -> usize {
        self.mode.rows()
    }

    /// Next row to write (`k`). Pinned back to 0 in ring mode after every
    /// batch.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rows currently holding real samples
    pub fn valid_rows(&self) -> usize {
        self.valid
    }

    /// Cumulative rows accepted this session (survives ring wrap-around)
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Bounded table has reached its target; never true in ring mode
    pub fn is_full(&self) -> bool {
        matches!(self.mode, TableMode::Bounded { target } if self.cursor >= target)
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.width..(index + 1) * self.width]
    }

    fn write_row(&mut self, index: usize, record: &SampleRecord) {
        self.data[index * self.width..(index + 1) * self.width].copy_from_slice(&record.fields);
    }

    /// Apply one accepted batch under the table's write discipline.
    ///
    /// Bounded: the batch lands at `[cursor, cursor + len)`; an overflowing
    /// tail is truncated. Ring: the valid window shifts left by the batch
    /// length, the batch lands at the tail, and the cursor resets to 0. A
    /// ring batch larger than the capacity keeps only its most recent
    /// `capacity` records.
    pub fn write_batch(&mut self, batch: &[SampleRecord]) -> WriteOutcome {
        match self.mode {
            TableMode::Bounded { target } => {
                let room = target - self.cursor;
                let take = batch.len().min(room);
                for (offset, record) in batch[..take].iter().enumerate() {
                    self.write_row(self.cursor + offset, record);
                }
                self.cursor += take;
                self.valid = self.cursor;
                self.total_rows += take as u64;
                if take < batch.len() {
                    WriteOutcome::Truncated {
                        written: take,
                        dropped: batch.len() - take,
                    }
                } else {
                    WriteOutcome::Written { rows: take }
                }
            }
            TableMode::Ring { capacity } => {
                let take = batch.len().min(capacity);
                let tail = &batch[batch.len() - take..];
                if take < capacity {
                    // Drop the oldest `take` rows off the front
                    self.data.copy_within(take * self.width.., 0);
                }
                let base = capacity - take;
                for (offset, record) in tail.iter().enumerate() {
                    self.write_row(base + offset, record);
                }
                self.cursor = 0;
                self.valid = (self.valid + batch.len()).min(capacity);
                self.total_rows += batch.len() as u64;
                if take < batch.len() {
                    WriteOutcome::Truncated {
                        written: take,
                        dropped: batch.len() - take,
                    }
                } else {
                    WriteOutcome::Written { rows: take }
                }
            }
        }
    }

    /// Zero the buffer and all counters (session reset)
    pub fn reset(&mut self) {
        self.data.fill(0.0);
        self.cursor = 0;
        self.valid = 0;
        self.total_rows = 0;
    }

    /// Publish an immutable copy for the visualization consumer
    pub fn snapshot(&self, complete: bool) -> TableSnapshot {
        TableSnapshot {
            data: Arc::from(self.data.as_slice()),
            width: self.width,
            rows: self.rows(),
            cursor: self.cursor,
            valid: self.valid,
            ring: matches!(self.mode, TableMode::Ring { .. }),
            total_rows: self.total_rows,
            complete,
        }
    }
}

/// Immutable view of the table at one instant.
///
/// Published through a watch channel after every poll cycle; the consumer
/// may observe a stale snapshot but never a torn one.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    pub data: Arc<[f64]>,
    pub width: usize,
    pub rows: usize,
    pub cursor: usize,
    pub valid: usize,
    pub ring: bool,
    pub total_rows: u64,
    /// Terminal snapshot: acquisition finished or was cancelled
    pub complete: bool,
}

impl TableSnapshot {
    /// Placeholder published before the first batch lands
    pub fn empty(width: usize) -> Self {
        Self {
            data: Vec::new().into(),
            width,
            rows: 0,
            cursor: 0,
            valid: 0,
            ring: false,
            total_rows: 0,
            complete: false,
        }
    }

    /// Index range of rows holding real samples.
    ///
    /// Bounded tables fill from the front; ring tables fill from the tail,
    /// zero padding draining off the front as real rows shift in.
    pub fn valid_range(&self) -> Range<usize> {
        if self.ring {
            self.rows - self.valid..self.rows
        } else {
            0..self.valid
        }
    }

    pub fn is_empty(&self) -> bool {
        self.valid == 0
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.width..(index + 1) * self.width]
    }

    /// Elapsed-time column (field 1) of one row
    pub fn time_ms(&self, index: usize) -> f64 {
        self.data[index * self.width + 1]
    }
}
