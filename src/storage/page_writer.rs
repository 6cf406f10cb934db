//! # Page Writer
//!
//! Paginated persistence of the raw CSV text, exactly as received.
//!
//! This module handles:
//! - Accumulating accepted raw lines between flushes
//! - Flushing on page-boundary, completion and durability triggers
//! - Rotating to a fresh timestamp-named file when a page fills

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::Result;

/// Pending-line count that forces a flush regardless of the configured page
/// size, bounding data loss on ungraceful termination to about this many
/// lines
const FLUSH_LINE_THRESHOLD: usize = 100;

/// Accumulates accepted raw lines and writes them out page by page.
///
/// A page is at most `max_page_points` lines; when pending text would
/// overfill the current page, the fitting prefix is written, the file is
/// closed and a new one with a fresh timestamp is opened. Flush and rotation
/// are evaluated once per poll cycle, after the batch has been written into
/// the sample table, never mid-batch.
pub struct PageWriter {
    dir: PathBuf,
    max_page_points: usize,
    file: File,
    file_path: PathBuf,
    pending: Vec<String>,
    /// Lines already flushed into the current file
    page_lines: usize,
    pages_opened: u32,
}

impl PageWriter {
    /// Create the data directory if needed and open the first page file.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or the file cannot
    /// be opened.
    pub async fn open(dir: impl AsRef<Path>, max_page_points: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        let (file, file_path) = Self::open_page(&dir, 1).await?;
        info!("Recording to {}", file_path.display());
        Ok(Self {
            dir,
            max_page_points,
            file,
            file_path,
            pending: Vec::new(),
            page_lines: 0,
            pages_opened: 1,
        })
    }

    fn page_path(dir: &Path, seq: u32) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3f");
        dir.join(format!("daq_{stamp}_{seq:03}.txt"))
    }

    async fn open_page(dir: &Path, seq: u32) -> Result<(File, PathBuf)> {
        let path = Self::page_path(dir, seq);
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await?;
        Ok((file, path))
    }

    /// Queue accepted raw lines (terminators included) for the next flush
    pub fn append(&mut self, lines: &[String]) {
        self.pending.extend_from_slice(lines);
    }

    pub fn pending_lines(&self) -> usize {
        self.pending.len()
    }

    /// Lines flushed into the current file so far
    pub fn page_lines(&self) -> usize {
        self.page_lines
    }

    pub fn current_path(&self) -> &Path {
        &self.file_path
    }

    /// Evaluate the flush and rotation thresholds.
    ///
    /// Called once per poll cycle with `complete` set when the sample table
    /// has reached its target. Pages that would overfill are closed out with
    /// the fitting prefix and rotation spills the remainder into a fresh
    /// file; leftover lines flush without rotation when the session is
    /// complete or more than [`FLUSH_LINE_THRESHOLD`] lines are pending.
    pub async fn check(&mut self, complete: bool) -> Result<()> {
        while !self.pending.is_empty()
            && self.page_lines + self.pending.len() >= self.max_page_points
        {
            let fits = self.max_page_points - self.page_lines;
            let head: Vec<String> = self.pending.drain(..fits).collect();
            self.write_lines(&head).await?;
            if complete && self.pending.is_empty() {
                // Terminal flush landed exactly on the page boundary; a
                // fresh file would stay empty
                return Ok(());
            }
            self.rotate().await?;
        }
        if !self.pending.is_empty() && (complete || self.pending.len() > FLUSH_LINE_THRESHOLD) {
            let rest: Vec<String> = self.pending.drain(..).collect();
            self.write_lines(&rest).await?;
        }
        Ok(())
    }

    async fn write_lines(&mut self, lines: &[String]) -> Result<()> {
        let text: String = lines.concat();
        self.file.write_all(text.as_bytes()).await?;
        self.file.flush().await?;
        self.page_lines += lines.len();
        Ok(())
    }

    /// Close the current page and open the next one
    async fn rotate(&mut self) -> Result<()> {
        self.pages_opened += 1;
        let (file, path) = Self::open_page(&self.dir, self.pages_opened).await?;
        self.file = file;
        self.file_path = path;
        self.page_lines = 0;
        info!("New File: {}", self.file_path.display());
        Ok(())
    }

    /// Flush whatever is pending and sync the session's final file
    pub async fn finalize(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            let rest: Vec<String> = self.pending.drain(..).collect();
            self.write_lines(&rest).await?;
        }
        self.file.flush().await?;
        Ok(())
    }

    /// Discard pending text and start a fresh page (session reset path).
    /// Lines already flushed stay on disk.
    pub async fn reset(&mut self) -> Result<()> {
        self.pending.clear();
        self.rotate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| format!("{s}\r\n")).collect()
    }

    /// Page files in creation order, with their contents
    fn read_pages(dir: &Path) -> Vec<(String, String)> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let content = std::fs::read_to_string(dir.join(&name)).unwrap();
                (name, content)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_below_thresholds_nothing_is_written() {
        let dir = tempdir().unwrap();
        let mut writer = PageWriter::open(dir.path(), 1000).await.unwrap();

        writer.append(&lines(&["1,0,5", "2,10,6"]));
        writer.check(false).await.unwrap();

        assert_eq!(writer.pending_lines(), 2);
        let pages = read_pages(dir.path());
        assert_eq!(pages.len(), 1);
        assert!(pages[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_completion_flushes_without_rotation() {
        let dir = tempdir().unwrap();
        let mut writer = PageWriter::open(dir.path(), 1000).await.unwrap();

        writer.append(&lines(&["1,0,5", "2,10,6"]));
        writer.check(true).await.unwrap();
        writer.finalize().await.unwrap();

        let pages = read_pages(dir.path());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].1, "1,0,5\r\n2,10,6\r\n");
    }

    #[tokio::test]
    async fn test_page_boundary_splits_and_rotates_once() {
        // Bounded target 3 with two points per page: three lines in one
        // batch land as 2 + 1 across two files with exactly one rotation
        let dir = tempdir().unwrap();
        let mut writer = PageWriter::open(dir.path(), 2).await.unwrap();

        writer.append(&lines(&["1,0,5", "2,10,6", "3,20,7"]));
        writer.check(true).await.unwrap();
        writer.finalize().await.unwrap();

        let pages = read_pages(dir.path());
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].1, "1,0,5\r\n2,10,6\r\n");
        assert_eq!(pages[1].1, "3,20,7\r\n");

        // Concatenation reproduces the original order
        let combined: String = pages.into_iter().map(|(_, c)| c).collect();
        assert_eq!(combined, "1,0,5\r\n2,10,6\r\n3,20,7\r\n");
    }

    #[tokio::test]
    async fn test_terminal_flush_on_exact_boundary_leaves_no_empty_file() {
        let dir = tempdir().unwrap();
        let mut writer = PageWriter::open(dir.path(), 2).await.unwrap();

        writer.append(&lines(&["1,0,5", "2,10,6"]));
        writer.check(true).await.unwrap();
        writer.finalize().await.unwrap();

        let pages = read_pages(dir.path());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].1, "1,0,5\r\n2,10,6\r\n");
    }

    #[tokio::test]
    async fn test_mid_run_page_boundary_rotates_for_future_lines() {
        let dir = tempdir().unwrap();
        let mut writer = PageWriter::open(dir.path(), 2).await.unwrap();

        writer.append(&lines(&["1,0,5", "2,10,6"]));
        writer.check(false).await.unwrap();

        writer.append(&lines(&["3,20,7"]));
        writer.check(true).await.unwrap();
        writer.finalize().await.unwrap();

        let pages = read_pages(dir.path());
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].1, "1,0,5\r\n2,10,6\r\n");
        assert_eq!(pages[1].1, "3,20,7\r\n");
    }

    #[tokio::test]
    async fn test_durability_flush_over_100_pending_lines() {
        let dir = tempdir().unwrap();
        let mut writer = PageWriter::open(dir.path(), 100_000).await.unwrap();

        let many: Vec<String> = (0..101).map(|i| format!("{i},0,5\r\n")).collect();
        writer.append(&many);
        writer.check(false).await.unwrap();

        assert_eq!(writer.pending_lines(), 0);
        let pages = read_pages(dir.path());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].1.lines().count(), 101);
    }

    #[tokio::test]
    async fn test_no_line_is_duplicated_across_rotations() {
        let dir = tempdir().unwrap();
        let mut writer = PageWriter::open(dir.path(), 3).await.unwrap();

        for i in 0..10 {
            writer.append(&lines(&[&format!("{i},{},5", i * 10)]));
            writer.check(false).await.unwrap();
        }
        writer.check(true).await.unwrap();
        writer.finalize().await.unwrap();

        let combined: String = read_pages(dir.path()).into_iter().map(|(_, c)| c).collect();
        let expected: String = (0..10).map(|i| format!("{i},{},5\r\n", i * 10)).collect();
        assert_eq!(combined, expected);
    }

    #[tokio::test]
    async fn test_reset_discards_pending_keeps_flushed() {
        let dir = tempdir().unwrap();
        let mut writer = PageWriter::open(dir.path(), 2).await.unwrap();

        writer.append(&lines(&["1,0,5", "2,10,6"]));
        writer.check(false).await.unwrap(); // fills page 1, rotates

        writer.append(&lines(&["garbage"]));
        writer.reset().await.unwrap();
        writer.append(&lines(&["1,0,7"]));
        writer.check(true).await.unwrap();
        writer.finalize().await.unwrap();

        let pages = read_pages(dir.path());
        let combined: String = pages.iter().map(|(_, c)| c.clone()).collect();
        assert!(combined.contains("1,0,5\r\n2,10,6\r\n"));
        assert!(!combined.contains("garbage"));
        assert!(combined.contains("1,0,7\r\n"));
    }
}
