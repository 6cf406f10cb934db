//! # Storage Module
//!
//! In-memory sample buffering and on-disk persistence.
//!
//! This module handles:
//! - The fixed-shape sample table with bounded and ring write disciplines
//! - Immutable table snapshots for the visualization consumer
//! - Paginated raw-text persistence with file rotation

pub mod page_writer;
pub mod table;
