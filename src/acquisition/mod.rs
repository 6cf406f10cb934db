//! # Acquisition Module
//!
//! The acquisition loop and its session state machine.
//!
//! This module handles:
//! - Polling the device and assembling complete CSV lines
//! - Gating on the start sentinel
//! - Writing parsed batches into the sample table
//! - Paginated persistence and periodic progress notifications
//! - Session reset after unrecoverable parse corruption

pub mod session;
