//! Integration tests for stopguard-bot.
//!
//! These tests drive full reconciliation cycles and monitoring sessions
//! against the in-memory broker:
//! - Missing / mismatched stop correction
//! - ITM protection closes
//! - Dry runs and skipped cycles
//! - Cancellation

pub mod common;
