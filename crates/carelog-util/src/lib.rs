//! Shared utilities for carelog
//!
//! This crate provides:
//! - ID types (StaffId, RecordKey)
//! - Date and clock utilities (mock time for development)
//! - Default configuration path

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
