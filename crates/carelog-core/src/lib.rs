//! Attendance day protocols for carelog
//!
//! This crate sits on top of the storage port and contains:
//! - Concurrent write fan-out with partial-failure aggregation
//! - Day finalize / unfinalize (representative-record protocol)
//! - Bulk apply of one edit to many staff
//! - The staff roster / attendance row join
//! - `AttendanceBoard`, the read/write façade for one day

mod board;
mod bulk;
mod fanout;
mod finalize;
mod rows;

pub use board::*;
pub use bulk::*;
pub use fanout::*;
pub use finalize::*;
pub use rows::*;
