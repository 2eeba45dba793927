//! Attendance record storage for carelog
//!
//! Provides:
//! - The attendance record model and its natural key
//! - The `AttendanceStore` port every caller programs against
//! - An in-memory adapter (demo and tests)
//! - A remote list adapter with optimistic concurrency and schema fallback
//! - The `ListClient` capability it consumes, with an HTTP and a mock implementation

mod client;
mod error;
mod fields;
mod http;
mod memory;
mod mock;
mod record;
mod remote;
mod traits;

pub use client::*;
pub use error::*;
pub use http::*;
pub use memory::*;
pub use mock::*;
pub use record::*;
pub use remote::*;
pub use traits::*;
