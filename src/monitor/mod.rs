//! Observability for detection sessions.
//!
//! Counts what the detection loop did, including the persistence failures it
//! deliberately swallows, so they can be inspected and monitored.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_monitor, LoopMonitor, LoopStats, SharedLoopMonitor};
