//! Aggregation of detections.
//!
//! This module contains:
//! - Fixed-vocabulary histograms with deterministic mode selection
//! - The live per-session aggregator
//! - The statistics engine over persisted records

pub mod aggregator;
pub mod histogram;
pub mod stats;

// Re-export commonly used types
pub use aggregator::{EmotionShare, SessionAggregator, SessionContext};
pub use histogram::{Histogram, Vocabulary};
pub use stats::{
    AggregateStats, QueryError, RecentStats, StatsFilter, StatsQueryEngine, DEFAULT_LIST_LIMIT,
    DEFAULT_RECENT_MINUTES,
};
