//! Aggregate statistics over persisted detections.
//!
//! Queries are read-only: each call fetches the matching record set from the
//! store and folds it into a fresh [`AggregateStats`].

use crate::core::histogram::Histogram;
use crate::detection::labeler::round_to;
use crate::detection::{EmotionKind, MoodKind};
use crate::store::{EmotionRecord, RecordFilter, RecordStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use statrs::statistics::Statistics;

/// Default number of records returned by [`StatsQueryEngine::list_recent`].
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Default sliding window for recent stats, in minutes.
pub const DEFAULT_RECENT_MINUTES: f64 = 60.0;

/// Distribution of a record set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_detections: u64,
    pub emotion_count: Histogram<EmotionKind>,
    pub mood_count: Histogram<MoodKind>,
    /// Mean stored confidence, two decimals; 0 for an empty set
    pub average_confidence_percent: f64,
    pub top_emotion: Option<EmotionKind>,
    pub top_mood: Option<MoodKind>,
}

impl AggregateStats {
    /// Fold a record set.
    pub fn from_records(records: &[EmotionRecord]) -> Self {
        let emotion_count: Histogram<EmotionKind> = records.iter().map(|r| r.emotion).collect();
        let mood_count: Histogram<MoodKind> = records.iter().map(|r| r.mood).collect();

        let average_confidence_percent = if records.is_empty() {
            0.0
        } else {
            round_to(records.iter().map(|r| r.confidence).mean(), 2)
        };

        Self {
            total_detections: records.len() as u64,
            top_emotion: emotion_count.mode(),
            top_mood: mood_count.mode(),
            emotion_count,
            mood_count,
            average_confidence_percent,
        }
    }
}

/// Stats over a trailing time window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentStats {
    /// Human-readable window, e.g. "Last 60 minutes"
    pub time_range: String,
    pub minutes: f64,
    pub since: DateTime<Utc>,
    #[serde(flatten)]
    pub stats: AggregateStats,
}

/// Filter for [`StatsQueryEngine::compute_stats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsFilter {
    pub session_id: Option<String>,
}

impl StatsFilter {
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
        }
    }
}

/// Query failures. An empty result is never an error.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid time window: {0} minutes (must be a positive number)")]
    InvalidWindow(f64),
    #[error("failed to read records: {0}")]
    Store(#[from] StoreError),
}

/// Stateless query engine over a record store.
pub struct StatsQueryEngine<S> {
    store: S,
}

impl<S: RecordStore> StatsQueryEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All-time stats, optionally restricted to one session.
    pub fn compute_stats(&self, filter: &StatsFilter) -> Result<AggregateStats, QueryError> {
        let query = RecordFilter {
            session_id: filter.session_id.clone(),
            ..RecordFilter::default()
        };
        let records = self.store.find(&query)?;
        Ok(AggregateStats::from_records(&records))
    }

    /// Stats for records no older than `minutes`.
    pub fn compute_recent_stats(&self, minutes: f64) -> Result<RecentStats, QueryError> {
        self.compute_recent_stats_at(minutes, Utc::now())
    }

    /// Same as [`compute_recent_stats`](Self::compute_recent_stats) against a
    /// fixed clock. The window start `now - minutes` is inclusive.
    pub fn compute_recent_stats_at(
        &self,
        minutes: f64,
        now: DateTime<Utc>,
    ) -> Result<RecentStats, QueryError> {
        let since = window_start(minutes, now)?;
        let records = self.store.find(&RecordFilter::since(since))?;

        Ok(RecentStats {
            time_range: format!("Last {} minutes", format_minutes(minutes)),
            minutes,
            since,
            stats: AggregateStats::from_records(&records),
        })
    }

    /// Most recent records across all sessions, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<EmotionRecord>, QueryError> {
        Ok(self.store.find(&RecordFilter::all().with_limit(limit))?)
    }

    /// Every record of one session, newest first.
    pub fn list_session(&self, session_id: &str) -> Result<Vec<EmotionRecord>, QueryError> {
        Ok(self.store.find(&RecordFilter::session(session_id))?)
    }
}

fn window_start(minutes: f64, now: DateTime<Utc>) -> Result<DateTime<Utc>, QueryError> {
    if !minutes.is_finite() || minutes <= 0.0 {
        return Err(QueryError::InvalidWindow(minutes));
    }
    let millis = (minutes * 60_000.0).round();
    if millis > i64::MAX as f64 {
        return Err(QueryError::InvalidWindow(minutes));
    }
    Duration::try_milliseconds(millis as i64)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or(QueryError::InvalidWindow(minutes))
}

fn format_minutes(minutes: f64) -> String {
    if minutes.fract() == 0.0 {
        format!("{}", minutes as i64)
    } else {
        format!("{minutes}")
    }
}
