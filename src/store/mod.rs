//! Durable record storage.
//!
//! The rest of the crate only needs two things from a store: append a record
//! and find the records matching a filter. [`RecordStore`] is that contract;
//! [`MemoryStore`] and [`JsonlStore`] are the bundled implementations.

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use crate::detection::{EmotionKind, MoodKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One persisted detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionRecord {
    pub id: Uuid,
    pub emotion: EmotionKind,
    /// Confidence percentage in `[0, 100]`
    pub confidence: f64,
    pub mood: MoodKind,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// Selection applied by [`RecordStore::find`].
///
/// Matching records come back newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub session_id: Option<String>,
    /// Inclusive lower bound on the timestamp
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &EmotionRecord) -> bool {
        if let Some(ref session_id) = self.session_id {
            if &record.session_id != session_id {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        true
    }

    /// Filter, order newest first, then truncate to the limit.
    pub(crate) fn apply<'a>(
        &self,
        records: impl IntoIterator<Item = &'a EmotionRecord>,
    ) -> Vec<EmotionRecord> {
        let mut matched: Vec<EmotionRecord> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt record at line {line}: {message}")]
    Corrupt { line: usize, message: String },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Append + filtered find over emotion records.
pub trait RecordStore: Send + Sync {
    fn insert(&self, record: EmotionRecord) -> Result<(), StoreError>;

    fn find(&self, filter: &RecordFilter) -> Result<Vec<EmotionRecord>, StoreError>;
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn insert(&self, record: EmotionRecord) -> Result<(), StoreError> {
        (**self).insert(record)
    }

    fn find(&self, filter: &RecordFilter) -> Result<Vec<EmotionRecord>, StoreError> {
        (**self).find(filter)
    }
}

/// Shared, type-erased store handle.
pub type SharedStore = Arc<dyn RecordStore>;


#[cfg(test)]
mod tests {
    use super::testing::record;
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_filter_orders_newest_first_and_limits() {
        let now = Utc::now();
        let records = vec![
            record(EmotionKind::Sad, 50.0, "a", Duration::minutes(10), now),
            record(EmotionKind::Happy, 60.0, "b", Duration::minutes(1), now),
            record(EmotionKind::Angry, 70.0, "a", Duration::minutes(5), now),
        ];

        let found = RecordFilter::all().with_limit(2).apply(&records);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].emotion, EmotionKind::Happy);
        assert_eq!(found[1].emotion, EmotionKind::Angry);

        let session = RecordFilter::session("a").apply(&records);
        assert_eq!(session.len(), 2);
        assert!(session.iter().all(|r| r.session_id == "a"));
    }

    #[test]
    fn test_since_is_inclusive() {
        let now = Utc::now();
        let at_bound = record(EmotionKind::Sad, 50.0, "a", Duration::minutes(5), now);
        let filter = RecordFilter::since(at_bound.timestamp);
        assert!(filter.matches(&at_bound));

        let older = record(EmotionKind::Sad, 50.0, "a", Duration::minutes(6), now);
        assert!(!filter.matches(&older));
    }

    #[test]
    fn test_record_json_shape() {
        let now = Utc::now();
        let rec = record(EmotionKind::Surprised, 81.5, "s-1", Duration::zero(), now);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["emotion"], "surprised");
        assert_eq!(json["mood"], "Surprised");
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["confidence"], 81.5);
        assert!(json["timestamp"].as_str().is_some());
    }
}
