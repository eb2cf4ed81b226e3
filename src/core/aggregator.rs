//! Live per-session emotion histogram.

use crate::core::histogram::Histogram;
use crate::detection::labeler::round_to;
use crate::detection::EmotionKind;
use serde::Serialize;
use uuid::Uuid;

/// One row of a session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionShare {
    pub emotion: EmotionKind,
    pub count: u64,
    /// Share of all detections so far, one decimal.
    pub percentage: f64,
}

/// Running emotion counts for a single session.
///
/// Counts only grow. A new session starts from a new aggregator.
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    histogram: Histogram<EmotionKind>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, emotion: EmotionKind) {
        self.histogram.increment(emotion);
    }

    pub fn total(&self) -> u64 {
        self.histogram.total()
    }

    pub fn count(&self, emotion: EmotionKind) -> u64 {
        self.histogram.get(emotion)
    }

    pub fn histogram(&self) -> &Histogram<EmotionKind> {
        &self.histogram
    }

    /// Point-in-time distribution, highest count first.
    ///
    /// Equal counts keep vocabulary order. Empty until the first record.
    pub fn snapshot(&self) -> Vec<EmotionShare> {
        let total = self.total();
        if total == 0 {
            return Vec::new();
        }

        let mut shares: Vec<EmotionShare> = self
            .histogram
            .iter()
            .map(|(emotion, count)| EmotionShare {
                emotion,
                count,
                percentage: round_to(count as f64 / total as f64 * 100.0, 1),
            })
            .collect();
        // Stable sort: ties stay in the vocabulary order `iter` produced.
        shares.sort_by(|a, b| b.count.cmp(&a.count));
        shares
    }
}

/// Everything one detection session owns: its identifier and histogram.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: String,
    aggregator: SessionAggregator,
}

impl SessionContext {
    /// Start a session with a fresh random identifier.
    pub fn new() -> Self {
        Self::with_id(format!("SESS-{}", Uuid::new_v4().simple()))
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            aggregator: SessionAggregator::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn aggregator(&self) -> &SessionAggregator {
        &self.aggregator
    }

    pub fn aggregator_mut(&mut self) -> &mut SessionAggregator {
        &mut self.aggregator
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
