//! Persistence of labeled detections.
//!
//! [`PersistenceGateway`] validates an incoming detection and appends it to a
//! [`RecordStore`]. Validation happens before any write, so a rejected
//! detection never leaves a partial record behind.
//!
//! The detection loop talks to persistence through [`DetectionSink`], which
//! is best-effort: it never fails, it reports a [`PersistOutcome`] instead.

use crate::detection::{DetectionSample, EmotionKind, MoodKind};
use crate::store::{EmotionRecord, RecordStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// A detection as submitted for storage.
///
/// Every field is optional on the wire so a missing field surfaces as a
/// validation error rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmotion {
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewEmotion {
    pub fn from_sample(sample: &DetectionSample) -> Self {
        Self {
            emotion: Some(sample.dominant_emotion().to_string()),
            confidence: Some(sample.confidence_percent()),
            mood: Some(sample.mood().to_string()),
            session_id: Some(sample.session_id().to_string()),
            timestamp: Some(sample.timestamp()),
        }
    }

    /// Check every field against its domain and build the record to store.
    pub fn validate(&self) -> Result<EmotionRecord, ValidationError> {
        let emotion_name = self
            .emotion
            .as_deref()
            .ok_or(ValidationError::MissingField("emotion"))?;
        let emotion: EmotionKind = emotion_name
            .parse()
            .map_err(|_| ValidationError::InvalidEmotion(emotion_name.to_string()))?;

        let mood_name = self
            .mood
            .as_deref()
            .ok_or(ValidationError::MissingField("mood"))?;
        let mood = MoodKind::parse(mood_name)
            .ok_or_else(|| ValidationError::InvalidMood(mood_name.to_string()))?;
        if mood != emotion.mood() {
            return Err(ValidationError::MoodMismatch { emotion, mood });
        }

        let confidence = self
            .confidence
            .ok_or(ValidationError::MissingField("confidence"))?;
        if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
            return Err(ValidationError::ConfidenceOutOfRange(confidence));
        }

        let session_id = self
            .session_id
            .as_deref()
            .map(str::trim)
            .ok_or(ValidationError::MissingField("sessionId"))?;
        if session_id.is_empty() {
            return Err(ValidationError::EmptySessionId);
        }

        Ok(EmotionRecord {
            id: Uuid::new_v4(),
            emotion,
            confidence,
            mood,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            session_id: session_id.to_string(),
        })
    }
}

/// A detection that falls outside its declared domain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("`{0}` is not a valid emotion")]
    InvalidEmotion(String),
    #[error("`{0}` is not a valid mood")]
    InvalidMood(String),
    #[error("mood {mood} does not match emotion {emotion}")]
    MoodMismatch { emotion: EmotionKind, mood: MoodKind },
    #[error("confidence {0} is outside [0, 100]")]
    ConfidenceOutOfRange(f64),
    #[error("sessionId must not be empty")]
    EmptySessionId,
}

/// Errors from [`PersistenceGateway::append`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("persistence unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Validating front of a record store.
pub struct PersistenceGateway<S> {
    store: Arc<S>,
}

impl<S: RecordStore> PersistenceGateway<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate and store one detection, returning the stored record.
    pub fn append(&self, new: NewEmotion) -> Result<EmotionRecord, GatewayError> {
        let record = new.validate()?;
        self.store.insert(record.clone())?;
        tracing::debug!(
            id = %record.id,
            emotion = %record.emotion,
            session_id = %record.session_id,
            "Stored emotion record"
        );
        Ok(record)
    }
}

/// What happened to one best-effort persistence attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Stored { id: Uuid },
    /// The receiving side refused the record.
    Rejected(String),
    /// The store could not be reached.
    Unavailable(String),
}

impl PersistOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, PersistOutcome::Stored { .. })
    }
}

/// Where the detection loop sends each labeled sample.
///
/// Implementations swallow their own failures and describe them in the
/// returned outcome; a storage outage must never reach the loop.
pub trait DetectionSink: Send + Sync + 'static {
    fn persist(&self, sample: &DetectionSample) -> impl Future<Output = PersistOutcome> + Send;
}

impl<S: RecordStore + 'static> PersistenceGateway<S> {
    /// [`append`](Self::append) on the blocking pool, for callers on the
    /// async runtime. Store I/O may hit the filesystem.
    pub async fn append_blocking(&self, new: NewEmotion) -> Result<EmotionRecord, GatewayError> {
        let gateway = Self {
            store: Arc::clone(&self.store),
        };
        tokio::task::spawn_blocking(move || gateway.append(new))
            .await
            .map_err(|e| GatewayError::Unavailable(StoreError::Unavailable(e.to_string())))?
    }
}

impl<S: RecordStore + 'static> DetectionSink for PersistenceGateway<S> {
    async fn persist(&self, sample: &DetectionSample) -> PersistOutcome {
        match self.append_blocking(NewEmotion::from_sample(sample)).await {
            Ok(record) => PersistOutcome::Stored { id: record.id },
            Err(GatewayError::Validation(e)) => PersistOutcome::Rejected(e.to_string()),
            Err(GatewayError::Unavailable(e)) => {
                tracing::warn!(error = %e, "Record store unavailable, dropping detection");
                PersistOutcome::Unavailable(e.to_string())
            }
        }
    }
}
