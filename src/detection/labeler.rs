//! Reduction of a confidence vector to a dominant emotion and mood.

use super::types::{ConfidenceVector, EmotionKind, MoodKind};
use serde::Serialize;

/// Errors raised for out-of-contract classifier output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LabelError {
    #[error("invalid emotion kind: {0:?}")]
    InvalidEmotionKind(String),
    #[error("confidence for {emotion} out of range [0, 1]: {score}")]
    InvalidConfidence { emotion: EmotionKind, score: f64 },
}

/// Result of labeling one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub emotion: EmotionKind,
    pub mood: MoodKind,
    /// Dominant score as a percentage, two decimals.
    pub confidence_percent: f64,
}

/// Pick the dominant emotion of a frame.
///
/// Only a strictly greater score replaces the current leader, and candidates
/// are visited in `EmotionKind::ALL` order, so a tie goes to the emotion that
/// comes first in the vocabulary.
pub fn label(confidences: &ConfidenceVector) -> Label {
    let mut best = (EmotionKind::ALL[0], confidences.get(EmotionKind::ALL[0]));
    for (emotion, score) in confidences.iter().skip(1) {
        if score > best.1 {
            best = (emotion, score);
        }
    }

    let (emotion, score) = best;
    Label {
        emotion,
        mood: emotion.mood(),
        confidence_percent: round_to(score * 100.0, 2),
    }
}

/// Mood lookup by emotion name.
///
/// Names outside the vocabulary map to `MoodKind::Unknown`. Typed callers
/// should use [`EmotionKind::mood`] instead.
pub fn mood_for_name(name: &str) -> MoodKind {
    name.parse::<EmotionKind>()
        .map(EmotionKind::mood)
        .unwrap_or(MoodKind::Unknown)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
