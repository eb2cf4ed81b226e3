//! Emotion vocabulary, mood categories and per-frame detection samples.
//!
//! The vocabulary is closed and carries a fixed traversal order
//! (`EmotionKind::ALL`). Every argmax, mode and ordering decision in the crate
//! walks that order, so ties always resolve the same way.

use crate::core::histogram::Vocabulary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::labeler::LabelError;

/// One entry of the fixed emotion vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionKind {
    Happy,
    Sad,
    Angry,
    Disgusted,
    Fearful,
    Surprised,
    Neutral,
}

impl EmotionKind {
    /// The vocabulary in its tie-break order.
    pub const ALL: [EmotionKind; 7] = [
        EmotionKind::Happy,
        EmotionKind::Sad,
        EmotionKind::Angry,
        EmotionKind::Disgusted,
        EmotionKind::Fearful,
        EmotionKind::Surprised,
        EmotionKind::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionKind::Happy => "happy",
            EmotionKind::Sad => "sad",
            EmotionKind::Angry => "angry",
            EmotionKind::Disgusted => "disgusted",
            EmotionKind::Fearful => "fearful",
            EmotionKind::Surprised => "surprised",
            EmotionKind::Neutral => "neutral",
        }
    }

    /// Mood category for this emotion.
    pub fn mood(self) -> MoodKind {
        match self {
            EmotionKind::Happy => MoodKind::Positive,
            EmotionKind::Sad | EmotionKind::Angry | EmotionKind::Disgusted | EmotionKind::Fearful => {
                MoodKind::Negative
            }
            EmotionKind::Surprised => MoodKind::Surprised,
            EmotionKind::Neutral => MoodKind::Neutral,
        }
    }
}

impl Vocabulary for EmotionKind {
    const ALL: &'static [Self] = &EmotionKind::ALL;

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EmotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EmotionKind {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmotionKind::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| LabelError::InvalidEmotionKind(s.to_string()))
    }
}

/// Coarse mood classification derived from the dominant emotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MoodKind {
    Positive,
    Negative,
    Surprised,
    Neutral,
    /// Only produced for out-of-vocabulary input on the name-based lookup.
    Unknown,
}

impl MoodKind {
    pub const ALL: [MoodKind; 5] = [
        MoodKind::Positive,
        MoodKind::Negative,
        MoodKind::Surprised,
        MoodKind::Neutral,
        MoodKind::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MoodKind::Positive => "Positive",
            MoodKind::Negative => "Negative",
            MoodKind::Surprised => "Surprised",
            MoodKind::Neutral => "Neutral",
            MoodKind::Unknown => "Unknown",
        }
    }

    /// Parse a mood name. `Unknown` is not accepted: it is never a valid
    /// stored mood.
    pub fn parse(s: &str) -> Option<Self> {
        MoodKind::ALL
            .into_iter()
            .filter(|m| *m != MoodKind::Unknown)
            .find(|m| m.as_str() == s)
    }
}

impl Vocabulary for MoodKind {
    const ALL: &'static [Self] = &MoodKind::ALL;

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MoodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Per-emotion confidence scores for one frame, each in `[0, 1]`.
///
/// Scores are not required to sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfidenceVector {
    scores: [f64; 7],
}

impl ConfidenceVector {
    /// Build from `(emotion, score)` pairs. Entries left out score zero.
    pub fn new(scores: impl IntoIterator<Item = (EmotionKind, f64)>) -> Result<Self, LabelError> {
        let mut vector = Self::default();
        for (emotion, score) in scores {
            if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                return Err(LabelError::InvalidConfidence { emotion, score });
            }
            vector.scores[emotion.index()] = score;
        }
        Ok(vector)
    }

    /// Build from the name-keyed mapping a classifier emits.
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self, LabelError> {
        let pairs = map
            .iter()
            .map(|(name, score)| Ok((name.parse::<EmotionKind>()?, *score)))
            .collect::<Result<Vec<_>, LabelError>>()?;
        Self::new(pairs)
    }

    pub fn get(&self, emotion: EmotionKind) -> f64 {
        self.scores[emotion.index()]
    }

    /// Scores in vocabulary order.
    pub fn iter(&self) -> impl Iterator<Item = (EmotionKind, f64)> + '_ {
        EmotionKind::ALL.into_iter().map(|e| (e, self.get(e)))
    }
}

impl<'de> Deserialize<'de> for ConfidenceVector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let map = HashMap::<String, f64>::deserialize(deserializer)?;
        ConfidenceVector::from_map(&map).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ConfidenceVector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(EmotionKind::ALL.len()))?;
        for (emotion, score) in self.iter() {
            map.serialize_entry(emotion.as_str(), &score)?;
        }
        map.end()
    }
}

/// A labeled frame.
///
/// Fields are private so a sample cannot carry a mood that disagrees with
/// its emotion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSample {
    dominant_emotion: EmotionKind,
    confidence_percent: f64,
    mood: MoodKind,
    session_id: String,
    timestamp: DateTime<Utc>,
}

impl DetectionSample {
    pub fn new(
        emotion: EmotionKind,
        confidence_percent: f64,
        session_id: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            dominant_emotion: emotion,
            confidence_percent,
            mood: emotion.mood(),
            session_id: session_id.into(),
            timestamp: timestamp.unwrap_or_else(Utc::now),
        }
    }

    pub fn dominant_emotion(&self) -> EmotionKind {
        self.dominant_emotion
    }

    pub fn confidence_percent(&self) -> f64 {
        self.confidence_percent
    }

    pub fn mood(&self) -> MoodKind {
        self.mood
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_parsing() {
        assert_eq!("happy".parse::<EmotionKind>().unwrap(), EmotionKind::Happy);
        assert_eq!("fearful".parse::<EmotionKind>().unwrap(), EmotionKind::Fearful);
        assert!("Fearful".parse::<EmotionKind>().is_err());
        assert!(" happy".parse::<EmotionKind>().is_err());
        assert!(matches!(
            "contempt".parse::<EmotionKind>(),
            Err(LabelError::InvalidEmotionKind(name)) if name == "contempt"
        ));
    }

    #[test]
    fn test_mood_parse_rejects_unknown() {
        assert_eq!(MoodKind::parse("Negative"), Some(MoodKind::Negative));
        assert_eq!(MoodKind::parse("negative"), None);
        assert_eq!(MoodKind::parse("Unknown"), None);
        assert_eq!(MoodKind::parse("Happy"), None);
    }

    #[test]
    fn test_confidence_vector_from_map() {
        let mut map = HashMap::new();
        map.insert("happy".to_string(), 0.7);
        map.insert("sad".to_string(), 0.2);
        let vector = ConfidenceVector::from_map(&map).unwrap();
        assert_eq!(vector.get(EmotionKind::Happy), 0.7);
        assert_eq!(vector.get(EmotionKind::Neutral), 0.0);

        map.insert("bored".to_string(), 0.1);
        assert!(ConfidenceVector::from_map(&map).is_err());
    }

    #[test]
    fn test_confidence_vector_rejects_out_of_range() {
        let err = ConfidenceVector::new([(EmotionKind::Sad, 1.5)]).unwrap_err();
        assert!(matches!(err, LabelError::InvalidConfidence { .. }));
        assert!(ConfidenceVector::new([(EmotionKind::Sad, f64::NAN)]).is_err());
    }

    #[test]
    fn test_confidence_vector_json() {
        let vector: ConfidenceVector =
            serde_json::from_str(r#"{"neutral": 0.9, "happy": 0.05}"#).unwrap();
        assert_eq!(vector.get(EmotionKind::Neutral), 0.9);

        let json = serde_json::to_value(vector).unwrap();
        assert_eq!(json["neutral"], 0.9);
        assert_eq!(json["angry"], 0.0);
    }

    #[test]
    fn test_sample_mood_follows_emotion() {
        let sample = DetectionSample::new(EmotionKind::Disgusted, 55.0, "s1", None);
        assert_eq!(sample.mood(), MoodKind::Negative);
        assert_eq!(sample.session_id(), "s1");
    }
}
