//! Recorded classifier output played back as a live stream.
//!
//! A replay file holds one frame per line: a JSON object mapping emotion names
//! to scores, or `null` for a frame without a face. Opening the device loads
//! the frames; the paired classifier hands them out one per call and reports
//! the source as lost once they run out.

use super::classifier::{AcquisitionError, CaptureDevice, ClassifierError, ExpressionClassifier};
use super::types::ConfidenceVector;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

type Frames = VecDeque<Option<ConfidenceVector>>;

/// `None` until the device is opened, and again after it is closed.
type SharedFrames = Arc<Mutex<Option<Frames>>>;

#[derive(Debug, Clone)]
enum ReplaySource {
    File(PathBuf),
    Frames(Vec<Option<ConfidenceVector>>),
}

/// Capture side of a replay: loads frames on open.
#[derive(Debug)]
pub struct ReplayDevice {
    source: ReplaySource,
    frames: SharedFrames,
}

/// Classifier side of a replay: yields the loaded frames in order.
#[derive(Debug, Clone)]
pub struct ReplayClassifier {
    frames: SharedFrames,
}

/// Replay frames read from a JSON-lines file.
pub fn replay_file(path: impl Into<PathBuf>) -> (ReplayDevice, ReplayClassifier) {
    pair(ReplaySource::File(path.into()))
}

/// Replay an in-memory frame sequence.
pub fn replay_frames(frames: Vec<Option<ConfidenceVector>>) -> (ReplayDevice, ReplayClassifier) {
    pair(ReplaySource::Frames(frames))
}

fn pair(source: ReplaySource) -> (ReplayDevice, ReplayClassifier) {
    let frames: SharedFrames = Arc::new(Mutex::new(None));
    (
        ReplayDevice {
            source,
            frames: Arc::clone(&frames),
        },
        ReplayClassifier { frames },
    )
}

fn lock(frames: &SharedFrames) -> MutexGuard<'_, Option<Frames>> {
    frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Parse replay file contents.
pub fn parse_frames(content: &str) -> Result<Vec<Option<ConfidenceVector>>, AcquisitionError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<Option<ConfidenceVector>>(line)
                .map_err(|e| AcquisitionError(format!("replay line {}: {e}", idx + 1)))
        })
        .collect()
}

impl CaptureDevice for ReplayDevice {
    fn open(&mut self) -> Result<(), AcquisitionError> {
        let frames = match &self.source {
            ReplaySource::File(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| AcquisitionError(format!("{}: {e}", path.display())))?;
                parse_frames(&content)?
            }
            ReplaySource::Frames(frames) => frames.clone(),
        };

        tracing::debug!(frames = frames.len(), "Replay source opened");
        *lock(&self.frames) = Some(frames.into());
        Ok(())
    }

    fn close(&mut self) {
        lock(&self.frames).take();
    }
}

impl ExpressionClassifier for ReplayClassifier {
    async fn ensure_ready(&self) -> Result<(), ClassifierError> {
        Ok(())
    }

    async fn classify(&self) -> Result<Option<ConfidenceVector>, ClassifierError> {
        let mut guard = lock(&self.frames);
        let frames = guard
            .as_mut()
            .ok_or_else(|| ClassifierError::SourceLost("replay not open".to_string()))?;
        frames
            .pop_front()
            .ok_or_else(|| ClassifierError::SourceLost("replay exhausted".to_string()))
    }
}
