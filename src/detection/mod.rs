//! Frame-level detection for a single session.
//!
//! This module contains:
//! - The emotion vocabulary and the frame-to-label reduction
//! - Traits for the external classifier and capture device
//! - The periodic detection loop that ties them together
//! - A replay source for running sessions from recorded frames

pub mod classifier;
pub mod controller;
pub mod labeler;
pub mod replay;
pub mod types;

// Re-export commonly used types
pub use classifier::{AcquisitionError, CaptureDevice, ClassifierError, ExpressionClassifier};
pub use controller::{
    ControllerConfig, ControllerError, DetectionEvent, DetectionLoopController, LoopState,
    StopReason, TickOutcome,
};
pub use labeler::{label, mood_for_name, Label, LabelError};
pub use replay::{replay_file, replay_frames, ReplayClassifier, ReplayDevice};
pub use types::{ConfidenceVector, DetectionSample, EmotionKind, MoodKind};
