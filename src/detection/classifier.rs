//! Seams to the external vision stack.
//!
//! The crate never looks inside the model or the camera. A detection session
//! only needs a device it can open and close, and a classifier that turns
//! "the current frame" into confidence scores.

use super::types::ConfidenceVector;
use std::future::Future;

/// Camera or stream acquisition failed. Fatal to starting a session.
#[derive(Debug, Clone, thiserror::Error)]
#[error("capture device unavailable: {0}")]
pub struct AcquisitionError(pub String);

/// Failures reported by the classifier for one call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    /// The model is not loaded yet; retry later.
    #[error("expression model not loaded: {0}")]
    ModelUnavailable(String),
    /// Transient failure on a single frame.
    #[error("inference failed: {0}")]
    Inference(String),
    /// The frame source ended or broke; no further frames will arrive.
    #[error("frame source lost: {0}")]
    SourceLost(String),
}

/// A frame source that must be held open for the life of a session.
pub trait CaptureDevice: Send {
    fn open(&mut self) -> Result<(), AcquisitionError>;

    /// Release the underlying stream. Must be safe to call more than once.
    fn close(&mut self);
}

/// The external expression model.
pub trait ExpressionClassifier: Send + Sync + 'static {
    /// Resolve once the model is ready to classify, or fail with
    /// [`ClassifierError::ModelUnavailable`] if it is still loading.
    fn ensure_ready(&self) -> impl Future<Output = Result<(), ClassifierError>> + Send;

    /// Classify the current frame. `Ok(None)` means no face was found.
    fn classify(
        &self,
    ) -> impl Future<Output = Result<Option<ConfidenceVector>, ClassifierError>> + Send;
}
