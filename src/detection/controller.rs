//! Periodic detection loop for one session.
//!
//! The controller moves through `Idle -> Running -> Stopped`. While running,
//! a fixed-period schedule fires [`DetectionLoopController::tick`], which asks
//! the classifier for one frame. At most one classification is in flight at
//! any time; ticks that fire while one is pending are skipped.
//!
//! Session state (the state machine and the histogram) sits behind a single
//! mutex that is never held across an await. A completed classification
//! re-checks the state under that lock before touching the histogram, so once
//! [`stop`](DetectionLoopController::stop) returns no tick has any effect.

use super::classifier::{AcquisitionError, CaptureDevice, ClassifierError, ExpressionClassifier};
use super::labeler::label;
use super::types::{ConfidenceVector, DetectionSample};
use crate::config::Config;
use crate::core::{EmotionShare, SessionContext};
use crate::gateway::{DetectionSink, PersistOutcome};
use crate::monitor::{create_shared_monitor, SharedLoopMonitor};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Capacity of the event channel. Events beyond it are dropped, never waited on.
const EVENT_BUFFER: usize = 1024;

/// Lifecycle of a detection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    /// Terminal. A new session needs a new controller.
    Stopped,
}

/// Timing knobs for the loop.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Period between ticks
    pub poll_interval: Duration,
    /// Wait between readiness checks while the model loads
    pub model_retry_backoff: Duration,
    /// Readiness checks before giving up on start
    pub model_retry_attempts: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            model_retry_backoff: Duration::from_millis(500),
            model_retry_attempts: 20,
        }
    }
}

impl From<&Config> for ControllerConfig {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            model_retry_backoff: config.model_retry_backoff,
            model_retry_attempts: config.model_retry_attempts,
        }
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    Requested,
    SourceLost(String),
}

/// Things that happened in the loop, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionEvent {
    Detected(DetectionSample),
    NoFace,
    TickFailed(String),
    /// Result of the fire-and-forget persistence of one detection
    Persisted(PersistOutcome),
    Stopped(StopReason),
}

/// What a single call to [`DetectionLoopController::tick`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The controller is not running.
    NotRunning,
    /// A previous classification is still in flight.
    Skipped,
    NoFace,
    Detected(DetectionSample),
    /// Transient classifier failure; the next tick tries again.
    Failed(String),
    /// The session was stopped while this classification was in flight.
    Discarded,
    /// The frame source is gone; the controller has stopped itself.
    SourceLost,
}

/// Errors from [`DetectionLoopController::start`].
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("cannot start from state {0:?}")]
    NotIdle(LoopState),
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error("expression model still unavailable after {attempts} attempts: {reason}")]
    ModelUnavailable { attempts: u32, reason: String },
    #[error("classifier failed during start: {0}")]
    Classifier(ClassifierError),
    #[error("session stopped while starting")]
    Cancelled,
}

struct Inner {
    state: LoopState,
    starting: bool,
    session: SessionContext,
}

/// Clears the in-flight flag when a tick finishes or is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives classification for one session.
pub struct DetectionLoopController<C, S> {
    classifier: C,
    sink: Arc<S>,
    device: Mutex<Box<dyn CaptureDevice>>,
    inner: Mutex<Inner>,
    in_flight: AtomicBool,
    cancel: CancellationToken,
    persist_tasks: TaskTracker,
    config: ControllerConfig,
    events_tx: Sender<DetectionEvent>,
    events_rx: Receiver<DetectionEvent>,
    monitor: SharedLoopMonitor,
}

impl<C, S> DetectionLoopController<C, S>
where
    C: ExpressionClassifier,
    S: DetectionSink,
{
    pub fn new(
        session: SessionContext,
        classifier: C,
        device: impl CaptureDevice + 'static,
        sink: S,
        config: ControllerConfig,
    ) -> Self {
        let (events_tx, events_rx) = bounded(EVENT_BUFFER);
        Self {
            classifier,
            sink: Arc::new(sink),
            device: Mutex::new(Box::new(device)),
            inner: Mutex::new(Inner {
                state: LoopState::Idle,
                starting: false,
                session,
            }),
            in_flight: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            persist_tasks: TaskTracker::new(),
            config,
            events_tx,
            events_rx,
            monitor: create_shared_monitor(),
        }
    }

    /// Report into an existing monitor instead of a private one.
    pub fn with_monitor(mut self, monitor: SharedLoopMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn state(&self) -> LoopState {
        self.lock_inner().state
    }

    pub fn session_id(&self) -> String {
        self.lock_inner().session.session_id().to_string()
    }

    /// Current session distribution.
    pub fn snapshot(&self) -> Vec<EmotionShare> {
        self.lock_inner().session.aggregator().snapshot()
    }

    /// Number of successful detections so far.
    pub fn detections(&self) -> u64 {
        self.lock_inner().session.aggregator().total()
    }

    /// Receiver for loop events. Every clone sees a share of the same stream.
    pub fn events(&self) -> &Receiver<DetectionEvent> {
        &self.events_rx
    }

    pub fn monitor(&self) -> &SharedLoopMonitor {
        &self.monitor
    }

    /// Open the capture device, wait for the model, and enter `Running`.
    ///
    /// A device failure leaves the controller `Idle`. While the model is
    /// still loading, readiness is retried with a fixed backoff; a `stop()`
    /// during that wait aborts the start.
    pub async fn start(&self) -> Result<(), ControllerError> {
        {
            let mut inner = self.lock_inner();
            if inner.state != LoopState::Idle || inner.starting {
                return Err(ControllerError::NotIdle(inner.state));
            }
            inner.starting = true;
        }

        let result = self.open_and_wait().await;

        let mut inner = self.lock_inner();
        inner.starting = false;
        match result {
            Ok(()) if inner.state == LoopState::Idle => {
                inner.state = LoopState::Running;
                tracing::info!(
                    session_id = inner.session.session_id(),
                    "Detection session started"
                );
                Ok(())
            }
            Ok(()) => {
                self.lock_device().close();
                Err(ControllerError::Cancelled)
            }
            Err(e) => {
                if !matches!(e, ControllerError::Acquisition(_)) {
                    self.lock_device().close();
                }
                tracing::error!(error = %e, "Detection session failed to start");
                Err(e)
            }
        }
    }

    async fn open_and_wait(&self) -> Result<(), ControllerError> {
        self.lock_device().open()?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let ready = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ControllerError::Cancelled),
                ready = self.classifier.ensure_ready() => ready,
            };

            match ready {
                Ok(()) => return Ok(()),
                Err(ClassifierError::ModelUnavailable(reason)) => {
                    if attempts >= self.config.model_retry_attempts {
                        return Err(ControllerError::ModelUnavailable { attempts, reason });
                    }
                    tracing::debug!(attempts, %reason, "Expression model not ready, retrying");
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(ControllerError::Cancelled),
                        _ = tokio::time::sleep(self.config.model_retry_backoff) => {}
                    }
                }
                Err(e) => return Err(ControllerError::Classifier(e)),
            }
        }
    }

    /// Run one classification, unless the loop is not running or a previous
    /// classification has not completed.
    pub async fn tick(&self) -> TickOutcome {
        if self.state() != LoopState::Running {
            return TickOutcome::NotRunning;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.monitor.record_skipped_tick();
            return TickOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let result = self.classifier.classify().await;
        self.complete(result)
    }

    fn complete(&self, result: Result<Option<ConfidenceVector>, ClassifierError>) -> TickOutcome {
        let mut inner = self.lock_inner();
        if inner.state != LoopState::Running {
            return TickOutcome::Discarded;
        }

        match result {
            Ok(None) => {
                self.monitor.record_no_face();
                self.emit(DetectionEvent::NoFace);
                TickOutcome::NoFace
            }
            Ok(Some(confidences)) => {
                let label = label(&confidences);
                let sample = DetectionSample::new(
                    label.emotion,
                    label.confidence_percent,
                    inner.session.session_id(),
                    None,
                );
                inner.session.aggregator_mut().record(label.emotion);
                self.monitor.record_classified();
                tracing::debug!(
                    emotion = %label.emotion,
                    mood = %label.mood,
                    confidence = label.confidence_percent,
                    "Frame labeled"
                );
                self.emit(DetectionEvent::Detected(sample.clone()));
                self.spawn_persist(sample.clone());
                TickOutcome::Detected(sample)
            }
            Err(ClassifierError::SourceLost(reason)) => {
                tracing::warn!(%reason, "Frame source lost, stopping session");
                self.shutdown(&mut inner, StopReason::SourceLost(reason));
                TickOutcome::SourceLost
            }
            Err(e) => {
                tracing::warn!(error = %e, "Detection tick failed");
                self.monitor.record_tick_failure();
                self.emit(DetectionEvent::TickFailed(e.to_string()));
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    fn spawn_persist(&self, sample: DetectionSample) {
        let sink = Arc::clone(&self.sink);
        let monitor = Arc::clone(&self.monitor);
        let events = self.events_tx.clone();

        self.persist_tasks.spawn(async move {
            let outcome = sink.persist(&sample).await;
            if outcome.is_stored() {
                monitor.record_persisted();
            } else {
                monitor.record_persist_failure();
                tracing::debug!(?outcome, "Detection not persisted");
            }
            let _ = events.try_send(DetectionEvent::Persisted(outcome));
        });
    }

    /// Drive ticks on the configured period until the session stops.
    ///
    /// Each period fires its tick as a separate task, so a slow classifier
    /// never delays the schedule; the in-flight guard drops the overlap.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Detection schedule cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.tick().await;
                    });
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run())
    }

    /// Stop the session: cancel the schedule and release the device.
    ///
    /// Calling this again is a no-op.
    pub fn stop(&self) {
        let mut inner = self.lock_inner();
        self.shutdown(&mut inner, StopReason::Requested);
    }

    /// Wait for outstanding persistence calls. Only meaningful after stop.
    pub async fn wait_for_persistence(&self) {
        self.persist_tasks.close();
        self.persist_tasks.wait().await;
    }

    fn shutdown(&self, inner: &mut Inner, reason: StopReason) {
        if inner.state == LoopState::Stopped {
            return;
        }
        inner.state = LoopState::Stopped;
        self.cancel.cancel();
        self.lock_device().close();

        tracing::info!(
            session_id = inner.session.session_id(),
            detections = inner.session.aggregator().total(),
            ?reason,
            "Detection session stopped"
        );
        self.emit(DetectionEvent::Stopped(reason));
    }

    fn emit(&self, event: DetectionEvent) {
        if let Err(TrySendError::Full(event)) = self.events_tx.try_send(event) {
            tracing::trace!(?event, "Event buffer full, dropping event");
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_device(&self) -> MutexGuard<'_, Box<dyn CaptureDevice>> {
        self.device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::EmotionKind;
    use crate::gateway::PersistenceGateway;
    use crate::store::{MemoryStore, RecordFilter, RecordStore};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    type Script = VecDeque<Result<Option<ConfidenceVector>, ClassifierError>>;

    /// Classifier driven by a script; optionally blocks each call on a gate.
    #[derive(Default)]
    struct ScriptedClassifier {
        script: Mutex<Script>,
        not_ready_for: AtomicUsize,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedClassifier {
        fn new(script: Vec<Result<Option<ConfidenceVector>, ClassifierError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ExpressionClassifier for ScriptedClassifier {
        async fn ensure_ready(&self) -> Result<(), ClassifierError> {
            let remaining = self.not_ready_for.load(Ordering::SeqCst);
            if remaining > 0 {
                self.not_ready_for.store(remaining - 1, Ordering::SeqCst);
                return Err(ClassifierError::ModelUnavailable("loading".to_string()));
            }
            Ok(())
        }

        async fn classify(&self) -> Result<Option<ConfidenceVector>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }
    }

    #[derive(Clone, Default)]
    struct FakeDevice {
        deny: bool,
        open: Arc<AtomicBool>,
    }

    impl CaptureDevice for FakeDevice {
        fn open(&mut self) -> Result<(), AcquisitionError> {
            if self.deny {
                return Err(AcquisitionError("permission denied".to_string()));
            }
            self.open.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn close(&mut self) {
            self.open.store(false, Ordering::SeqCst);
        }
    }

    fn face(emotion: EmotionKind, score: f64) -> Result<Option<ConfidenceVector>, ClassifierError> {
        Ok(Some(ConfidenceVector::new([(emotion, score)]).unwrap()))
    }

    fn fast_config() -> ControllerConfig {
        ControllerConfig {
            poll_interval: Duration::from_millis(10),
            model_retry_backoff: Duration::from_millis(1),
            model_retry_attempts: 5,
        }
    }

    fn controller(
        classifier: ScriptedClassifier,
        device: FakeDevice,
    ) -> DetectionLoopController<ScriptedClassifier, PersistenceGateway<Arc<MemoryStore>>> {
        controller_with_store(classifier, device, Arc::new(MemoryStore::new()))
    }

    fn controller_with_store(
        classifier: ScriptedClassifier,
        device: FakeDevice,
        store: Arc<MemoryStore>,
    ) -> DetectionLoopController<ScriptedClassifier, PersistenceGateway<Arc<MemoryStore>>> {
        DetectionLoopController::new(
            SessionContext::with_id("test-session"),
            classifier,
            device,
            PersistenceGateway::new(store),
            fast_config(),
        )
    }

    #[tokio::test]
    async fn test_tick_before_start_is_noop() {
        let ctl = controller(
            ScriptedClassifier::new(vec![face(EmotionKind::Happy, 0.9)]),
            FakeDevice::default(),
        );
        assert_eq!(ctl.tick().await, TickOutcome::NotRunning);
        assert_eq!(ctl.detections(), 0);
    }

    #[tokio::test]
    async fn test_detection_updates_histogram_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let ctl = controller_with_store(
            ScriptedClassifier::new(vec![face(EmotionKind::Happy, 0.9), Ok(None)]),
            FakeDevice::default(),
            Arc::clone(&store),
        );
        ctl.start().await.unwrap();

        let first = ctl.tick().await;
        assert!(matches!(first, TickOutcome::Detected(ref s) if s.dominant_emotion() == EmotionKind::Happy));
        assert_eq!(ctl.tick().await, TickOutcome::NoFace);
        assert_eq!(ctl.detections(), 1);

        ctl.stop();
        ctl.wait_for_persistence().await;
        let records = store.find(&RecordFilter::session("test-session")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].confidence, 90.0);
        assert_eq!(ctl.monitor().stats().records_persisted, 1);
    }

    #[tokio::test]
    async fn test_overlapping_ticks_run_one_classification() {
        let gate = Arc::new(Notify::new());
        let ctl = controller(
            ScriptedClassifier::new(vec![face(EmotionKind::Sad, 0.7), face(EmotionKind::Sad, 0.7)])
                .gated(Arc::clone(&gate)),
            FakeDevice::default(),
        );
        ctl.start().await.unwrap();

        let first = ctl.tick();
        let second = async {
            tokio::task::yield_now().await;
            let outcome = ctl.tick().await;
            gate.notify_one();
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, TickOutcome::Detected(_)));
        assert_eq!(second, TickOutcome::Skipped);
        assert_eq!(ctl.classifier.calls(), 1);
        assert_eq!(ctl.detections(), 1);
        assert_eq!(ctl.monitor().stats().skipped_ticks, 1);
    }

    #[tokio::test]
    async fn test_stop_discards_in_flight_result() {
        let gate = Arc::new(Notify::new());
        let store = Arc::new(MemoryStore::new());
        let ctl = controller_with_store(
            ScriptedClassifier::new(vec![face(EmotionKind::Angry, 0.8)]).gated(Arc::clone(&gate)),
            FakeDevice::default(),
            Arc::clone(&store),
        );
        ctl.start().await.unwrap();

        let pending = ctl.tick();
        let stopper = async {
            tokio::task::yield_now().await;
            ctl.stop();
            gate.notify_one();
        };
        let (outcome, ()) = tokio::join!(pending, stopper);

        assert_eq!(outcome, TickOutcome::Discarded);
        assert_eq!(ctl.detections(), 0);
        ctl.wait_for_persistence().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_releases_device() {
        let device = FakeDevice::default();
        let ctl = controller(ScriptedClassifier::new(vec![]), device.clone());
        ctl.start().await.unwrap();
        assert!(device.open.load(Ordering::SeqCst));

        ctl.stop();
        ctl.stop();
        assert_eq!(ctl.state(), LoopState::Stopped);
        assert!(!device.open.load(Ordering::SeqCst));

        let stops = ctl
            .events()
            .try_iter()
            .filter(|e| matches!(e, DetectionEvent::Stopped(_)))
            .count();
        assert_eq!(stops, 1);
        assert!(matches!(ctl.start().await, Err(ControllerError::NotIdle(LoopState::Stopped))));
    }

    #[tokio::test]
    async fn test_no_ticks_after_stop() {
        let store = Arc::new(MemoryStore::new());
        let script = (0..1000).map(|_| face(EmotionKind::Neutral, 0.6)).collect();
        let ctl = Arc::new(controller_with_store(
            ScriptedClassifier::new(script),
            FakeDevice::default(),
            Arc::clone(&store),
        ));
        ctl.start().await.unwrap();

        let handle = ctl.spawn();
        tokio::time::sleep(Duration::from_millis(60)).await;
        ctl.stop();
        handle.await.unwrap();

        let detections = ctl.detections();
        let calls = ctl.classifier.calls();
        assert!(detections > 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(ctl.detections(), detections);
        assert_eq!(ctl.classifier.calls(), calls);
        assert_eq!(ctl.tick().await, TickOutcome::NotRunning);

        ctl.wait_for_persistence().await;
        assert_eq!(store.len() as u64, detections);
    }

    #[tokio::test]
    async fn test_acquisition_failure_keeps_idle() {
        let device = FakeDevice {
            deny: true,
            ..FakeDevice::default()
        };
        let ctl = controller(ScriptedClassifier::new(vec![]), device);
        assert!(matches!(ctl.start().await, Err(ControllerError::Acquisition(_))));
        assert_eq!(ctl.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn test_start_waits_for_model() {
        let classifier = ScriptedClassifier::new(vec![]);
        classifier.not_ready_for.store(3, Ordering::SeqCst);
        let ctl = controller(classifier, FakeDevice::default());
        ctl.start().await.unwrap();
        assert_eq!(ctl.state(), LoopState::Running);
    }

    #[tokio::test]
    async fn test_start_gives_up_when_model_never_loads() {
        let classifier = ScriptedClassifier::new(vec![]);
        classifier.not_ready_for.store(100, Ordering::SeqCst);
        let device = FakeDevice::default();
        let ctl = controller(classifier, device.clone());

        let err = ctl.start().await.unwrap_err();
        assert!(matches!(err, ControllerError::ModelUnavailable { attempts: 5, .. }));
        assert_eq!(ctl.state(), LoopState::Idle);
        assert!(!device.open.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_tick_failure_is_recovered() {
        let ctl = controller(
            ScriptedClassifier::new(vec![
                Err(ClassifierError::Inference("blurry frame".to_string())),
                face(EmotionKind::Surprised, 0.5),
            ]),
            FakeDevice::default(),
        );
        ctl.start().await.unwrap();

        assert!(matches!(ctl.tick().await, TickOutcome::Failed(_)));
        assert!(matches!(ctl.tick().await, TickOutcome::Detected(_)));
        assert_eq!(ctl.state(), LoopState::Running);
        assert_eq!(ctl.monitor().stats().tick_failures, 1);
    }

    #[tokio::test]
    async fn test_model_loss_mid_session_is_transient() {
        let ctl = controller(
            ScriptedClassifier::new(vec![
                face(EmotionKind::Happy, 0.6),
                Err(ClassifierError::ModelUnavailable("reloading".to_string())),
                face(EmotionKind::Happy, 0.7),
            ]),
            FakeDevice::default(),
        );
        ctl.start().await.unwrap();

        assert!(matches!(ctl.tick().await, TickOutcome::Detected(_)));
        assert!(matches!(
            ctl.tick().await,
            TickOutcome::Failed(ref reason) if reason.contains("reloading")
        ));
        assert_eq!(ctl.state(), LoopState::Running);
        assert!(matches!(ctl.tick().await, TickOutcome::Detected(_)));

        assert_eq!(ctl.detections(), 2);
        assert_eq!(ctl.monitor().stats().tick_failures, 1);
        assert!(ctl
            .events()
            .try_iter()
            .any(|e| matches!(e, DetectionEvent::TickFailed(_))));
    }

    /// Sink that holds each write until released, then reports an outage.
    struct StalledSink(Arc<Notify>);

    impl DetectionSink for StalledSink {
        async fn persist(&self, _sample: &DetectionSample) -> PersistOutcome {
            self.0.notified().await;
            PersistOutcome::Unavailable("store offline".to_string())
        }
    }

    #[tokio::test]
    async fn test_persist_outcome_after_stop_is_delivered() {
        let release = Arc::new(Notify::new());
        let ctl = DetectionLoopController::new(
            SessionContext::with_id("late"),
            ScriptedClassifier::new(vec![face(EmotionKind::Angry, 0.8)]),
            FakeDevice::default(),
            StalledSink(Arc::clone(&release)),
            fast_config(),
        );
        ctl.start().await.unwrap();
        assert!(matches!(ctl.tick().await, TickOutcome::Detected(_)));

        ctl.stop();
        release.notify_one();
        ctl.wait_for_persistence().await;

        let events: Vec<_> = ctl.events().try_iter().collect();
        let stopped = events
            .iter()
            .position(|e| matches!(e, DetectionEvent::Stopped(_)))
            .unwrap();
        let persisted = events
            .iter()
            .position(|e| matches!(e, DetectionEvent::Persisted(PersistOutcome::Unavailable(_))))
            .unwrap();
        assert!(stopped < persisted);
        assert_eq!(ctl.monitor().stats().persist_failures, 1);
    }

    #[tokio::test]
    async fn test_source_lost_stops_session() {
        let ctl = controller(
            ScriptedClassifier::new(vec![Err(ClassifierError::SourceLost("eof".to_string()))]),
            FakeDevice::default(),
        );
        ctl.start().await.unwrap();
        assert_eq!(ctl.tick().await, TickOutcome::SourceLost);
        assert_eq!(ctl.state(), LoopState::Stopped);
    }
}
