//! End-to-end: replayed frames through the detection loop into a store, then
//! queried back as statistics.

use mood_detector::core::{StatsFilter, StatsQueryEngine};
use mood_detector::detection::{
    replay_file, replay_frames, ConfidenceVector, ControllerConfig, DetectionEvent,
    DetectionLoopController, EmotionKind, LoopState, MoodKind, StopReason, TickOutcome,
};
use mood_detector::gateway::PersistenceGateway;
use mood_detector::store::{JsonlStore, MemoryStore};
use mood_detector::SessionContext;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn frame(emotion: EmotionKind, score: f64) -> Option<ConfidenceVector> {
    Some(ConfidenceVector::new([(emotion, score)]).unwrap())
}

fn fast_config() -> ControllerConfig {
    ControllerConfig {
        poll_interval: Duration::from_millis(10),
        model_retry_backoff: Duration::from_millis(1),
        model_retry_attempts: 3,
    }
}

#[tokio::test]
async fn test_session_histogram_and_stored_stats_agree() {
    let store = Arc::new(MemoryStore::new());
    let (device, classifier) = replay_frames(vec![
        frame(EmotionKind::Happy, 0.9),
        frame(EmotionKind::Happy, 0.8),
        None,
        frame(EmotionKind::Sad, 0.7),
    ]);
    let controller = DetectionLoopController::new(
        SessionContext::with_id("S1"),
        classifier,
        device,
        PersistenceGateway::new(Arc::clone(&store)),
        fast_config(),
    );

    controller.start().await.unwrap();
    assert!(matches!(controller.tick().await, TickOutcome::Detected(_)));
    assert!(matches!(controller.tick().await, TickOutcome::Detected(_)));
    assert_eq!(controller.tick().await, TickOutcome::NoFace);
    assert!(matches!(controller.tick().await, TickOutcome::Detected(_)));
    assert_eq!(controller.tick().await, TickOutcome::SourceLost);
    assert_eq!(controller.state(), LoopState::Stopped);

    controller.wait_for_persistence().await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].emotion, EmotionKind::Happy);
    assert_eq!(snapshot[0].count, 2);
    assert_eq!(snapshot[0].percentage, 66.7);
    assert_eq!(snapshot[1].emotion, EmotionKind::Sad);
    assert_eq!(snapshot[1].percentage, 33.3);

    let queries = StatsQueryEngine::new(Arc::clone(&store));
    let stats = queries.compute_stats(&StatsFilter::session("S1")).unwrap();
    assert_eq!(stats.total_detections, 3);
    assert_eq!(stats.emotion_count.get(EmotionKind::Happy), 2);
    assert_eq!(stats.emotion_count.get(EmotionKind::Sad), 1);
    assert_eq!(stats.average_confidence_percent, 80.0);
    assert_eq!(stats.top_emotion, Some(EmotionKind::Happy));
    assert_eq!(stats.top_mood, Some(MoodKind::Positive));

    let monitor = controller.monitor().stats();
    assert_eq!(monitor.frames_classified, 3);
    assert_eq!(monitor.no_face_frames, 1);
    assert_eq!(monitor.records_persisted, 3);

    let events: Vec<DetectionEvent> = controller.events().try_iter().collect();
    assert!(events.contains(&DetectionEvent::Stopped(StopReason::SourceLost(
        "replay exhausted".to_string()
    ))));
    let persisted = events
        .iter()
        .filter(|e| matches!(e, DetectionEvent::Persisted(outcome) if outcome.is_stored()))
        .count();
    assert_eq!(persisted, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scheduled_replay_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let frames_path = dir.path().join("frames.jsonl");
    let mut file = std::fs::File::create(&frames_path).unwrap();
    writeln!(file, r#"{{"happy": 0.9, "neutral": 0.1}}"#).unwrap();
    writeln!(file, "null").unwrap();
    writeln!(file, r#"{{"angry": 0.6, "disgusted": 0.6}}"#).unwrap();
    drop(file);

    let store_path = dir.path().join("records").join("emotions.jsonl");
    let (device, classifier) = replay_file(&frames_path);
    let controller = Arc::new(DetectionLoopController::new(
        SessionContext::new(),
        classifier,
        device,
        PersistenceGateway::new(JsonlStore::new(&store_path)),
        fast_config(),
    ));

    controller.start().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), controller.spawn())
        .await
        .expect("replay should exhaust and stop the session")
        .unwrap();
    controller.wait_for_persistence().await;

    assert_eq!(controller.state(), LoopState::Stopped);
    assert_eq!(controller.detections(), 2);

    let queries = StatsQueryEngine::new(JsonlStore::new(&store_path));
    let session_id = controller.session_id();
    let records = queries.list_session(&session_id).unwrap();
    assert_eq!(records.len(), 2);

    // angry and disgusted tie; angry comes first in vocabulary order
    let stats = queries.compute_stats(&StatsFilter::session(session_id)).unwrap();
    assert_eq!(stats.emotion_count.get(EmotionKind::Angry), 1);
    assert_eq!(stats.emotion_count.get(EmotionKind::Disgusted), 0);
    assert_eq!(stats.mood_count.get(MoodKind::Negative), 1);
}
