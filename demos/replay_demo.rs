//! Demonstration of a detection session over recorded classifier output.
//!
//! This example shows how to:
//! 1. Replay frames through the detection loop
//! 2. Watch loop events as they happen
//! 3. Read the live session distribution
//! 4. Query aggregate statistics from the stored records
//!
//! Run with: cargo run --example replay_demo

use std::sync::Arc;
use std::time::Duration;

use mood_detector::{
    core::{StatsFilter, StatsQueryEngine},
    detection::{replay_file, ControllerConfig, DetectionEvent, DetectionLoopController},
    gateway::PersistenceGateway,
    store::MemoryStore,
    SessionContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Mood Detector - Replay Demo");
    println!("===========================");
    println!();

    let frames = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/frames.jsonl");
    let store = Arc::new(MemoryStore::new());
    let (device, classifier) = replay_file(frames);

    let config = ControllerConfig {
        poll_interval: Duration::from_millis(100),
        ..ControllerConfig::default()
    };
    let controller = Arc::new(DetectionLoopController::new(
        SessionContext::new(),
        classifier,
        device,
        PersistenceGateway::new(Arc::clone(&store)),
        config,
    ));

    println!("Session: {}", controller.session_id());
    println!();

    controller.start().await?;
    controller.spawn().await?;
    controller.wait_for_persistence().await;

    for event in controller.events().try_iter() {
        match event {
            DetectionEvent::Detected(sample) => println!(
                "  {:<10} {:>6.2}%  {}",
                sample.dominant_emotion(),
                sample.confidence_percent(),
                sample.mood()
            ),
            DetectionEvent::NoFace => println!("  (no face)"),
            DetectionEvent::Stopped(reason) => println!("  stopped: {reason:?}"),
            _ => {}
        }
    }

    println!();
    println!("Session distribution:");
    for share in controller.snapshot() {
        println!("  {:<10} {:>3}  {:>5.1}%", share.emotion, share.count, share.percentage);
    }

    let queries = StatsQueryEngine::new(store);
    let stats = queries.compute_stats(&StatsFilter::session(controller.session_id()))?;
    println!();
    println!("Stored statistics:");
    println!("{}", serde_json::to_string_pretty(&stats)?);

    println!();
    println!("{}", controller.monitor().summary());

    Ok(())
}
