//! Mood Detector - facial-expression mood tracking.
//!
//! A detection session polls an expression classifier on a fixed schedule,
//! labels each frame with its dominant emotion and mood, keeps a live
//! per-session histogram and hands every detection to a best-effort
//! persistence sink. Persisted records can be queried for aggregate
//! statistics over a session, all time, or a trailing window.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Mood Detector                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────────┐      │
//! │  │ Classifier │──▶│  Labeler   │──▶│ SessionAggregator│      │
//! │  │  (device)  │   │ (argmax)   │   │   (histogram)    │      │
//! │  └────────────┘   └────────────┘   └──────────────────┘      │
//! │         ▲                │                                   │
//! │         │                ▼                                   │
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────────┐      │
//! │  │ Detection  │   │ Detection  │──▶│   RecordStore    │      │
//! │  │    Loop    │   │    Sink    │   │ (memory / jsonl) │      │
//! │  └────────────┘   └────────────┘   └──────────────────┘      │
//! │                                             │                │
//! │                                             ▼                │
//! │                                    ┌──────────────────┐      │
//! │                                    │ StatsQueryEngine │      │
//! │                                    └──────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mood_detector::detection::{replay_file, ControllerConfig, DetectionLoopController};
//! use mood_detector::gateway::PersistenceGateway;
//! use mood_detector::store::MemoryStore;
//! use mood_detector::SessionContext;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let (device, classifier) = replay_file("frames.jsonl");
//! let sink = PersistenceGateway::new(MemoryStore::new());
//! let controller = Arc::new(DetectionLoopController::new(
//!     SessionContext::new(),
//!     classifier,
//!     device,
//!     sink,
//!     ControllerConfig::default(),
//! ));
//!
//! controller.start().await?;
//! let handle = controller.spawn();
//! handle.await?;
//! println!("{:?}", controller.snapshot());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod detection;
pub mod gateway;
pub mod monitor;
pub mod store;

#[cfg(feature = "gateway")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{AggregateStats, EmotionShare, SessionAggregator, SessionContext, StatsQueryEngine};
pub use detection::{
    label, ConfidenceVector, DetectionLoopController, DetectionSample, EmotionKind, MoodKind,
};
pub use gateway::{DetectionSink, NewEmotion, PersistOutcome, PersistenceGateway};
pub use monitor::{LoopMonitor, LoopStats, SharedLoopMonitor};
pub use store::{EmotionRecord, JsonlStore, MemoryStore, RecordStore};

#[cfg(feature = "gateway")]
pub use client::{ApiClient, ApiConfig, ClientError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
