//! Detection loop counters.
//!
//! Counters are atomics so the loop, its spawned persistence tasks and a
//! status reader can share one monitor without locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outcome counters for detection sessions.
#[derive(Debug)]
pub struct LoopMonitor {
    /// Frames that produced a labeled detection
    frames_classified: AtomicU64,
    /// Frames where no face was found
    no_face_frames: AtomicU64,
    /// Ticks dropped because a classification was still in flight
    skipped_ticks: AtomicU64,
    /// Ticks whose classification failed
    tick_failures: AtomicU64,
    /// Detections the store accepted
    records_persisted: AtomicU64,
    /// Detections the store rejected or could not receive
    persist_failures: AtomicU64,
    /// When this monitor started counting
    started_at: DateTime<Utc>,
    /// Path for persisting cumulative counters
    persist_path: Option<PathBuf>,
}

impl LoopMonitor {
    pub fn new() -> Self {
        Self {
            frames_classified: AtomicU64::new(0),
            no_face_frames: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
            tick_failures: AtomicU64::new(0),
            records_persisted: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a monitor that continues from counters saved at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut monitor = Self::new();
        monitor.persist_path = Some(path);

        if let Err(e) = monitor.load() {
            tracing::warn!(error = %e, "Could not load previous loop counters");
        }

        monitor
    }

    pub fn record_classified(&self) {
        self.frames_classified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_face(&self) {
        self.no_face_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_tick(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_failure(&self) {
        self.tick_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persisted(&self) {
        self.records_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> LoopStats {
        LoopStats {
            frames_classified: self.frames_classified.load(Ordering::Relaxed),
            no_face_frames: self.no_face_frames.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            tick_failures: self.tick_failures.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Detection Statistics:\n\
             - Frames classified: {}\n\
             - Frames without a face: {}\n\
             - Ticks skipped (classification in flight): {}\n\
             - Tick failures: {}\n\
             - Records persisted: {}\n\
             - Persistence failures: {}\n\
             - Uptime: {} seconds",
            stats.frames_classified,
            stats.no_face_frames,
            stats.skipped_ticks,
            stats.tick_failures,
            stats.records_persisted,
            stats.persist_failures,
            stats.uptime_secs
        )
    }

    /// Write cumulative counters to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedCounters {
                frames_classified: stats.frames_classified,
                no_face_frames: stats.no_face_frames,
                skipped_ticks: stats.skipped_ticks,
                tick_failures: stats.tick_failures,
                records_persisted: stats.records_persisted,
                persist_failures: stats.persist_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedCounters =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_classified
                    .store(persisted.frames_classified, Ordering::Relaxed);
                self.no_face_frames
                    .store(persisted.no_face_frames, Ordering::Relaxed);
                self.skipped_ticks
                    .store(persisted.skipped_ticks, Ordering::Relaxed);
                self.tick_failures
                    .store(persisted.tick_failures, Ordering::Relaxed);
                self.records_persisted
                    .store(persisted.records_persisted, Ordering::Relaxed);
                self.persist_failures
                    .store(persisted.persist_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for LoopMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopStats {
    pub frames_classified: u64,
    pub no_face_frames: u64,
    pub skipped_ticks: u64,
    pub tick_failures: u64,
    pub records_persisted: u64,
    pub persist_failures: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCounters {
    frames_classified: u64,
    no_face_frames: u64,
    skipped_ticks: u64,
    tick_failures: u64,
    records_persisted: u64,
    persist_failures: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared monitor.
pub type SharedLoopMonitor = Arc<LoopMonitor>;

pub fn create_shared_monitor() -> SharedLoopMonitor {
    Arc::new(LoopMonitor::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let monitor = LoopMonitor::new();
        monitor.record_classified();
        monitor.record_classified();
        monitor.record_no_face();
        monitor.record_persist_failure();

        let stats = monitor.stats();
        assert_eq!(stats.frames_classified, 2);
        assert_eq!(stats.no_face_frames, 1);
        assert_eq!(stats.persist_failures, 1);
        assert_eq!(stats.records_persisted, 0);
    }

    #[test]
    fn test_counters_persist_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.json");

        let first = LoopMonitor::with_persistence(path.clone());
        first.record_classified();
        first.record_persisted();
        first.save().unwrap();

        let second = LoopMonitor::with_persistence(path);
        second.record_classified();
        let stats = second.stats();
        assert_eq!(stats.frames_classified, 2);
        assert_eq!(stats.records_persisted, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = LoopMonitor::new().summary();
        assert!(summary.contains("Frames classified"));
        assert!(summary.contains("Persistence failures"));
    }
}
