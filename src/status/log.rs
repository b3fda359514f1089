//! Session counters and status line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Statistics for the current session.
#[derive(Debug)]
pub struct SessionStatus {
    session_id: Uuid,
    session_start: DateTime<Utc>,
    /// Sensor events taken off the frame source
    events_received: AtomicU64,
    /// Face frames logged or classified
    frames_processed: AtomicU64,
    /// Face frames skipped or failed
    frames_dropped: AtomicU64,
    /// Training rows written to both logs
    rows_logged: AtomicU64,
    commands_dispatched: AtomicU64,
    /// OSC messages that could not be sent
    send_failures: AtomicU64,
    classifier_failures: AtomicU64,
    persistence_failures: AtomicU64,
    status_line: Mutex<String>,
    persist_path: Option<PathBuf>,
}

impl SessionStatus {
    /// Start a new session.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            session_start: Utc::now(),
            events_received: AtomicU64::new(0),
            frames_processed: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            rows_logged: AtomicU64::new(0),
            commands_dispatched: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            classifier_failures: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            status_line: Mutex::new(String::new()),
            persist_path: None,
        }
    }

    /// Start a new session that is saved to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut status = Self::new();
        status.persist_path = Some(path);
        status
    }

    /// Unique id of this session.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Record a sensor event taken off the source.
    pub fn record_event(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a face frame that was logged or classified.
    pub fn record_frame_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a face frame that was skipped or failed.
    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a training row.
    pub fn record_row_logged(&self) {
        self.rows_logged.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a command sent to the listener.
    pub fn record_command_dispatched(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `count` unsent OSC messages.
    pub fn record_send_failures(&self, count: u64) {
        self.send_failures.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a failed classification.
    pub fn record_classifier_failure(&self) {
        self.classifier_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a training log write failure.
    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Replace the operator-facing status line.
    pub fn set_status_line(&self, line: impl Into<String>) {
        let mut guard = self.status_line.lock().unwrap_or_else(|e| e.into_inner());
        *guard = line.into();
    }

    /// Current operator-facing status line.
    pub fn status_line(&self) -> String {
        self.status_line
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            session_id: self.session_id,
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
            events_received: self.events_received.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            rows_logged: self.rows_logged.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            classifier_failures: self.classifier_failures.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            status_line: self.status_line(),
            last_updated: Utc::now(),
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        self.snapshot().summary()
    }

    /// Save the snapshot to disk, if persistence is configured.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json =
                serde_json::to_string_pretty(&self.snapshot()).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the session status, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub session_id: Uuid,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
    pub events_received: u64,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub rows_logged: u64,
    pub commands_dispatched: u64,
    pub send_failures: u64,
    pub classifier_failures: u64,
    pub persistence_failures: u64,
    pub status_line: String,
    pub last_updated: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Read a snapshot saved by a running or finished agent.
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    /// Render for display.
    pub fn summary(&self) -> String {
        format!(
            "Session {}:\n\
             - Started: {}\n\
             - Duration: {} seconds\n\
             - Events received: {}\n\
             - Frames processed: {}\n\
             - Frames dropped: {}\n\
             - Training rows logged: {}\n\
             - Commands dispatched: {}\n\
             - Send failures: {}\n\
             - Classifier failures: {}\n\
             - Persistence failures: {}\n\
             \n\
             {}",
            self.session_id,
            self.session_start.format("%Y-%m-%d %H:%M:%S UTC"),
            self.session_duration_secs,
            self.events_received,
            self.frames_processed,
            self.frames_dropped,
            self.rows_logged,
            self.commands_dispatched,
            self.send_failures,
            self.classifier_failures,
            self.persistence_failures,
            self.status_line
        )
    }
}

/// Thread-safe shared session status.
pub type SharedSessionStatus = Arc<SessionStatus>;

/// Create a new shared session status.
pub fn create_shared_status() -> SharedSessionStatus {
    Arc::new(SessionStatus::new())
}

/// Create a new shared session status with persistence.
pub fn create_shared_status_with_persistence(path: PathBuf) -> SharedSessionStatus {
    Arc::new(SessionStatus::with_persistence(path))
}
