//! Face model capture lifecycle.
//!
//! The face model builder is an external collaborator; this module only
//! follows its lifecycle. A capture moves IDLE → CAPTURING and leaves
//! CAPTURING through exactly one of COMPLETE or CANCELLED. The in-progress
//! session is owned by the `Capturing` state, so every exit transition
//! releases it.

use crate::source::types::{CollectionStatus, TrackingId};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Why a capture ended without producing a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The subject being captured was lost
    TrackingLost,
    /// A new capture was started over this one
    Restarted,
    /// The agent is shutting down
    Shutdown,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::TrackingLost => "tracking lost",
            CancelReason::Restarted => "restarted",
            CancelReason::Shutdown => "shutdown",
        }
    }
}

/// Per-capture state held while the builder is collecting views.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSession {
    pub tracking_id: Option<TrackingId>,
    pub started_at: DateTime<Utc>,
    pub collection: Option<CollectionStatus>,
    pub progress_updates: u32,
}

/// Capture lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Capturing(CaptureSession),
    Complete { completed_at: DateTime<Utc> },
    Cancelled { reason: CancelReason },
}

/// Follows the face model builder through one capture at a time.
#[derive(Debug)]
pub struct CaptureBuilder {
    state: CaptureState,
}

impl Default for CaptureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBuilder {
    /// Create an idle builder.
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Whether a capture is running.
    pub fn is_capturing(&self) -> bool {
        matches!(self.state, CaptureState::Capturing(_))
    }

    /// Begin a capture for the given subject, cancelling any capture in progress.
    pub fn start(&mut self, tracking_id: Option<TrackingId>) {
        if self.is_capturing() {
            self.cancel(CancelReason::Restarted);
        }
        info!(?tracking_id, "Face capture started");
        self.state = CaptureState::Capturing(CaptureSession {
            tracking_id,
            started_at: Utc::now(),
            collection: None,
            progress_updates: 0,
        });
    }

    /// Record builder progress. Ignored unless a capture is running.
    pub fn on_progress(&mut self, status: CollectionStatus) {
        if let CaptureState::Capturing(session) = &mut self.state {
            session.collection = Some(status);
            session.progress_updates += 1;
            debug!(status = status.as_str(), "Face capture progress");
        }
    }

    /// Finish the running capture. Returns false if nothing was being captured.
    pub fn complete(&mut self) -> bool {
        if !self.is_capturing() {
            return false;
        }
        self.state = CaptureState::Complete {
            completed_at: Utc::now(),
        };
        info!("Face capture complete");
        true
    }

    /// Abandon the running capture. Returns false if nothing was being captured.
    pub fn cancel(&mut self, reason: CancelReason) -> bool {
        if !self.is_capturing() {
            return false;
        }
        self.state = CaptureState::Cancelled { reason };
        info!(reason = reason.as_str(), "Face capture cancelled");
        true
    }

    /// Operator-facing description of the builder state.
    pub fn status_text(&self) -> String {
        match &self.state {
            CaptureState::Idle => "Ready To Start Capture".to_string(),
            CaptureState::Capturing(session) => match session.collection {
                Some(status) => format!("Collecting, {}", status.as_str()),
                None => "Collecting".to_string(),
            },
            CaptureState::Complete { .. } => "Capture Complete".to_string(),
            CaptureState::Cancelled { reason } => {
                format!("Capture Cancelled ({})", reason.as_str())
            }
        }
    }
}
