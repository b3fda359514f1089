//! Single-subject tracking continuity.
//!
//! The tracker holds at most one current subject. A subject that is still
//! present in the body frame is kept; otherwise the tracked body closest to
//! the sensor becomes current. The handle is only cleared by an explicit
//! loss notification from the face source.

use crate::source::types::{Body, TrackingId};
use tracing::info;

/// Result of feeding one body frame to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerUpdate {
    /// The current subject is still present
    Kept(TrackingId),
    /// A new subject was selected by nearest-body search
    Acquired(TrackingId),
    /// No current subject could be resolved and no candidate was found
    Unresolved,
}

/// Tracks the one subject whose face drives the pipeline.
#[derive(Debug, Default)]
pub struct SubjectTracker {
    current: Option<TrackingId>,
    searches: u64,
}

impl SubjectTracker {
    /// Create a tracker with no subject.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current subject, if any.
    pub fn current(&self) -> Option<TrackingId> {
        self.current
    }

    /// Number of nearest-body searches run so far.
    pub fn search_count(&self) -> u64 {
        self.searches
    }

    /// Process a body frame.
    pub fn update(&mut self, bodies: &[Body]) -> TrackerUpdate {
        if let Some(id) = self.current {
            if find_body_with_tracking_id(bodies, id).is_some() {
                return TrackerUpdate::Kept(id);
            }
        }

        self.searches += 1;
        match find_closest_body(bodies) {
            Some(body) => {
                let id = body.tracking_id;
                self.current = Some(id);
                info!(
                    tracking_id = id,
                    distance_m = body.root.distance_from_origin(),
                    "Subject acquired"
                );
                TrackerUpdate::Acquired(id)
            }
            None => TrackerUpdate::Unresolved,
        }
    }

    /// Handle a loss notification. Returns true if the current subject was cleared.
    pub fn on_tracking_lost(&mut self, tracking_id: TrackingId) -> bool {
        if self.current == Some(tracking_id) {
            self.current = None;
            info!(tracking_id, "Subject lost");
            true
        } else {
            false
        }
    }

    /// Whether a face frame for `tracking_id` belongs to the current subject.
    pub fn accepts(&self, tracking_id: TrackingId) -> bool {
        self.current == Some(tracking_id)
    }
}

/// Find the tracked body whose root joint is closest to the sensor.
///
/// Ties go to the body encountered first.
pub fn find_closest_body(bodies: &[Body]) -> Option<&Body> {
    let mut closest: Option<(&Body, f64)> = None;
    for body in bodies.iter().filter(|b| b.is_tracked) {
        let distance = body.root.distance_from_origin();
        match closest {
            Some((_, best)) if distance >= best => {}
            _ => closest = Some((body, distance)),
        }
    }
    closest.map(|(body, _)| body)
}

/// Find a tracked body by tracking id.
pub fn find_body_with_tracking_id(bodies: &[Body], tracking_id: TrackingId) -> Option<&Body> {
    bodies
        .iter()
        .find(|b| b.is_tracked && b.tracking_id == tracking_id)
}
