//! Frame sources for the face command agent.
//!
//! The body and face tracking subsystem is an external collaborator. This
//! module defines the events it reports and a replay source that delivers a
//! recorded event stream through a channel, one event at a time.

pub mod replay;
pub mod types;

// Re-export commonly used types
pub use replay::{parse_event_line, ReplayConfig, ReplaySource, SourceError};
pub use types::{
    AnimationUnits, Body, BodyFrame, CameraPoint, CollectionStatus, FaceAlignment, FaceFrame,
    FaceOrientation, SensorEvent, TrackingId,
};
