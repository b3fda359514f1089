//! Sensor event types for the face command agent.
//!
//! These mirror what the body and face tracking subsystem reports once per
//! frame. They are also the on-disk format of a recorded frame stream, one
//! JSON object per line, tagged by `"type"`.

use serde::{Deserialize, Serialize};

/// Opaque identifier the sensor assigns to a tracked body.
pub type TrackingId = u64;

/// A point in camera space, in meters from the sensor origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl CameraPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance from the sensor origin.
    pub fn distance_from_origin(&self) -> f64 {
        let (x, y, z) = (self.x as f64, self.y as f64, self.z as f64);
        (x * x + y * y + z * z).sqrt()
    }
}

/// One body slot reported in a body frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Sensor-assigned tracking id
    pub tracking_id: TrackingId,
    /// Whether the sensor is actively tracking this slot
    pub is_tracked: bool,
    /// Position of the root (spine base) joint
    pub root: CameraPoint,
}

impl Body {
    pub fn tracked(tracking_id: TrackingId, root: CameraPoint) -> Self {
        Self {
            tracking_id,
            is_tracked: true,
            root,
        }
    }
}

/// All body slots reported for a single frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyFrame {
    pub bodies: Vec<Body>,
}

/// Animation unit magnitudes, named after the sensor's face shape animations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnimationUnits {
    pub jaw_open: f32,
    pub left_cheek_puff: f32,
    pub right_cheek_puff: f32,
    pub lip_corner_puller_left: f32,
    pub lip_corner_puller_right: f32,
    pub left_eyebrow_lowerer: f32,
}

/// Head orientation quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceOrientation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for FaceOrientation {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Result of aligning the face model to the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceAlignment {
    pub animation_units: AnimationUnits,
    #[serde(default)]
    pub orientation: FaceOrientation,
}

/// A high-definition face frame for one tracked subject.
///
/// `alignment` is `None` when the sensor could not track the face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceFrame {
    pub tracking_id: TrackingId,
    #[serde(default)]
    pub alignment: Option<FaceAlignment>,
}

/// What the face model builder still needs before it can finish a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    FrontViewFramesNeeded,
    LeftViewsNeeded,
    RightViewsNeeded,
    TiltedUpViewsNeeded,
    MoreFramesNeeded,
    Complete,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::FrontViewFramesNeeded => "FrontViewFramesNeeded",
            CollectionStatus::LeftViewsNeeded => "LeftViewsNeeded",
            CollectionStatus::RightViewsNeeded => "RightViewsNeeded",
            CollectionStatus::TiltedUpViewsNeeded => "TiltedUpViewsNeeded",
            CollectionStatus::MoreFramesNeeded => "MoreFramesNeeded",
            CollectionStatus::Complete => "Complete",
        }
    }
}

/// Unified event type delivered by a frame source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorEvent {
    /// Body frame used for subject selection
    Bodies(BodyFrame),
    /// Face frame for the subject the face source is locked to
    Face(FaceFrame),
    /// The face source lost the given subject
    TrackingLost { tracking_id: TrackingId },
    /// The face model builder began collecting views
    CaptureStarted,
    /// Periodic progress from the face model builder
    CaptureProgress { status: CollectionStatus },
    /// The face model builder produced a model
    CaptureCompleted,
}

impl SensorEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SensorEvent::Bodies(_) => "bodies",
            SensorEvent::Face(_) => "face",
            SensorEvent::TrackingLost { .. } => "tracking_lost",
            SensorEvent::CaptureStarted => "capture_started",
            SensorEvent::CaptureProgress { .. } => "capture_progress",
            SensorEvent::CaptureCompleted => "capture_completed",
        }
    }
}
