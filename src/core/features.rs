//! Feature extraction from face alignment results.
//!
//! Each frame is reduced to six animation unit magnitudes, in the fixed
//! order the classifier was trained on, plus one orientation scalar used by
//! the override rule.

use crate::source::types::FaceAlignment;
use serde::{Deserialize, Serialize};

/// Number of scalars in a feature vector.
pub const FEATURE_COUNT: usize = 6;

/// Feature names in classifier input order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "jawOpen",
    "leftCheekPuff",
    "rightCheekPuff",
    "leftLipPull",
    "rightLipPull",
    "browLower",
];

/// The six animation magnitudes fed to the classifier.
///
/// Values are passed through as reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub jaw_open: f32,
    pub left_cheek_puff: f32,
    pub right_cheek_puff: f32,
    pub left_lip_pull: f32,
    pub right_lip_pull: f32,
    pub brow_lower: f32,
}

impl FeatureVector {
    /// Build a vector from values in classifier input order.
    pub fn from_array(values: [f32; FEATURE_COUNT]) -> Self {
        let [jaw_open, left_cheek_puff, right_cheek_puff, left_lip_pull, right_lip_pull, brow_lower] =
            values;
        Self {
            jaw_open,
            left_cheek_puff,
            right_cheek_puff,
            left_lip_pull,
            right_lip_pull,
            brow_lower,
        }
    }

    /// Values in classifier input order.
    pub fn to_array(&self) -> [f32; FEATURE_COUNT] {
        [
            self.jaw_open,
            self.left_cheek_puff,
            self.right_cheek_puff,
            self.left_lip_pull,
            self.right_lip_pull,
            self.brow_lower,
        ]
    }

    /// Format as one feature log row: `f0, f1, f2, f3, f4, f5`.
    pub fn to_log_line(&self) -> String {
        self.to_array()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Everything the pipeline needs from one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameFeatures {
    pub vector: FeatureVector,
    /// Head rotation proxy (x component of the orientation quaternion)
    pub orientation: f32,
}

/// Extract the feature vector and orientation scalar from an alignment.
pub fn extract_features(alignment: &FaceAlignment) -> FrameFeatures {
    let au = &alignment.animation_units;
    FrameFeatures {
        vector: FeatureVector {
            jaw_open: au.jaw_open,
            left_cheek_puff: au.left_cheek_puff,
            right_cheek_puff: au.right_cheek_puff,
            left_lip_pull: au.lip_corner_puller_left,
            right_lip_pull: au.lip_corner_puller_right,
            brow_lower: au.left_eyebrow_lowerer,
        },
        orientation: alignment.orientation.x,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::{AnimationUnits, FaceOrientation};

    fn alignment() -> FaceAlignment {
        FaceAlignment {
            animation_units: AnimationUnits {
                jaw_open: 0.1,
                left_cheek_puff: 0.2,
                right_cheek_puff: 0.3,
                lip_corner_puller_left: 0.4,
                lip_corner_puller_right: 0.5,
                left_eyebrow_lowerer: 0.6,
            },
            orientation: FaceOrientation {
                x: 0.25,
                y: -0.1,
                z: 0.0,
                w: 0.96,
            },
        }
    }

    #[test]
    fn test_extract_preserves_order() {
        let features = extract_features(&alignment());
        assert_eq!(features.vector.to_array(), [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(features.orientation, 0.25);
        assert!(features.vector.is_finite());
    }

    #[test]
    fn test_log_line_format() {
        let vector = FeatureVector::from_array([0.5, 0.0, 0.25, 1.0, -0.5, 0.125]);
        assert_eq!(vector.to_log_line(), "0.5, 0, 0.25, 1, -0.5, 0.125");
    }

    #[test]
    fn test_array_round_trip() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(FeatureVector::from_array(values).to_array(), values);
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
    }
}
