//! Core frame processing for the face command agent.
//!
//! This module contains:
//! - Subject tracking across body frames
//! - Feature extraction from face alignments
//! - The training/inference mode gate and training log recorder
//! - Command selection and the per-frame pipeline

pub mod capture;
pub mod features;
pub mod mode;
pub mod pipeline;
pub mod recorder;
pub mod selector;
pub mod tracker;

// Re-export commonly used types
pub use capture::{CancelReason, CaptureBuilder, CaptureState};
pub use features::{extract_features, FeatureVector, FrameFeatures, FEATURE_COUNT, FEATURE_NAMES};
pub use mode::Mode;
pub use pipeline::{DropReason, FrameOutcome, Pipeline, PipelineContext};
pub use recorder::{BoxedRecorder, Recorder, RecorderError, TrainingLabel};
pub use selector::{select_command, CommandIndex, CommandSelector, DispatchPolicy};
pub use tracker::{SubjectTracker, TrackerUpdate};
