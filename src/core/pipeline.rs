//! Frame-sequential processing pipeline.
//!
//! One sensor event drives one pass:
//!
//! ```text
//! face frame ─▶ features ─▶ mode gate ─┬─ training ──▶ recorder
//!                                      └─ inference ─▶ classifier ─▶ selector ─▶ dispatcher
//! ```
//!
//! All state that crosses frames lives in [`PipelineContext`]. The pipeline is
//! owned by a single thread and handles events strictly in order, so frame N
//! has fully completed (or been dropped) before frame N+1 starts.

use crate::classifier::{active_positions, Classifier};
use crate::config::Config;
use crate::core::capture::{CancelReason, CaptureBuilder};
use crate::core::features::{extract_features, FrameFeatures};
use crate::core::mode::Mode;
use crate::core::recorder::{BoxedRecorder, RecorderError, TrainingLabel};
use crate::core::selector::{CommandIndex, CommandSelector};
use crate::core::tracker::{SubjectTracker, TrackerUpdate};
use crate::dispatch::CommandSink;
use crate::source::types::{FaceFrame, SensorEvent};
use crate::status::SharedSessionStatus;
use tracing::{debug, info, warn};

/// State carried from one frame to the next.
#[derive(Debug)]
pub struct PipelineContext {
    pub tracker: SubjectTracker,
    pub mode: Mode,
    pub training_label: TrainingLabel,
    /// Largest orientation seen in training frames since process start
    pub max_head_rotation: f32,
    pub capture: CaptureBuilder,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self {
            tracker: SubjectTracker::new(),
            mode: Mode::default(),
            training_label: TrainingLabel::default(),
            max_head_rotation: 0.0,
            capture: CaptureBuilder::new(),
        }
    }
}

/// Why a face frame did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No subject is being tracked
    NoSubject,
    /// The frame belongs to a subject other than the current one
    OtherSubject,
    /// The face source produced no alignment for this frame
    NoAlignment,
    /// Extracted features contained NaN or infinity
    NonFiniteFeatures,
    /// The classifier failed or returned an unusable response
    ClassifierFailed,
    /// Training logs could not be written
    RecorderFailed,
}

/// What one event did.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Bodies(TrackerUpdate),
    TrackingLost { cleared: bool },
    CaptureUpdated,
    Dropped(DropReason),
    /// A training row was written; carries the session row count
    Recorded { row: u64 },
    /// The classifier answered but no position was active
    NoActiveLabel,
    /// Commands sent for this frame, in order
    Dispatched(Vec<CommandIndex>),
}

/// Routes sensor events through tracking, the mode gate and dispatch.
pub struct Pipeline {
    context: PipelineContext,
    selector: CommandSelector,
    classifier: Box<dyn Classifier>,
    dispatcher: Box<dyn CommandSink>,
    recorder: Option<BoxedRecorder>,
    status: SharedSessionStatus,
}

impl Pipeline {
    /// Assemble a pipeline in the default mode with no subject.
    pub fn new(
        selector: CommandSelector,
        classifier: Box<dyn Classifier>,
        dispatcher: Box<dyn CommandSink>,
        recorder: Option<BoxedRecorder>,
        status: SharedSessionStatus,
    ) -> Self {
        status.set_status_line(CaptureBuilder::new().status_text());
        Self {
            context: PipelineContext::default(),
            selector,
            classifier,
            dispatcher,
            recorder,
            status,
        }
    }

    /// Cross-frame state.
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.context.mode
    }

    /// Switch modes. Takes effect from the next frame.
    pub fn set_mode(&mut self, mode: Mode) {
        if self.context.mode != mode {
            info!(%mode, "Mode changed");
            self.context.mode = mode;
            self.status.set_status_line(match mode {
                Mode::Training => "Training mode ON",
                Mode::Inference => "Training mode OFF",
            });
        }
    }

    /// Label attached to subsequent training rows.
    pub fn set_training_label(&mut self, label: TrainingLabel) {
        if self.context.training_label != label {
            info!(%label, "Training label changed");
            self.context.training_label = label;
        }
    }

    /// Head rotation above this value forces the override command.
    pub fn set_threshold(&mut self, threshold: f32) {
        if self.selector.head_rotation_threshold != threshold {
            info!(threshold, "Head rotation threshold changed");
            self.selector.head_rotation_threshold = threshold;
        }
    }

    /// Pick up operator settings from a reloaded config.
    pub fn apply_config(&mut self, config: &Config) {
        self.set_mode(config.mode);
        self.set_training_label(config.training_label);
        self.set_threshold(config.head_rotation_threshold);
        self.selector.policy = config.dispatch_policy;
    }

    /// Apply only the operator settings that differ between two versions of
    /// the config file, so settings made elsewhere survive a reload.
    pub fn apply_config_changes(&mut self, previous: &Config, current: &Config) {
        if current.mode != previous.mode {
            self.set_mode(current.mode);
        }
        if current.training_label != previous.training_label {
            self.set_training_label(current.training_label);
        }
        if current.head_rotation_threshold != previous.head_rotation_threshold {
            self.set_threshold(current.head_rotation_threshold);
        }
        if current.dispatch_policy != previous.dispatch_policy {
            self.selector.policy = current.dispatch_policy;
        }
    }

    /// Builder status line shown alongside the frame counters.
    pub fn status_line(&self) -> String {
        let tracking = self
            .context
            .tracker
            .current()
            .map_or_else(|| "none".to_string(), |id| id.to_string());
        format!(
            "Builder Status: {}, Current Tracking ID: {}",
            self.context.capture.status_text(),
            tracking
        )
    }

    /// Handle one sensor event.
    pub fn handle_event(&mut self, event: SensorEvent) -> FrameOutcome {
        self.status.record_event();
        match event {
            SensorEvent::Bodies(frame) => {
                FrameOutcome::Bodies(self.context.tracker.update(&frame.bodies))
            }
            SensorEvent::TrackingLost { tracking_id } => {
                let cleared = self.context.tracker.on_tracking_lost(tracking_id);
                if cleared {
                    self.context.capture.cancel(CancelReason::TrackingLost);
                    self.status.set_status_line(self.status_line());
                }
                FrameOutcome::TrackingLost { cleared }
            }
            SensorEvent::CaptureStarted => {
                let subject = self.context.tracker.current();
                self.context.capture.start(subject);
                self.capture_updated()
            }
            SensorEvent::CaptureProgress { status } => {
                self.context.capture.on_progress(status);
                self.capture_updated()
            }
            SensorEvent::CaptureCompleted => {
                self.context.capture.complete();
                self.capture_updated()
            }
            SensorEvent::Face(frame) => self.handle_face(frame),
        }
    }

    /// Release per-session resources before exit.
    pub fn shutdown(&mut self) {
        self.context.capture.cancel(CancelReason::Shutdown);
    }

    fn capture_updated(&mut self) -> FrameOutcome {
        self.status.set_status_line(self.status_line());
        FrameOutcome::CaptureUpdated
    }

    fn handle_face(&mut self, frame: FaceFrame) -> FrameOutcome {
        if self.context.tracker.current().is_none() {
            return self.drop_frame(DropReason::NoSubject);
        }
        if !self.context.tracker.accepts(frame.tracking_id) {
            return self.drop_frame(DropReason::OtherSubject);
        }
        let Some(alignment) = frame.alignment else {
            return self.drop_frame(DropReason::NoAlignment);
        };

        let features = extract_features(&alignment);
        if !features.vector.is_finite() || !features.orientation.is_finite() {
            return self.drop_frame(DropReason::NonFiniteFeatures);
        }

        match self.context.mode {
            Mode::Training => self.train(features),
            Mode::Inference => self.infer(features),
        }
    }

    fn train(&mut self, features: FrameFeatures) -> FrameOutcome {
        if features.orientation > self.context.max_head_rotation {
            self.context.max_head_rotation = features.orientation;
        }

        let result = match self.recorder.as_mut() {
            Some(recorder) => recorder.record(&features.vector, self.context.training_label),
            None => Err(RecorderError::Unavailable),
        };

        match result {
            Ok(row) => {
                self.status.record_frame_processed();
                self.status.record_row_logged();
                self.status.set_status_line(format!(
                    "Total Points logged: {row}\nCurrent: {:.3}\nMax: {:.3}",
                    features.orientation, self.context.max_head_rotation
                ));
                debug!(row, label = %self.context.training_label, "Training row logged");
                FrameOutcome::Recorded { row }
            }
            Err(e) => {
                warn!("Training row not logged: {e}");
                self.status.record_persistence_failure();
                self.status.set_status_line(format!("Logging failed: {e}"));
                self.drop_frame(DropReason::RecorderFailed)
            }
        }
    }

    fn infer(&mut self, features: FrameFeatures) -> FrameOutcome {
        let weights = match self.classifier.classify(&features.vector) {
            Ok(weights) => weights,
            Err(e) => {
                warn!(classifier = self.classifier.name(), "Classification failed: {e}");
                self.status.record_classifier_failure();
                return self.drop_frame(DropReason::ClassifierFailed);
            }
        };
        self.status.record_frame_processed();

        let positions = active_positions(&weights);
        let commands = self.selector.select_all(&positions, features.orientation);
        if commands.is_empty() {
            return FrameOutcome::NoActiveLabel;
        }

        for &command in &commands {
            let report = self.dispatcher.dispatch(command);
            self.status.record_command_dispatched();
            if report.failed > 0 {
                self.status.record_send_failures(report.failed as u64);
            }
            self.status.set_status_line(format!("Input: {command}"));
            debug!(%command, sent = report.sent, failed = report.failed, "Command dispatched");
        }
        FrameOutcome::Dispatched(commands)
    }

    fn drop_frame(&self, reason: DropReason) -> FrameOutcome {
        self.status.record_frame_dropped();
        debug!(?reason, "Frame dropped");
        FrameOutcome::Dropped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierError, LabelWeights, UnavailableClassifier, OUTPUT_COUNT};
    use crate::core::features::FeatureVector;
    use crate::core::recorder::Recorder;
    use crate::core::selector::DispatchPolicy;
    use crate::dispatch::DispatchReport;
    use crate::source::types::{
        AnimationUnits, Body, BodyFrame, CameraPoint, CollectionStatus, FaceAlignment,
        FaceOrientation,
    };
    use crate::status::create_shared_status;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<CommandIndex>>>);

    impl CommandSink for Recording {
        fn dispatch(&mut self, command: CommandIndex) -> DispatchReport {
            self.0.lock().unwrap().push(command);
            DispatchReport {
                sent: 8,
                failed: 0,
            }
        }
    }

    fn fixed(weights: LabelWeights) -> Box<dyn Classifier> {
        Box::new(move |_: &FeatureVector| -> Result<LabelWeights, ClassifierError> { Ok(weights) })
    }

    fn one_hot(position: usize) -> LabelWeights {
        let mut weights = [0.0; OUTPUT_COUNT];
        weights[position] = 0.98;
        weights
    }

    fn pipeline(classifier: Box<dyn Classifier>, sink: Recording) -> (Pipeline, SharedSessionStatus) {
        let status = create_shared_status();
        let pipeline = Pipeline::new(
            CommandSelector::new(0.3, DispatchPolicy::AllActive),
            classifier,
            Box::new(sink),
            None,
            status.clone(),
        );
        (pipeline, status)
    }

    fn bodies(ids: &[(u64, f32)]) -> SensorEvent {
        SensorEvent::Bodies(BodyFrame {
            bodies: ids
                .iter()
                .map(|&(id, z)| Body::tracked(id, CameraPoint::new(0.0, 0.0, z)))
                .collect(),
        })
    }

    fn face(tracking_id: u64, orientation_x: f32) -> SensorEvent {
        SensorEvent::Face(FaceFrame {
            tracking_id,
            alignment: Some(FaceAlignment {
                animation_units: AnimationUnits {
                    jaw_open: 0.4,
                    ..Default::default()
                },
                orientation: FaceOrientation {
                    x: orientation_x,
                    ..Default::default()
                },
            }),
        })
    }

    #[test]
    fn test_face_without_subject_is_dropped() {
        let sink = Recording::default();
        let (mut pipeline, status) = pipeline(fixed(one_hot(1)), sink.clone());

        let outcome = pipeline.handle_event(face(7, 0.0));
        assert_eq!(outcome, FrameOutcome::Dropped(DropReason::NoSubject));
        assert!(sink.0.lock().unwrap().is_empty());
        assert_eq!(status.snapshot().frames_dropped, 1);
    }

    #[test]
    fn test_inference_dispatches_selected_command() {
        let sink = Recording::default();
        let (mut pipeline, status) = pipeline(fixed(one_hot(5)), sink.clone());

        pipeline.handle_event(bodies(&[(7, 1.0)]));
        let outcome = pipeline.handle_event(face(7, 0.0));

        let five = CommandIndex::new(5).unwrap();
        assert_eq!(outcome, FrameOutcome::Dispatched(vec![five]));
        assert_eq!(*sink.0.lock().unwrap(), vec![five]);
        assert_eq!(status.status_line(), "Input: 5");
        assert_eq!(status.snapshot().commands_dispatched, 1);
    }

    #[test]
    fn test_head_rotation_override() {
        let sink = Recording::default();
        let (mut pipeline, _) = pipeline(fixed(one_hot(1)), sink.clone());

        pipeline.handle_event(bodies(&[(7, 1.0)]));
        pipeline.handle_event(face(7, 0.5));
        assert_eq!(*sink.0.lock().unwrap(), vec![CommandIndex::OVERRIDE]);
    }

    #[test]
    fn test_other_subject_is_dropped() {
        let sink = Recording::default();
        let (mut pipeline, _) = pipeline(fixed(one_hot(1)), sink.clone());

        pipeline.handle_event(bodies(&[(7, 1.0), (8, 2.0)]));
        let outcome = pipeline.handle_event(face(8, 0.0));
        assert_eq!(outcome, FrameOutcome::Dropped(DropReason::OtherSubject));
    }

    #[test]
    fn test_classifier_failure_drops_frame() {
        let sink = Recording::default();
        let (mut pipeline, status) = pipeline(
            Box::new(UnavailableClassifier::new("offline")),
            sink.clone(),
        );

        pipeline.handle_event(bodies(&[(7, 1.0)]));
        let outcome = pipeline.handle_event(face(7, 0.0));
        assert_eq!(outcome, FrameOutcome::Dropped(DropReason::ClassifierFailed));
        assert!(sink.0.lock().unwrap().is_empty());
        assert_eq!(status.snapshot().classifier_failures, 1);
    }

    #[test]
    fn test_no_active_label() {
        let sink = Recording::default();
        let (mut pipeline, _) = pipeline(fixed([0.1; OUTPUT_COUNT]), sink.clone());

        pipeline.handle_event(bodies(&[(7, 1.0)]));
        assert_eq!(pipeline.handle_event(face(7, 0.0)), FrameOutcome::NoActiveLabel);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_training_without_recorder_surfaces_failure() {
        let sink = Recording::default();
        let (mut pipeline, status) = pipeline(fixed(one_hot(1)), sink.clone());
        pipeline.set_mode(Mode::Training);

        pipeline.handle_event(bodies(&[(7, 1.0)]));
        let outcome = pipeline.handle_event(face(7, 0.2));
        assert_eq!(outcome, FrameOutcome::Dropped(DropReason::RecorderFailed));
        assert_eq!(status.snapshot().persistence_failures, 1);
        assert!(status.status_line().starts_with("Logging failed"));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_frames_are_not_counted_as_processed() {
        let sink = Recording::default();
        let (mut pipeline, status) = pipeline(fixed(one_hot(1)), sink);

        pipeline.handle_event(bodies(&[(7, 1.0)]));
        pipeline.handle_event(face(7, 0.0));
        pipeline.set_mode(Mode::Training);
        pipeline.handle_event(face(7, 0.0));

        let snapshot = status.snapshot();
        assert_eq!(snapshot.frames_processed, 1);
        assert_eq!(snapshot.frames_dropped, 1);
    }

    #[test]
    fn test_non_finite_frames_are_dropped() {
        let sink = Recording::default();
        let (mut pipeline, status) = pipeline(fixed(one_hot(1)), sink.clone());
        pipeline.handle_event(bodies(&[(7, 1.0)]));

        let outcome = pipeline.handle_event(face(7, f32::NAN));
        assert_eq!(outcome, FrameOutcome::Dropped(DropReason::NonFiniteFeatures));

        let outcome = pipeline.handle_event(SensorEvent::Face(FaceFrame {
            tracking_id: 7,
            alignment: Some(FaceAlignment {
                animation_units: AnimationUnits {
                    jaw_open: f32::INFINITY,
                    ..Default::default()
                },
                orientation: FaceOrientation::default(),
            }),
        }));
        assert_eq!(outcome, FrameOutcome::Dropped(DropReason::NonFiniteFeatures));

        assert!(sink.0.lock().unwrap().is_empty());
        assert_eq!(status.snapshot().frames_dropped, 2);
        assert_eq!(status.snapshot().frames_processed, 0);
    }

    #[test]
    fn test_frame_without_alignment_is_dropped() {
        let sink = Recording::default();
        let (mut pipeline, _) = pipeline(fixed(one_hot(1)), sink.clone());
        pipeline.handle_event(bodies(&[(7, 1.0)]));

        let outcome = pipeline.handle_event(SensorEvent::Face(FaceFrame {
            tracking_id: 7,
            alignment: None,
        }));
        assert_eq!(outcome, FrameOutcome::Dropped(DropReason::NoAlignment));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_training_records_and_tracks_max_rotation() {
        let status = create_shared_status();
        let recorder = Recorder::new(Vec::new(), Vec::new()).boxed();
        let mut pipeline = Pipeline::new(
            CommandSelector::new(0.3, DispatchPolicy::AllActive),
            fixed(one_hot(1)),
            Box::new(Recording::default()),
            Some(recorder),
            status.clone(),
        );
        pipeline.set_mode(Mode::Training);
        pipeline.set_training_label(TrainingLabel::new(2).unwrap());

        pipeline.handle_event(bodies(&[(7, 1.0)]));
        assert_eq!(pipeline.handle_event(face(7, 0.2)), FrameOutcome::Recorded { row: 1 });
        assert_eq!(pipeline.handle_event(face(7, 0.1)), FrameOutcome::Recorded { row: 2 });

        assert_eq!(pipeline.context().max_head_rotation, 0.2);
        assert_eq!(
            status.status_line(),
            "Total Points logged: 2\nCurrent: 0.100\nMax: 0.200"
        );
        assert_eq!(status.snapshot().rows_logged, 2);
    }

    #[test]
    fn test_max_rotation_ignores_inference_frames() {
        let sink = Recording::default();
        let (mut pipeline, _) = pipeline(fixed(one_hot(1)), sink);

        pipeline.handle_event(bodies(&[(7, 1.0)]));
        pipeline.handle_event(face(7, 0.9));
        assert_eq!(pipeline.context().max_head_rotation, 0.0);
    }

    #[test]
    fn test_tracking_lost_cancels_capture() {
        let sink = Recording::default();
        let (mut pipeline, status) = pipeline(fixed(one_hot(1)), sink);

        pipeline.handle_event(bodies(&[(7, 1.0)]));
        pipeline.handle_event(SensorEvent::CaptureStarted);
        pipeline.handle_event(SensorEvent::CaptureProgress {
            status: CollectionStatus::LeftViewsNeeded,
        });
        assert_eq!(
            status.status_line(),
            "Builder Status: Collecting, LeftViewsNeeded, Current Tracking ID: 7"
        );

        assert_eq!(
            pipeline.handle_event(SensorEvent::TrackingLost { tracking_id: 7 }),
            FrameOutcome::TrackingLost { cleared: true }
        );
        assert!(!pipeline.context().capture.is_capturing());
        assert_eq!(pipeline.context().tracker.current(), None);
        assert_eq!(
            pipeline.handle_event(face(7, 0.0)),
            FrameOutcome::Dropped(DropReason::NoSubject)
        );
    }

    #[test]
    fn test_apply_config() {
        let sink = Recording::default();
        let (mut pipeline, _) = pipeline(fixed(one_hot(1)), sink);

        let config = Config {
            mode: Mode::Training,
            training_label: TrainingLabel::new(8).unwrap(),
            head_rotation_threshold: 0.6,
            ..Default::default()
        };
        pipeline.apply_config(&config);
        assert_eq!(pipeline.mode(), Mode::Training);
        assert_eq!(pipeline.context().training_label.value(), 8);
    }

    #[test]
    fn test_config_changes_keep_untouched_settings() {
        let sink = Recording::default();
        let (mut pipeline, _) = pipeline(fixed(one_hot(1)), sink.clone());
        // Started in training with a stricter threshold than the file holds.
        pipeline.set_mode(Mode::Training);
        pipeline.set_threshold(0.1);

        let file = Config::default();
        let relabeled = Config {
            training_label: TrainingLabel::new(3).unwrap(),
            ..file.clone()
        };
        pipeline.apply_config_changes(&file, &relabeled);
        assert_eq!(pipeline.mode(), Mode::Training);
        assert_eq!(pipeline.context().training_label.value(), 3);

        let training = Config {
            mode: Mode::Training,
            ..relabeled.clone()
        };
        let inference = Config {
            mode: Mode::Inference,
            ..relabeled.clone()
        };
        pipeline.apply_config_changes(&relabeled, &training);
        pipeline.apply_config_changes(&training, &inference);
        assert_eq!(pipeline.mode(), Mode::Inference);

        // 0.2 is below the file's threshold but above the one set at start.
        pipeline.handle_event(bodies(&[(7, 1.0)]));
        pipeline.handle_event(face(7, 0.2));
        assert_eq!(*sink.0.lock().unwrap(), vec![CommandIndex::OVERRIDE]);
    }
}
