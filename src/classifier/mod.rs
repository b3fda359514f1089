//! Classifier boundary.
//!
//! A classifier takes the six-element feature vector and returns nine label
//! weights, one per class position. The pipeline only ever sees that typed
//! array; adapters for text-producing classifiers decode their output before
//! it crosses this boundary.
//!
//! Implementations:
//! - [`ProcessClassifier`]: runs an external program per frame, with a timeout
//! - [`NetworkClassifier`]: evaluates a feed-forward network loaded from JSON
//! - any `FnMut(&FeatureVector) -> Result<LabelWeights, ClassifierError>`

pub mod decode;
pub mod network;
pub mod process;

use crate::config::{ClassifierConfig, ClassifierKind};
use crate::core::features::FeatureVector;
use std::time::Duration;

pub use decode::{active_positions, decode_json_response, decode_text_response, is_active};
pub use network::{Activation, Layer, NetworkClassifier, NetworkModel};
pub use process::ProcessClassifier;

/// Number of label positions a classifier reports.
pub const OUTPUT_COUNT: usize = 9;

/// One weight per label position.
pub type LabelWeights = [f32; OUTPUT_COUNT];

/// Errors from invoking or decoding a classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),
    #[error("classifier returned {found} weights, expected {expected}")]
    WrongArity { expected: usize, found: usize },
    #[error("classifier weight at position {position} is not finite")]
    NonFinite { position: usize },
    #[error("classifier did not answer within {0:?}")]
    Timeout(Duration),
    #[error("classifier process failed: {0}")]
    Process(String),
    #[error("invalid classifier model: {0}")]
    Model(String),
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("classifier I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output format of a text-producing classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Whitespace-separated numbers, optionally prefixed by `ans =`
    #[default]
    Text,
    /// A JSON array of nine numbers
    Json,
}

impl ResponseFormat {
    pub fn decode(&self, response: &str) -> Result<LabelWeights, ClassifierError> {
        match self {
            ResponseFormat::Text => decode_text_response(response),
            ResponseFormat::Json => decode_json_response(response),
        }
    }
}

/// A black-box model: feature vector in, label weights out.
pub trait Classifier: Send {
    fn classify(&mut self, features: &FeatureVector) -> Result<LabelWeights, ClassifierError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "classifier"
    }
}

impl<F> Classifier for F
where
    F: FnMut(&FeatureVector) -> Result<LabelWeights, ClassifierError> + Send,
{
    fn classify(&mut self, features: &FeatureVector) -> Result<LabelWeights, ClassifierError> {
        self(features)
    }
}

/// Stands in when no classifier could be set up; every call fails.
#[derive(Debug, Clone)]
pub struct UnavailableClassifier {
    reason: String,
}

impl UnavailableClassifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Classifier for UnavailableClassifier {
    fn classify(&mut self, _features: &FeatureVector) -> Result<LabelWeights, ClassifierError> {
        Err(ClassifierError::Unavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Build the classifier described by the configuration.
pub fn build_classifier(
    config: &ClassifierConfig,
) -> Result<Box<dyn Classifier>, ClassifierError> {
    match config.kind {
        ClassifierKind::Process => {
            let program = config.command.clone().ok_or_else(|| {
                ClassifierError::Unavailable("no classifier command configured".to_string())
            })?;
            Ok(Box::new(ProcessClassifier::new(
                program,
                config.args.clone(),
                config.response_format,
                config.timeout,
            )))
        }
        ClassifierKind::Network => {
            let path = config.model_path.as_ref().ok_or_else(|| {
                ClassifierError::Unavailable("no classifier model path configured".to_string())
            })?;
            Ok(Box::new(NetworkClassifier::from_path(path)?))
        }
    }
}
