//! In-process feed-forward network classifier.
//!
//! Models are fitted offline from the training logs and exported as JSON:
//!
//! ```json
//! {
//!   "input_range": { "min": [0,0,0,0,0,0], "max": [1,1,1,1,1,1] },
//!   "layers": [
//!     { "weights": [[...6 values...], ...], "bias": [...], "activation": "tanh" },
//!     { "weights": [[...], ...9 rows...], "bias": [...9 values...], "activation": "softmax" }
//!   ]
//! }
//! ```
//!
//! `input_range`, when present, maps each input linearly from `[min, max]`
//! onto `[-1, 1]` before the first layer.

use super::{Classifier, ClassifierError, LabelWeights, OUTPUT_COUNT};
use crate::core::features::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-neuron activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Tanh,
    Sigmoid,
    Relu,
    Softmax,
}

/// One dense layer. `weights` has one row per output neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

impl Layer {
    fn inputs(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn outputs(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut output: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect();

        match self.activation {
            Activation::Linear => {}
            Activation::Tanh => output.iter_mut().for_each(|v| *v = v.tanh()),
            Activation::Sigmoid => output.iter_mut().for_each(|v| *v = 1.0 / (1.0 + (-*v).exp())),
            Activation::Relu => output.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::Softmax => {
                let max = output.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                output.iter_mut().for_each(|v| *v = (*v - max).exp());
                let sum: f32 = output.iter().sum();
                if sum > 0.0 {
                    output.iter_mut().for_each(|v| *v /= sum);
                }
            }
        }
        output
    }
}

/// Linear input normalisation bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRange {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

impl InputRange {
    fn apply(&self, input: &mut [f32]) {
        for ((x, lo), hi) in input.iter_mut().zip(&self.min).zip(&self.max) {
            let span = hi - lo;
            // A constant input carries no information.
            *x = if span.abs() > f32::EPSILON {
                2.0 * (*x - lo) / span - 1.0
            } else {
                0.0
            };
        }
    }
}

/// Serialized network model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkModel {
    #[serde(default)]
    pub input_range: Option<InputRange>,
    pub layers: Vec<Layer>,
}

impl NetworkModel {
    /// Check that the layers chain from six inputs to nine outputs.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.layers.is_empty() {
            return Err(ClassifierError::Model("model has no layers".to_string()));
        }
        if let Some(range) = &self.input_range {
            if range.min.len() != FEATURE_COUNT || range.max.len() != FEATURE_COUNT {
                return Err(ClassifierError::Model(format!(
                    "input_range must have {FEATURE_COUNT} min and max values"
                )));
            }
        }

        let mut width = FEATURE_COUNT;
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.outputs() == 0 || layer.bias.len() != layer.outputs() {
                return Err(ClassifierError::Model(format!(
                    "layer {index}: {} weight rows but {} biases",
                    layer.outputs(),
                    layer.bias.len()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != width) {
                return Err(ClassifierError::Model(format!(
                    "layer {index}: expected {width} inputs per row, found {}",
                    layer.inputs()
                )));
            }
            width = layer.outputs();
        }

        if width != OUTPUT_COUNT {
            return Err(ClassifierError::Model(format!(
                "model produces {width} outputs, expected {OUTPUT_COUNT}"
            )));
        }
        Ok(())
    }
}

/// Classifier that evaluates a [`NetworkModel`].
#[derive(Debug, Clone)]
pub struct NetworkClassifier {
    model: NetworkModel,
}

impl NetworkClassifier {
    /// Wrap a model after checking its shape.
    pub fn new(model: NetworkModel) -> Result<Self, ClassifierError> {
        model.validate()?;
        Ok(Self { model })
    }

    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let model: NetworkModel =
            serde_json::from_str(json).map_err(|e| ClassifierError::Model(e.to_string()))?;
        Self::new(model)
    }

    /// Load a model saved as JSON.
    pub fn from_path(path: &Path) -> Result<Self, ClassifierError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn model(&self) -> &NetworkModel {
        &self.model
    }
}

impl Classifier for NetworkClassifier {
    fn classify(&mut self, features: &FeatureVector) -> Result<LabelWeights, ClassifierError> {
        let mut activations = features.to_array().to_vec();
        if let Some(range) = &self.model.input_range {
            range.apply(&mut activations);
        }
        for layer in &self.model.layers {
            activations = layer.forward(&activations);
        }

        let weights: LabelWeights =
            activations
                .try_into()
                .map_err(|v: Vec<f32>| ClassifierError::WrongArity {
                    expected: OUTPUT_COUNT,
                    found: v.len(),
                })?;
        if let Some(position) = weights.iter().position(|w| !w.is_finite()) {
            return Err(ClassifierError::NonFinite { position });
        }
        Ok(weights)
    }

    fn name(&self) -> &str {
        "network"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::active_positions;

    /// Single linear layer: output i copies input i for i < 6, rest zero.
    fn identity_layer(activation: Activation) -> Layer {
        let weights = (0..OUTPUT_COUNT)
            .map(|row| {
                (0..FEATURE_COUNT)
                    .map(|col| if row == col { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect();
        Layer {
            weights,
            bias: vec![0.0; OUTPUT_COUNT],
            activation,
        }
    }

    #[test]
    fn test_linear_forward() {
        let mut classifier = NetworkClassifier::new(NetworkModel {
            input_range: None,
            layers: vec![identity_layer(Activation::Linear)],
        })
        .unwrap();

        let features = FeatureVector {
            right_cheek_puff: 0.9,
            ..Default::default()
        };
        let weights = classifier.classify(&features).unwrap();
        assert_eq!(active_positions(&weights), vec![2]);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let layer = Layer {
            weights: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 0.0]],
            bias: vec![0.0, 0.0, 0.0],
            activation: Activation::Softmax,
        };
        let out = layer.forward(&[2.0, 1.0]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(out[0] > out[1] && out[1] > out[2]);
    }

    #[test]
    fn test_input_range_maps_to_unit_interval() {
        let range = InputRange {
            min: vec![0.0, 0.0],
            max: vec![2.0, 0.0],
        };
        let mut input = [2.0, 5.0];
        range.apply(&mut input);
        assert_eq!(input, [1.0, 0.0]);
    }

    #[test]
    fn test_validate_rejects_wrong_shapes() {
        let mut layer = identity_layer(Activation::Tanh);
        layer.bias.pop();
        assert!(NetworkClassifier::new(NetworkModel {
            input_range: None,
            layers: vec![layer],
        })
        .is_err());

        let narrow = Layer {
            weights: vec![vec![0.0; FEATURE_COUNT]; 4],
            bias: vec![0.0; 4],
            activation: Activation::Linear,
        };
        let err = NetworkClassifier::new(NetworkModel {
            input_range: None,
            layers: vec![narrow],
        })
        .unwrap_err();
        assert!(err.to_string().contains("4 outputs"));

        assert!(NetworkClassifier::new(NetworkModel {
            input_range: None,
            layers: vec![],
        })
        .is_err());
    }

    #[test]
    fn test_two_layer_model_from_json() {
        let hidden: Vec<Vec<f32>> = vec![vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]; 3];
        let output: Vec<Vec<f32>> = (0..OUTPUT_COUNT)
            .map(|i| if i == 4 { vec![5.0, 5.0, 5.0] } else { vec![0.0; 3] })
            .collect();
        let output_bias = vec![0.0f32; OUTPUT_COUNT];
        let json = serde_json::json!({
            "layers": [
                { "weights": hidden, "bias": [0.0, 0.0, 0.0], "activation": "tanh" },
                { "weights": output, "bias": output_bias, "activation": "softmax" }
            ]
        })
        .to_string();

        let mut classifier = NetworkClassifier::from_json(&json).unwrap();
        let features = FeatureVector {
            jaw_open: 1.0,
            ..Default::default()
        };
        let weights = classifier.classify(&features).unwrap();
        assert_eq!(active_positions(&weights), vec![4]);
    }
}
