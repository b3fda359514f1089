//! Decoding classifier output into label weights.

use super::{ClassifierError, LabelWeights, OUTPUT_COUNT};

/// Tokens a text classifier prints around its answer.
const IGNORED_TOKENS: [&str; 2] = ["ans", "="];

/// Whether a weight marks its position as active (round half up, non-zero).
pub fn is_active(weight: f32) -> bool {
    (weight + 0.5).floor() != 0.0
}

/// Active positions in ascending order.
pub fn active_positions(weights: &LabelWeights) -> Vec<usize> {
    weights
        .iter()
        .enumerate()
        .filter(|&(_, &w)| is_active(w))
        .map(|(position, _)| position)
        .collect()
}

/// Decode a whitespace-separated text response such as `ans = 0 0 1 0 0 0 0 0 0`.
///
/// The `ans` and `=` markers are skipped. Every other token must be a number
/// and there must be exactly nine of them.
pub fn decode_text_response(response: &str) -> Result<LabelWeights, ClassifierError> {
    let values = response
        .split_whitespace()
        .filter(|token| !IGNORED_TOKENS.contains(token))
        .map(|token| {
            token.parse::<f32>().map_err(|_| {
                ClassifierError::MalformedResponse(format!("'{token}' is not a number"))
            })
        })
        .collect::<Result<Vec<f32>, _>>()?;
    into_weights(values)
}

/// Decode a JSON array response such as `[0, 0, 0.97, 0, 0, 0, 0, 0, 0.01]`.
pub fn decode_json_response(response: &str) -> Result<LabelWeights, ClassifierError> {
    let values: Vec<f32> = serde_json::from_str(response.trim())
        .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;
    into_weights(values)
}

fn into_weights(values: Vec<f32>) -> Result<LabelWeights, ClassifierError> {
    let found = values.len();
    let weights: LabelWeights = values.try_into().map_err(|_| ClassifierError::WrongArity {
        expected: OUTPUT_COUNT,
        found,
    })?;
    if let Some(position) = weights.iter().position(|w| !w.is_finite()) {
        return Err(ClassifierError::NonFinite { position });
    }
    Ok(weights)
}
