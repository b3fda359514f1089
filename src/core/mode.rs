//! Operating mode: record training rows or drive commands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which path a frame takes through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Append labeled feature rows to the training logs
    Training,
    /// Classify each frame and dispatch the selected command
    #[default]
    Inference,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Training => "training",
            Mode::Inference => "inference",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "training" | "train" => Ok(Mode::Training),
            "inference" | "infer" => Ok(Mode::Inference),
            other => Err(format!(
                "unknown mode '{other}' (expected 'training' or 'inference')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("training".parse::<Mode>(), Ok(Mode::Training));
        assert_eq!("Infer".parse::<Mode>(), Ok(Mode::Inference));
        assert!("hybrid".parse::<Mode>().is_err());
    }

    #[test]
    fn test_default_is_inference() {
        assert_eq!(Mode::default(), Mode::Inference);
        assert_eq!(Mode::Training.to_string(), "training");
    }
}
