//! Configuration for the face command agent.
//!
//! The config file doubles as the operator toggle: CLI subcommands rewrite it
//! and a running agent reloads it, so mode, label and threshold changes take
//! effect on the next frame.

use crate::classifier::ResponseFormat;
use crate::core::mode::Mode;
use crate::core::recorder::TrainingLabel;
use crate::core::selector::DispatchPolicy;
use crate::dispatch::{DEFAULT_LISTENER_ADDR, DEFAULT_SOURCE_ADDR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default orientation value above which every command becomes the override.
pub const DEFAULT_HEAD_ROTATION_THRESHOLD: f32 = 0.25;

/// Main configuration for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Training records frames, inference classifies and dispatches them
    pub mode: Mode,

    /// Label recorded with each training frame
    pub training_label: TrainingLabel,

    /// Orientation threshold for the override command
    pub head_rotation_threshold: f32,

    /// OSC listener endpoint
    pub listener_addr: String,

    /// Local endpoint commands are sent from
    pub source_addr: String,

    /// Directory for logs and session status
    pub data_path: PathBuf,

    /// Feature log, relative to `data_path` unless absolute
    pub feature_log: PathBuf,

    /// Label log, relative to `data_path` unless absolute
    pub label_log: PathBuf,

    pub classifier: ClassifierConfig,

    pub dispatch_policy: DispatchPolicy,

    /// How often a running agent reloads this file
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("face-command-agent");

        Self {
            mode: Mode::default(),
            training_label: TrainingLabel::default(),
            head_rotation_threshold: DEFAULT_HEAD_ROTATION_THRESHOLD,
            listener_addr: DEFAULT_LISTENER_ADDR.to_string(),
            source_addr: DEFAULT_SOURCE_ADDR.to_string(),
            data_path: data_dir,
            feature_log: PathBuf::from("inputs.txt"),
            label_log: PathBuf::from("targets.txt"),
            classifier: ClassifierConfig::default(),
            dispatch_policy: DispatchPolicy::default(),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("face-command-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    /// Full path of the feature log.
    pub fn feature_log_path(&self) -> PathBuf {
        self.data_path.join(&self.feature_log)
    }

    /// Full path of the label log.
    pub fn label_log_path(&self) -> PathBuf {
        self.data_path.join(&self.label_log)
    }

    pub fn status_path(&self) -> PathBuf {
        self.data_path.join("status.json")
    }

    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.head_rotation_threshold.is_finite() {
            return Err(ConfigError::Invalid(
                "head_rotation_threshold must be a finite number".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.classifier.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "classifier timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which classifier implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// External program invoked per frame
    #[default]
    Process,
    /// Feed-forward network evaluated in process
    Network,
}

impl std::str::FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "process" => Ok(ClassifierKind::Process),
            "network" => Ok(ClassifierKind::Network),
            other => Err(format!("unknown classifier kind '{other}'")),
        }
    }
}

/// Classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub kind: ClassifierKind,

    /// Program to run for the process classifier
    pub command: Option<String>,

    pub args: Vec<String>,

    pub response_format: ResponseFormat,

    /// Model file for the network classifier
    pub model_path: Option<PathBuf>,

    #[serde(rename = "timeout_ms", with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::default(),
            command: None,
            args: Vec::new(),
            response_format: ResponseFormat::default(),
            model_path: None,
            timeout: Duration::from_millis(500),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
