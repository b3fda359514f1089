//! Training log recorder.
//!
//! Each training frame appends one row to the feature log and one one-hot
//! row to the label log. Row N of one log always describes the same frame as
//! row N of the other. A failed write may leave part of a row behind, so any
//! write failure stops the recorder for the rest of the session.

use crate::core::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Number of classes in the label encoding.
pub const LABEL_COUNT: usize = 9;

/// Operator-selected class for the frames being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TrainingLabel(u8);

impl TrainingLabel {
    /// Validate a label in `0..=8`.
    pub fn new(value: u8) -> Result<Self, RecorderError> {
        if (value as usize) < LABEL_COUNT {
            Ok(Self(value))
        } else {
            Err(RecorderError::InvalidLabel(value))
        }
    }

    /// Raw label value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Nine-column encoding with a single 1 at the label's position.
    pub fn one_hot(&self) -> [u8; LABEL_COUNT] {
        let mut row = [0u8; LABEL_COUNT];
        row[self.0 as usize] = 1;
        row
    }

    /// Format as one label log row, e.g. `0 0 1 0 0 0 0 0 0`.
    pub fn to_log_line(&self) -> String {
        self.one_hot()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TryFrom<u8> for TrainingLabel {
    type Error = RecorderError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TrainingLabel> for u8 {
    fn from(label: TrainingLabel) -> Self {
        label.0
    }
}

impl fmt::Display for TrainingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while recording training rows.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("training label {0} is out of range (expected 0..=8)")]
    InvalidLabel(u8),
    #[error("could not open training log {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("training logs are unavailable")]
    Unavailable,
    #[error("failed to append feature row: {0}")]
    FeatureWrite(#[source] io::Error),
    #[error("feature row {row} written but label row failed: {source}")]
    LabelWrite {
        row: u64,
        #[source]
        source: io::Error,
    },
    #[error("training logs diverged after row {rows}; restart to resume recording")]
    Diverged { rows: u64 },
}

/// Appends aligned feature and label rows.
pub struct Recorder<W: Write = File> {
    features: W,
    labels: W,
    rows: u64,
    diverged: bool,
}

impl Recorder<File> {
    /// Open both logs for appending, creating them and their directories.
    pub fn open(feature_path: &Path, label_path: &Path) -> Result<Self, RecorderError> {
        Ok(Self::new(open_append(feature_path)?, open_append(label_path)?))
    }
}

impl<W: Write> Recorder<W> {
    /// Wrap two writers positioned where new rows should go.
    pub fn new(features: W, labels: W) -> Self {
        Self {
            features,
            labels,
            rows: 0,
            diverged: false,
        }
    }

    /// Rows recorded this session.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Whether a write failure has stopped recording.
    pub fn is_diverged(&self) -> bool {
        self.diverged
    }

    /// Append one labeled frame. Returns the session row count.
    pub fn record(
        &mut self,
        features: &FeatureVector,
        label: TrainingLabel,
    ) -> Result<u64, RecorderError> {
        if self.diverged {
            return Err(RecorderError::Diverged { rows: self.rows });
        }

        if let Err(source) = write_line(&mut self.features, &features.to_log_line()) {
            self.diverged = true;
            return Err(RecorderError::FeatureWrite(source));
        }

        if let Err(source) = write_line(&mut self.labels, &label.to_log_line()) {
            self.diverged = true;
            return Err(RecorderError::LabelWrite {
                row: self.rows + 1,
                source,
            });
        }

        self.rows += 1;
        Ok(self.rows)
    }

    /// Give back the underlying writers.
    pub fn into_inner(self) -> (W, W) {
        (self.features, self.labels)
    }

    /// Erase the writer type so the pipeline can hold any sink.
    pub fn boxed(self) -> BoxedRecorder
    where
        W: Send + 'static,
    {
        Recorder {
            features: Box::new(self.features),
            labels: Box::new(self.labels),
            rows: self.rows,
            diverged: self.diverged,
        }
    }
}

/// Recorder over type-erased writers.
pub type BoxedRecorder = Recorder<Box<dyn Write + Send>>;

fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    writer.write_all(buf.as_bytes())?;
    writer.flush()
}

fn open_append(path: &Path) -> Result<File, RecorderError> {
    let open_err = |source| RecorderError::Open {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(open_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_err)
}
