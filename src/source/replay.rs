//! Replay source: feeds recorded sensor events into the pipeline.
//!
//! A reader thread parses a JSON Lines frame stream (a file or stdin) and
//! pushes each event into a bounded channel. The main loop polls the
//! receiver, so frame acquisition is the only place the pipeline waits.
//! When the stream ends the reader drops its sender and the receiver reports
//! `Disconnected`.

use crate::source::types::SensorEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Capacity of the event channel. Roughly ten seconds of 30 fps sensor data.
const CHANNEL_CAPACITY: usize = 300;

/// Configuration for a replay source.
#[derive(Debug, Clone, Default)]
pub struct ReplayConfig {
    /// Frame stream to read; `None` reads stdin
    pub input: Option<PathBuf>,
    /// Delay between events, to mimic the sensor's frame rate
    pub frame_interval: Option<Duration>,
}

/// Errors that can occur while running a frame source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Frame source is already running")]
    AlreadyRunning,
    #[error("Could not open frame stream {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed sensor event: {0}")]
    Malformed(String),
}

/// A frame source that replays a recorded event stream.
pub struct ReplaySource {
    config: ReplayConfig,
    sender: Option<Sender<SensorEvent>>,
    receiver: Receiver<SensorEvent>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReplaySource {
    /// Create a new replay source. Nothing is read until [`start`](Self::start).
    pub fn new(config: ReplayConfig) -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            config,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start the reader thread.
    pub fn start(&mut self) -> Result<(), SourceError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }
        // A source replays its stream once.
        let sender = self.sender.take().ok_or(SourceError::AlreadyRunning)?;

        let reader: Box<dyn Read + Send> = match &self.config.input {
            Some(path) => Box::new(std::fs::File::open(path).map_err(|source| {
                SourceError::Open {
                    path: path.clone(),
                    source,
                }
            })?),
            None => Box::new(std::io::stdin()),
        };

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let interval = self.config.frame_interval;

        self.handle = Some(thread::spawn(move || {
            pump_events(reader, &sender, &running, interval);
            running.store(false, Ordering::SeqCst);
        }));

        Ok(())
    }

    /// Stop the reader thread after its current line.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get the receiver for sensor events.
    pub fn receiver(&self) -> &Receiver<SensorEvent> {
        &self.receiver
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
        // Disconnect so a reader blocked on a full channel wakes up.
        let (_, closed) = bounded(0);
        drop(std::mem::replace(&mut self.receiver, closed));
        // stdin readers may be blocked indefinitely; never join those.
        if self.config.input.is_some() {
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn pump_events(
    reader: Box<dyn Read + Send>,
    sender: &Sender<SensorEvent>,
    running: &AtomicBool,
    interval: Option<Duration>,
) {
    for (index, line) in BufReader::new(reader).lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Frame stream read failed at line {}: {e}", index + 1);
                break;
            }
        };

        match parse_event_line(&line) {
            Ok(Some(event)) => {
                if sender.send(event).is_err() {
                    debug!("Event receiver dropped, stopping replay");
                    break;
                }
                if let Some(interval) = interval {
                    thread::sleep(interval);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping line {}: {e}", index + 1),
        }
    }
}

/// Parse one line of a frame stream.
///
/// Blank lines and lines starting with `#` yield `Ok(None)`.
pub fn parse_event_line(line: &str) -> Result<Option<SensorEvent>, SourceError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| SourceError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        assert!(parse_event_line("").unwrap().is_none());
        assert!(parse_event_line("   ").unwrap().is_none());
        assert!(parse_event_line("# recorded 2024-03-01").unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_event_line("{\"type\":\"teleport\"}").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn test_replay_file_until_disconnect() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# two events and one bad line").unwrap();
        writeln!(file, r#"{{"type":"tracking_lost","tracking_id":1}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"type":"capture_completed"}}"#).unwrap();
        file.flush().unwrap();

        let mut source = ReplaySource::new(ReplayConfig {
            input: Some(file.path().to_path_buf()),
            frame_interval: None,
        });
        source.start().unwrap();

        let events: Vec<SensorEvent> = source.receiver().iter().collect();
        assert_eq!(
            events,
            vec![
                SensorEvent::TrackingLost { tracking_id: 1 },
                SensorEvent::CaptureCompleted
            ]
        );
    }

    #[test]
    fn test_start_twice_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut source = ReplaySource::new(ReplayConfig {
            input: Some(file.path().to_path_buf()),
            frame_interval: None,
        });
        source.start().unwrap();
        assert!(matches!(source.start(), Err(SourceError::AlreadyRunning)));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let mut source = ReplaySource::new(ReplayConfig {
            input: Some(PathBuf::from("/definitely/not/here.jsonl")),
            frame_interval: None,
        });
        let err = source.start().unwrap_err();
        assert!(err.to_string().contains("not/here.jsonl"));
    }
}
