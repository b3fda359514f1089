//! External-process classifier.
//!
//! Runs the configured program once per frame, writes the feature vector to
//! its stdin as a column (one value per line) and decodes whatever it prints
//! to stdout. A reader thread collects the output so the call can be bounded
//! by a timeout. The timeout covers the whole call, exit included; a process
//! that overruns it is killed and the frame dropped.

use super::{Classifier, ClassifierError, LabelWeights, ResponseFormat};
use crate::core::features::FeatureVector;
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Classifier backed by an external program.
#[derive(Debug, Clone)]
pub struct ProcessClassifier {
    program: String,
    args: Vec<String>,
    format: ResponseFormat,
    timeout: Duration,
}

impl ProcessClassifier {
    /// Run `program` with `args` for every frame, killing it after `timeout`.
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        format: ResponseFormat,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            format,
            timeout,
        }
    }

    fn spawn(&self) -> Result<Child, ClassifierError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ClassifierError::Process(format!("could not start '{}': {e}", self.program)))
    }
}

impl Classifier for ProcessClassifier {
    fn classify(&mut self, features: &FeatureVector) -> Result<LabelWeights, ClassifierError> {
        let deadline = Instant::now() + self.timeout;
        let mut child = self.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let input: String = features
                .to_array()
                .iter()
                .map(|v| format!("{v}\n"))
                .collect();
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                kill(&mut child);
                return Err(ClassifierError::Process(format!("could not write features: {e}")));
            }
            // stdin closes here so the program sees end of input
        }

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClassifierError::Process("stdout was not captured".to_string()))?;

        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let mut output = String::new();
            let result = stdout.read_to_string(&mut output).map(|_| output);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(Ok(output)) => {
                let status = match wait_until(&mut child, deadline) {
                    Ok(Some(status)) => status,
                    Ok(None) => {
                        kill(&mut child);
                        return Err(ClassifierError::Timeout(self.timeout));
                    }
                    Err(e) => {
                        kill(&mut child);
                        return Err(ClassifierError::Io(e));
                    }
                };
                if !status.success() {
                    return Err(ClassifierError::Process(format!(
                        "'{}' exited with {status}",
                        self.program
                    )));
                }
                debug!(program = %self.program, bytes = output.len(), "Classifier answered");
                self.format.decode(&output)
            }
            Ok(Err(e)) => {
                kill(&mut child);
                Err(ClassifierError::Io(e))
            }
            Err(RecvTimeoutError::Timeout) => {
                kill(&mut child);
                Err(ClassifierError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                kill(&mut child);
                Err(ClassifierError::Process("output reader exited".to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Poll for the child's exit until `deadline`. `None` means it is still running.
fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        thread::sleep(remaining.min(Duration::from_millis(5)));
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::classifier::active_positions;

    fn shell(script: &str, format: ResponseFormat, timeout_ms: u64) -> ProcessClassifier {
        ProcessClassifier::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
            format,
            Duration::from_millis(timeout_ms),
        )
    }

    #[test]
    fn test_text_output() {
        let mut classifier = shell(
            "cat > /dev/null; echo 'ans ='; echo '0 0 0 0 0 0.93 0 0 0'",
            ResponseFormat::Text,
            5_000,
        );
        let weights = classifier.classify(&FeatureVector::default()).unwrap();
        assert_eq!(active_positions(&weights), vec![5]);
    }

    #[test]
    fn test_receives_features_as_column() {
        // Echo the first input line back as the weight of position 0.
        let mut classifier = shell(
            "read first; cat > /dev/null; echo \"[$first, 0, 0, 0, 0, 0, 0, 0, 0]\"",
            ResponseFormat::Json,
            5_000,
        );
        let features = FeatureVector {
            jaw_open: 0.75,
            ..Default::default()
        };
        let weights = classifier.classify(&features).unwrap();
        assert_eq!(weights[0], 0.75);
    }

    #[test]
    fn test_malformed_output() {
        let mut classifier = shell("cat > /dev/null; echo 'ans = abc'", ResponseFormat::Text, 5_000);
        let err = classifier.classify(&FeatureVector::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::MalformedResponse(_)));
    }

    #[test]
    fn test_timeout_kills_process() {
        let mut classifier = shell("sleep 5", ResponseFormat::Text, 100);
        let started = std::time::Instant::now();
        let err = classifier.classify(&FeatureVector::default()).unwrap_err();

        assert!(matches!(err, ClassifierError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_covers_exit_after_stdout_closed() {
        // Answers nothing, closes stdout, then lingers.
        let mut classifier = shell(
            "cat > /dev/null; exec 1>&-; sleep 3",
            ResponseFormat::Text,
            100,
        );
        let started = std::time::Instant::now();
        let err = classifier.classify(&FeatureVector::default()).unwrap_err();

        assert!(matches!(err, ClassifierError::Timeout(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_missing_program() {
        let mut classifier = ProcessClassifier::new(
            "/nonexistent/classifier",
            Vec::new(),
            ResponseFormat::Text,
            Duration::from_millis(100),
        );
        assert!(matches!(
            classifier.classify(&FeatureVector::default()),
            Err(ClassifierError::Process(_))
        ));
    }

    #[test]
    fn test_failing_exit_status() {
        let mut classifier = shell("cat > /dev/null; exit 3", ResponseFormat::Text, 5_000);
        assert!(matches!(
            classifier.classify(&FeatureVector::default()),
            Err(ClassifierError::Process(_))
        ));
    }
}
