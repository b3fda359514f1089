//! Face Command Agent - facial expression control over OSC.
//!
//! This library turns per-frame facial animation data from a body and face
//! tracking sensor into discrete input commands for an OSC listener that
//! simulates keyboard and mouse input.
//!
//! # Modes
//!
//! - **Training**: each face frame is appended to a feature log together with
//!   the operator's current label, producing data to fit a classifier offline
//! - **Inference**: each face frame is classified and the selected command is
//!   sent to the listener
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Face Command Agent                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐   │
//! │  │  Source  │──▶│ Tracker  │──▶│ Features │──▶│  Mode gate   │   │
//! │  │ (replay) │   │(subject) │   │ (6 AUs)  │   └──────┬───────┘   │
//! │  └──────────┘   └──────────┘   └──────────┘          │           │
//! │                                          ┌───────────┴────────┐  │
//! │                                          ▼                    ▼  │
//! │                                   ┌────────────┐      ┌──────────┐│
//! │                                   │ Classifier │      │ Recorder ││
//! │                                   └─────┬──────┘      └──────────┘│
//! │                                         ▼                         │
//! │                                   ┌────────────┐                  │
//! │                                   │  Selector  │──▶ OSC dispatch  │
//! │                                   └────────────┘                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use face_command_agent::{
//!     classifier::UnavailableClassifier,
//!     core::{CommandSelector, DispatchPolicy, Pipeline},
//!     dispatch::OscDispatcher,
//!     source::{ReplayConfig, ReplaySource},
//!     status::create_shared_status,
//! };
//!
//! let dispatcher = OscDispatcher::new("127.0.0.1:0", "127.0.0.1:1945").unwrap();
//! let mut pipeline = Pipeline::new(
//!     CommandSelector::new(0.25, DispatchPolicy::AllActive),
//!     Box::new(UnavailableClassifier::new("no model yet")),
//!     Box::new(dispatcher),
//!     None,
//!     create_shared_status(),
//! );
//!
//! let mut source = ReplaySource::new(ReplayConfig::default());
//! source.start().expect("Failed to start source");
//! while let Ok(event) = source.receiver().recv() {
//!     pipeline.handle_event(event);
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod source;
pub mod status;

// Re-export key types at crate root for convenience
pub use classifier::{build_classifier, Classifier, ClassifierError, LabelWeights};
pub use config::{ClassifierConfig, ClassifierKind, Config, ConfigError};
pub use core::{CommandIndex, FeatureVector, FrameOutcome, Mode, Pipeline, TrainingLabel};
pub use dispatch::{Channel, CommandSink, OscDispatcher, SignalFrame};
pub use source::{ReplayConfig, ReplaySource, SensorEvent};
pub use status::{SessionStatus, SharedSessionStatus, StatusSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command table that can be displayed to operators.
pub const PROTOCOL_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              FACE COMMAND AGENT - OSC COMMAND TABLE              ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Every command sends all eight channels as float messages.      ║
║  The selected channel carries 10.0, the rest carry 0.0.         ║
║                                                                  ║
║    Command 0  neutral        (all channels 0.0)                  ║
║    Command 1  /move/w        forward                             ║
║    Command 2  /move/a        left                                ║
║    Command 3  /move/s        back (head rotation override)       ║
║    Command 4  /move/d        right                               ║
║    Command 5  /move/lc       left click                          ║
║    Command 6  /move/rc       right click                         ║
║    Command 7  /move/space    space                               ║
║    Command 8  /move/middle   middle click                        ║
║                                                                  ║
║  Classifier position 3 is reserved and maps to command 0.        ║
║  Head rotation above the threshold always sends command 3.       ║
║                                                                  ║
║  Default listener: 127.0.0.1:1945 (sent from 127.0.0.1:1944)     ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
