//! Face Command Agent CLI
//!
//! Facial expression control over OSC.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use face_command_agent::{
    build_classifier,
    classifier::{Classifier, UnavailableClassifier},
    config::{ClassifierKind, Config},
    core::{
        CommandIndex, CommandSelector, Mode, Pipeline, Recorder, TrainingLabel, FEATURE_NAMES,
    },
    dispatch::{CommandSink, OscDispatcher},
    source::{ReplayConfig, ReplaySource},
    status::{create_shared_status_with_persistence, StatusSnapshot},
    PROTOCOL_DECLARATION, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "face-command")]
#[command(version = VERSION)]
#[command(about = "Facial expression control over OSC", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a sensor event stream
    Start {
        /// JSON Lines event stream; omit or pass '-' for stdin
        input: Option<PathBuf>,

        /// Start in this mode (training or inference)
        #[arg(long)]
        mode: Option<Mode>,

        /// Training label (0-8)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=8))]
        label: Option<u8>,

        /// Head rotation threshold for the override command
        #[arg(long)]
        threshold: Option<f32>,

        /// Classifier implementation (process or network)
        #[arg(long)]
        classifier: Option<ClassifierKind>,

        /// Program run per frame by the process classifier
        #[arg(long)]
        classifier_command: Option<String>,

        /// Model file for the network classifier
        #[arg(long)]
        model: Option<PathBuf>,

        /// OSC listener address
        #[arg(long)]
        listener: Option<String>,

        /// Delay between replayed events in milliseconds
        #[arg(long)]
        frame_interval_ms: Option<u64>,
    },

    /// Switch a running agent between training and inference
    Mode {
        mode: Mode,
    },

    /// Set the label recorded with training frames
    Label {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=8))]
        label: u8,
    },

    /// Set the head rotation threshold
    Threshold {
        threshold: f32,
    },

    /// Show current agent status
    Status,

    /// Send one command to the listener
    Send {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=8))]
        command: u8,
    },

    /// Display the OSC command table
    Protocol,

    /// Show configuration
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Start {
            input,
            mode,
            label,
            threshold,
            classifier,
            classifier_command,
            model,
            listener,
            frame_interval_ms,
        } => {
            let overrides = StartOverrides {
                mode,
                label,
                threshold,
                classifier,
                classifier_command,
                model,
                listener,
            };
            cmd_start(input, overrides, frame_interval_ms)
        }
        Commands::Mode { mode } => cmd_mode(mode),
        Commands::Label { label } => cmd_label(label),
        Commands::Threshold { threshold } => cmd_threshold(threshold),
        Commands::Status => cmd_status(),
        Commands::Send { command } => cmd_send(command),
        Commands::Protocol => {
            println!("{PROTOCOL_DECLARATION}");
            Ok(())
        }
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Settings given on the `start` command line.
struct StartOverrides {
    mode: Option<Mode>,
    label: Option<u8>,
    threshold: Option<f32>,
    classifier: Option<ClassifierKind>,
    classifier_command: Option<String>,
    model: Option<PathBuf>,
    listener: Option<String>,
}

impl StartOverrides {
    fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(label) = self.label {
            config.training_label = TrainingLabel::new(label)?;
        }
        if let Some(threshold) = self.threshold {
            config.head_rotation_threshold = threshold;
        }
        if let Some(kind) = self.classifier {
            config.classifier.kind = kind;
        }
        if let Some(command) = self.classifier_command {
            config.classifier.command = Some(command);
        }
        if let Some(model) = self.model {
            config.classifier.model_path = Some(model);
        }
        if let Some(listener) = self.listener {
            config.listener_addr = listener;
        }
        config.validate()?;
        Ok(())
    }
}

fn cmd_start(
    input: Option<PathBuf>,
    overrides: StartOverrides,
    frame_interval_ms: Option<u64>,
) -> Result<()> {
    println!("Face Command Agent v{VERSION}");
    println!();

    // The file as last seen; the running session only reacts when it changes.
    let mut file_config = Config::load().context("Could not load configuration")?;
    let mut config = file_config.clone();
    overrides.apply(&mut config)?;

    if let Err(e) = config.ensure_directories() {
        warn!("Could not create data directory: {e}");
    }

    let status = create_shared_status_with_persistence(config.status_path());
    info!(session_id = %status.session_id(), "Session started");

    let classifier: Box<dyn Classifier> = match build_classifier(&config.classifier) {
        Ok(classifier) => classifier,
        Err(e) => {
            warn!("Inference unavailable: {e}");
            Box::new(UnavailableClassifier::new(e.to_string()))
        }
    };

    let dispatcher = OscDispatcher::new(&config.source_addr, &config.listener_addr)
        .context("Could not set up OSC dispatch")?;

    let recorder = match Recorder::open(&config.feature_log_path(), &config.label_log_path()) {
        Ok(recorder) => Some(recorder.boxed()),
        Err(e) => {
            warn!("Training logs unavailable: {e}");
            None
        }
    };

    println!("  Mode: {}", config.mode);
    println!("  Training label: {}", config.training_label);
    println!("  Head rotation threshold: {}", config.head_rotation_threshold);
    println!("  Classifier: {}", classifier.name());
    println!(
        "  Listener: {} (from {})",
        dispatcher.target(),
        dispatcher
            .local_addr()
            .map_or_else(|| "unbound".to_string(), |a| a.to_string())
    );
    println!("  Feature log: {:?}", config.feature_log_path());
    println!("  Feature columns: {}", FEATURE_NAMES.join(", "));
    println!("  Label log: {:?}", config.label_log_path());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let mut pipeline = Pipeline::new(
        CommandSelector::new(config.head_rotation_threshold, config.dispatch_policy),
        classifier,
        Box::new(dispatcher),
        recorder,
        status.clone(),
    );
    pipeline.apply_config(&config);

    let replay_config = ReplayConfig {
        input: input.filter(|p| p.as_os_str() != "-"),
        frame_interval: frame_interval_ms.map(Duration::from_millis),
    };
    let mut source = ReplaySource::new(replay_config);
    source.start().context("Could not start frame source")?;

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let receiver = source.receiver().clone();
    let mut last_config_check = Instant::now();
    let mut last_status_line = String::new();

    while running.load(Ordering::SeqCst) {
        // Reload config so `face-command mode|label|threshold` reach a running agent.
        // Only edited settings apply; start options stay in force until changed.
        if last_config_check.elapsed() >= config.poll_interval {
            match Config::load() {
                Ok(cfg) if cfg != file_config => {
                    pipeline.apply_config_changes(&file_config, &cfg);
                    file_config = cfg;
                }
                Ok(_) => {}
                Err(e) => warn!("Ignoring config reload: {e}"),
            }
            if let Err(e) = status.save() {
                warn!("Could not save status: {e}");
            }
            last_config_check = Instant::now();
        }

        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                pipeline.handle_event(event);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("Frame stream ended");
                break;
            }
        }

        let line = status.status_line();
        if line != last_status_line {
            println!("{line}");
            last_status_line = line;
        }
    }

    println!();
    println!("Stopping...");
    source.stop();
    pipeline.shutdown();

    if let Err(e) = status.save() {
        eprintln!("Warning: Could not save status: {e}");
    }

    println!();
    println!("{}", status.summary());
    Ok(())
}

fn cmd_mode(mode: Mode) -> Result<()> {
    let mut config = Config::load().unwrap_or_default();
    config.mode = mode;
    config.save().context("Error saving config")?;
    match mode {
        Mode::Training => println!("Training mode ON. Frames will be logged."),
        Mode::Inference => println!("Training mode OFF. Frames will be classified."),
    }
    Ok(())
}

fn cmd_label(label: u8) -> Result<()> {
    let mut config = Config::load().unwrap_or_default();
    config.training_label = TrainingLabel::new(label)?;
    config.save().context("Error saving config")?;
    println!("Training label set to {label}.");
    Ok(())
}

fn cmd_threshold(threshold: f32) -> Result<()> {
    let mut config = Config::load().unwrap_or_default();
    config.head_rotation_threshold = threshold;
    config.save().context("Error saving config")?;
    println!("Head rotation threshold set to {threshold}.");
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Face Command Agent Status");
    println!("=========================");
    println!();
    println!("Configuration:");
    println!("  Mode: {}", config.mode);
    println!("  Training label: {}", config.training_label);
    println!("  Head rotation threshold: {}", config.head_rotation_threshold);
    println!("  Listener: {}", config.listener_addr);
    println!();

    let status_path = config.status_path();
    if status_path.exists() {
        let snapshot = StatusSnapshot::load(&status_path)
            .with_context(|| format!("Could not read {status_path:?}"))?;
        println!("{}", snapshot.summary());
    } else {
        println!("No session data found.");
    }
    Ok(())
}

fn cmd_send(command: u8) -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let command = CommandIndex::new(command)
        .with_context(|| format!("Command {command} is out of range"))?;

    let mut dispatcher = OscDispatcher::new(&config.source_addr, &config.listener_addr)
        .context("Could not set up OSC dispatch")?;
    let report = dispatcher.dispatch(command);

    println!(
        "Sent command {command} to {}: {} messages sent, {} failed",
        dispatcher.target(),
        report.sent,
        report.failed
    );
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
