//! Demonstration of the Face Command Agent pipeline.
//!
//! This example shows how to:
//! 1. Write a short recorded event stream
//! 2. Replay it through a frame source
//! 3. Classify frames with an in-process classifier
//! 4. Send the selected commands over OSC to a local listener
//!
//! Run with: cargo run --example replay_demo

use std::net::UdpSocket;
use std::time::Duration;

use face_command_agent::{
    classifier::{ClassifierError, LabelWeights, OUTPUT_COUNT},
    core::{CommandSelector, DispatchPolicy, FeatureVector, FrameOutcome, Pipeline},
    dispatch::OscDispatcher,
    source::{
        AnimationUnits, Body, BodyFrame, CameraPoint, FaceAlignment, FaceFrame, FaceOrientation,
        ReplayConfig, ReplaySource, SensorEvent,
    },
    status::create_shared_status,
    PROTOCOL_DECLARATION,
};
use rosc::{decoder, OscPacket, OscType};

/// Jaw open means forward, a cheek puff means left click, otherwise neutral.
fn demo_classifier(features: &FeatureVector) -> Result<LabelWeights, ClassifierError> {
    let mut weights = [0.0; OUTPUT_COUNT];
    if features.jaw_open > 0.5 {
        weights[1] = 0.95;
    } else if features.left_cheek_puff > 0.5 {
        weights[5] = 0.9;
    } else {
        weights[0] = 0.8;
    }
    Ok(weights)
}

fn face(jaw_open: f32, left_cheek_puff: f32, head_x: f32) -> SensorEvent {
    SensorEvent::Face(FaceFrame {
        tracking_id: 72057594037928,
        alignment: Some(FaceAlignment {
            animation_units: AnimationUnits {
                jaw_open,
                left_cheek_puff,
                ..Default::default()
            },
            orientation: FaceOrientation {
                x: head_x,
                ..Default::default()
            },
        }),
    })
}

fn main() {
    println!("Face Command Agent - Replay Demo");
    println!("================================");
    println!("{PROTOCOL_DECLARATION}");

    // Record a short session: one subject, a few expressions, one head turn.
    let events = vec![
        SensorEvent::Bodies(BodyFrame {
            bodies: vec![
                Body::tracked(72057594037928, CameraPoint::new(0.1, 0.0, 1.4)),
                Body::tracked(72057594037931, CameraPoint::new(0.6, 0.0, 2.8)),
            ],
        }),
        face(0.8, 0.0, 0.02),
        face(0.1, 0.7, 0.05),
        face(0.0, 0.0, 0.01),
        face(0.9, 0.0, 0.4),
        SensorEvent::TrackingLost {
            tracking_id: 72057594037928,
        },
        face(0.8, 0.0, 0.0),
    ];

    let stream_path = std::env::temp_dir().join("face-command-replay-demo.jsonl");
    let lines: Vec<String> = events
        .iter()
        .filter_map(|e| serde_json::to_string(e).ok())
        .collect();
    if let Err(e) = std::fs::write(&stream_path, lines.join("\n")) {
        eprintln!("Error writing demo stream: {e}");
        return;
    }

    // Local stand-in for the input-simulation listener
    let listener = match UdpSocket::bind("127.0.0.1:0") {
        Ok(socket) => socket,
        Err(e) => {
            eprintln!("Error binding listener: {e}");
            return;
        }
    };
    let _ = listener.set_read_timeout(Some(Duration::from_millis(200)));
    let listener_addr = match listener.local_addr() {
        Ok(addr) => addr.to_string(),
        Err(e) => {
            eprintln!("Error reading listener address: {e}");
            return;
        }
    };

    let dispatcher = match OscDispatcher::new("127.0.0.1:0", &listener_addr) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            eprintln!("Error creating dispatcher: {e}");
            return;
        }
    };

    let status = create_shared_status();
    let mut pipeline = Pipeline::new(
        CommandSelector::new(0.25, DispatchPolicy::AllActive),
        Box::new(demo_classifier),
        Box::new(dispatcher),
        None,
        status.clone(),
    );

    let mut source = ReplaySource::new(ReplayConfig {
        input: Some(stream_path.clone()),
        frame_interval: Some(Duration::from_millis(30)),
    });
    if let Err(e) = source.start() {
        eprintln!("Error starting source: {e}");
        return;
    }

    println!("Replaying {} events to {listener_addr}...", events.len());
    println!();

    let mut buf = [0u8; rosc::decoder::MTU];
    while let Ok(event) = source.receiver().recv() {
        let kind = event.kind();
        let outcome = pipeline.handle_event(event);
        println!("{kind:<14} -> {outcome:?}");

        if let FrameOutcome::Dispatched(commands) = outcome {
            for _ in 0..commands.len() * 8 {
                let Ok((size, _)) = listener.recv_from(&mut buf) else {
                    break;
                };
                if let Ok((_, OscPacket::Message(msg))) = decoder::decode_udp(&buf[..size]) {
                    if msg.args.iter().any(|a| matches!(a, OscType::Float(v) if *v > 0.0)) {
                        println!("                  listener got {} {:?}", msg.addr, msg.args);
                    }
                }
            }
        }
    }

    println!();
    println!("{}", status.summary());
    let _ = std::fs::remove_file(&stream_path);
}
