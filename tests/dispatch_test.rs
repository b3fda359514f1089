//! Loopback tests for OSC command dispatch

use face_command_agent::core::CommandIndex;
use face_command_agent::dispatch::{CommandSink, OscDispatcher, CHANNEL_COUNT};
use rosc::{decoder, OscPacket, OscType};
use std::net::UdpSocket;
use std::time::Duration;

fn listener() -> (UdpSocket, String) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind listener");
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("Failed to set timeout");
    let addr = socket.local_addr().expect("No local address").to_string();
    (socket, addr)
}

fn receive_all(socket: &UdpSocket, count: usize) -> Vec<(String, f32)> {
    let mut buf = [0u8; decoder::MTU];
    (0..count)
        .map(|_| {
            let (size, _) = socket.recv_from(&mut buf).expect("No OSC packet received");
            let (_, packet) = decoder::decode_udp(&buf[..size]).expect("Invalid OSC packet");
            match packet {
                OscPacket::Message(msg) => match msg.args.as_slice() {
                    [OscType::Float(value)] => (msg.addr, *value),
                    other => panic!("unexpected args {other:?}"),
                },
                OscPacket::Bundle(_) => panic!("unexpected bundle"),
            }
        })
        .collect()
}

#[test]
fn test_command_sends_all_channels_in_order() {
    let (socket, addr) = listener();
    let mut dispatcher = OscDispatcher::new("127.0.0.1:0", &addr).unwrap();

    let report = dispatcher.dispatch(CommandIndex::new(7).unwrap());
    assert_eq!(report.sent, CHANNEL_COUNT);
    assert_eq!(report.failed, 0);

    let received = receive_all(&socket, CHANNEL_COUNT);
    assert_eq!(
        received,
        vec![
            ("/move/w".to_string(), 0.0),
            ("/move/a".to_string(), 0.0),
            ("/move/s".to_string(), 0.0),
            ("/move/d".to_string(), 0.0),
            ("/move/lc".to_string(), 0.0),
            ("/move/rc".to_string(), 0.0),
            ("/move/space".to_string(), 10.0),
            ("/move/middle".to_string(), 0.0),
        ]
    );
}

#[test]
fn test_neutral_command_sends_zeros() {
    let (socket, addr) = listener();
    let mut dispatcher = OscDispatcher::new("127.0.0.1:0", &addr).unwrap();

    dispatcher.dispatch(CommandIndex::NEUTRAL);
    let received = receive_all(&socket, CHANNEL_COUNT);
    assert!(received.iter().all(|(_, value)| *value == 0.0));
}

#[test]
fn test_override_command_targets_back_channel() {
    let (socket, addr) = listener();
    let mut dispatcher = OscDispatcher::new("127.0.0.1:0", &addr).unwrap();

    dispatcher.dispatch(CommandIndex::OVERRIDE);
    let active: Vec<String> = receive_all(&socket, CHANNEL_COUNT)
        .into_iter()
        .filter(|(_, value)| *value != 0.0)
        .map(|(addr, _)| addr)
        .collect();
    assert_eq!(active, vec!["/move/s".to_string()]);
}

#[test]
fn test_busy_source_port_falls_back() {
    let (_socket, addr) = listener();
    let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
    let taken_addr = taken.local_addr().unwrap().to_string();

    let dispatcher = OscDispatcher::new(&taken_addr, &addr).unwrap();
    let local = dispatcher.local_addr().unwrap();
    assert_ne!(local.to_string(), taken_addr);
}

#[test]
fn test_unreachable_listener_does_not_fail_dispatch() {
    // Nothing listens here; UDP delivery is fire-and-forget.
    let addr = {
        let (socket, addr) = listener();
        drop(socket);
        addr
    };
    let mut dispatcher = OscDispatcher::new("127.0.0.1:0", &addr).unwrap();
    let report = dispatcher.dispatch(CommandIndex::new(1).unwrap());
    assert_eq!(report.sent + report.failed, CHANNEL_COUNT);
}
