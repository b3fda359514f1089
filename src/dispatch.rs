//! OSC command dispatch to the input-simulation listener.
//!
//! Every dispatch sends all eight channels, one OSC message per channel with
//! a single float argument, in a fixed order. At most one channel carries
//! [`ACTIVE_AMPLITUDE`]; command 0 sends all zeros. Delivery is
//! fire-and-forget over UDP.

use crate::core::selector::CommandIndex;
use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::{debug, warn};

/// Default listener endpoint.
pub const DEFAULT_LISTENER_ADDR: &str = "127.0.0.1:1945";

/// Default local endpoint the agent sends from.
pub const DEFAULT_SOURCE_ADDR: &str = "127.0.0.1:1944";

/// Value sent on the channel a command selects.
pub const ACTIVE_AMPLITUDE: f32 = 10.0;

/// Number of output channels.
pub const CHANNEL_COUNT: usize = 8;

/// One listener input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Forward,
    Left,
    Back,
    Right,
    LeftClick,
    RightClick,
    Space,
    MiddleClick,
}

impl Channel {
    /// All channels in transmission order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Forward,
        Channel::Left,
        Channel::Back,
        Channel::Right,
        Channel::LeftClick,
        Channel::RightClick,
        Channel::Space,
        Channel::MiddleClick,
    ];

    /// OSC address for this channel.
    pub fn address(&self) -> &'static str {
        match self {
            Channel::Forward => "/move/w",
            Channel::Left => "/move/a",
            Channel::Back => "/move/s",
            Channel::Right => "/move/d",
            Channel::LeftClick => "/move/lc",
            Channel::RightClick => "/move/rc",
            Channel::Space => "/move/space",
            Channel::MiddleClick => "/move/middle",
        }
    }

    /// Channel a command activates. Command 0 activates none.
    pub fn for_command(command: CommandIndex) -> Option<Channel> {
        match command.value() {
            0 => None,
            n => Channel::ALL.get(n as usize - 1).copied(),
        }
    }

    fn index(&self) -> usize {
        Channel::ALL.iter().position(|c| c == self).unwrap_or(0)
    }
}

/// Channel amplitudes for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalFrame {
    values: [f32; CHANNEL_COUNT],
}

impl SignalFrame {
    /// Build the frame for a command.
    pub fn for_command(command: CommandIndex) -> Self {
        let mut frame = Self::default();
        if let Some(channel) = Channel::for_command(command) {
            frame.values[channel.index()] = ACTIVE_AMPLITUDE;
        }
        frame
    }

    /// Value carried by `channel`.
    pub fn get(&self, channel: Channel) -> f32 {
        self.values[channel.index()]
    }

    /// Channels paired with their values, in transmission order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, f32)> + '_ {
        Channel::ALL.iter().copied().zip(self.values.iter().copied())
    }

    /// The channel set to a non-zero value, if any.
    pub fn active_channel(&self) -> Option<Channel> {
        self.iter().find(|(_, v)| *v != 0.0).map(|(c, _)| c)
    }
}

/// Build the OSC messages for a signal frame, in transmission order.
pub fn build_osc_messages(frame: &SignalFrame) -> Vec<OscMessage> {
    frame
        .iter()
        .map(|(channel, value)| OscMessage {
            addr: channel.address().to_string(),
            args: vec![OscType::Float(value)],
        })
        .collect()
}

/// Encode an OSC message as a UDP payload.
pub fn encode_osc_message(msg: &OscMessage) -> Result<Vec<u8>, DispatchError> {
    let packet = OscPacket::Message(msg.clone());
    encoder::encode(&packet).map_err(|e| DispatchError::Encode(e.to_string()))
}

/// Errors setting up or encoding a dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid endpoint '{0}'")]
    Endpoint(String),
    #[error("could not open UDP socket: {0}")]
    Socket(#[from] std::io::Error),
    #[error("OSC encoding failed: {0}")]
    Encode(String),
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Anything that can take a selected command.
pub trait CommandSink: Send {
    /// Deliver one command. Failures are reported, not raised.
    fn dispatch(&mut self, command: CommandIndex) -> DispatchReport;
}

/// Sends commands as OSC over UDP.
pub struct OscDispatcher {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscDispatcher {
    /// Bind to `source_addr` and send to `target_addr`.
    ///
    /// If the source port is taken, falls back to an ephemeral port on the
    /// same host so a second agent or a `send` command still works.
    pub fn new(source_addr: &str, target_addr: &str) -> Result<Self, DispatchError> {
        let target = resolve(target_addr)?;
        let source = resolve(source_addr)?;
        let socket = match UdpSocket::bind(source) {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Could not bind {source}: {e}; using an ephemeral port");
                UdpSocket::bind(SocketAddr::new(source.ip(), 0))?
            }
        };
        Ok(Self { socket, target })
    }

    /// Listener address.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

impl CommandSink for OscDispatcher {
    fn dispatch(&mut self, command: CommandIndex) -> DispatchReport {
        let mut report = DispatchReport::default();
        for msg in build_osc_messages(&SignalFrame::for_command(command)) {
            let sent = encode_osc_message(&msg)
                .and_then(|data| Ok(self.socket.send_to(&data, self.target)?));
            match sent {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    debug!(addr = %msg.addr, "OSC send failed: {e}");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

fn resolve(addr: &str) -> Result<SocketAddr, DispatchError> {
    addr.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| DispatchError::Endpoint(addr.to_string()))
}
