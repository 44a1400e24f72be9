//! Command and packet types exchanged with the collector.
//!
//! Both are serialized as MsgPack maps (see [`MsgPackCodec`](crate::codec::MsgPackCodec)).

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// Command kind constants.
pub mod kinds {
    /// Liveness signal sent by the heartbeat.
    pub const PING: u8 = 1;
}

/// A single command with a discriminated kind and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Command kind (see [`kinds`]).
    pub kind: u8,
    /// Opaque command body.
    #[serde(default)]
    pub payload: ByteBuf,
}

impl Command {
    /// Create a command with the given kind and payload.
    pub fn new(kind: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: ByteBuf::from(payload.into()),
        }
    }

    /// A ping command with an empty payload.
    pub fn ping() -> Self {
        Self::new(kinds::PING, Vec::new())
    }

    #[inline]
    pub fn is_ping(&self) -> bool {
        self.kind == kinds::PING
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// An ordered batch of commands carried by one outbound frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub cmds: Vec<Command>,
}

impl Packet {
    /// Create a packet from commands.
    pub fn new(cmds: Vec<Command>) -> Self {
        Self { cmds }
    }

    /// The heartbeat packet: exactly one ping.
    pub fn ping() -> Self {
        Self::new(vec![Command::ping()])
    }

    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_packet_has_exactly_one_ping() {
        let packet = Packet::ping();
        assert_eq!(packet.len(), 1);
        assert!(packet.cmds[0].is_ping());
        assert!(packet.cmds[0].payload().is_empty());
    }

    #[test]
    fn test_command_new() {
        let cmd = Command::new(7, b"restart".to_vec());
        assert_eq!(cmd.kind, 7);
        assert!(!cmd.is_ping());
        assert_eq!(cmd.payload(), b"restart");
    }
}
