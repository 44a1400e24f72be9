//! MsgPack codec using `rmp-serde`.
//!
//! Always `to_vec_named`: the collector decodes commands and packets as maps
//! keyed by field name, not as positional arrays.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::protocol::{Command, Packet};

/// MessagePack codec for frame payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode any value to MsgPack bytes (struct-as-map).
    #[inline]
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    #[inline]
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Serialize an outbound packet.
    #[inline]
    pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>> {
        Self::encode(packet)
    }

    #[inline]
    pub fn decode_packet(bytes: &[u8]) -> Result<Packet> {
        Self::decode(bytes)
    }

    #[inline]
    pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
        Self::encode(command)
    }

    /// Decode exactly one command.
    #[inline]
    pub fn decode_command(bytes: &[u8]) -> Result<Command> {
        Self::decode(bytes)
    }
}
