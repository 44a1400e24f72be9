//! Protocol module - wire format, framing, and command types.
//!
//! This module implements the binary protocol spoken with the collector:
//! - 5-byte header (compression flag + payload length)
//! - Frame struct that keeps flag and payload consistent
//! - Command and packet types carried in frame payloads

mod command;
mod frame;
mod wire_format;

pub use command::{kinds, Command, Packet};
pub use frame::{build_frame, read_frame, Frame};
pub use wire_format::{flags, Compression, Header, DEFAULT_MAX_MESSAGE_SIZE, HEADER_SIZE};
