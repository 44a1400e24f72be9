//! Codec module - payload serialization and compression.
//!
//! - [`MsgPackCodec`] - MessagePack for commands and packets (`rmp-serde`, struct-as-map)
//! - [`SnappyCodec`] - snappy raw block compression for flagged frames
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects,
//! so the frame layer picks them at compile time.
//!
//! # Example
//!
//! ```
//! use apm_transport::codec::{MsgPackCodec, SnappyCodec};
//! use apm_transport::protocol::Packet;
//!
//! let encoded = MsgPackCodec::encode_packet(&Packet::ping()).unwrap();
//! let compressed = SnappyCodec::compress(&encoded).unwrap();
//! let restored = SnappyCodec::decompress(&compressed, 1024).unwrap();
//! assert_eq!(MsgPackCodec::decode_packet(&restored).unwrap(), Packet::ping());
//! ```

mod msgpack;
mod snappy;

pub use msgpack::MsgPackCodec;
pub use snappy::SnappyCodec;
