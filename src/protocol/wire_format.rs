//! Wire format encoding and decoding.
//!
//! Implements the 5-byte frame header:
//! ```text
//! ┌───────┬──────────┐
//! │ Flag  │ Length   │
//! │ 1 byte│ 4 bytes  │
//! │       │ uint32 BE│
//! └───────┴──────────┘
//! ```
//!
//! The flag records whether the payload that follows is snappy-compressed.

use crate::error::{Result, TransportError};

/// Header size in bytes (fixed, exactly 5).
pub const HEADER_SIZE: usize = 5;

/// Default maximum message size (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 1024 * 1024;

/// Flag values for the first header byte.
pub mod flags {
    /// Payload is sent verbatim.
    pub const UNCOMPRESSED: u8 = 0x00;
    /// Payload is a snappy raw block.
    pub const COMPRESSED: u8 = 0x01;
}

/// Per-frame compression decision.
///
/// Each write picks its own mode; there is no connection-wide setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Send the payload verbatim.
    #[default]
    None,
    /// Compress the payload with snappy.
    Snappy,
}

impl Compression {
    /// The header flag byte for this mode.
    #[inline]
    pub fn flag(self) -> u8 {
        match self {
            Compression::None => flags::UNCOMPRESSED,
            Compression::Snappy => flags::COMPRESSED,
        }
    }

    /// Parse a header flag byte.
    pub fn from_flag(flag: u8) -> Result<Self> {
        match flag {
            flags::UNCOMPRESSED => Ok(Compression::None),
            flags::COMPRESSED => Ok(Compression::Snappy),
            other => Err(TransportError::Protocol(format!(
                "Unknown compression flag 0x{:02x}",
                other
            ))),
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Compression applied to the payload.
    pub compression: Compression,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(compression: Compression, payload_length: u32) -> Self {
        Self {
            compression,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian length).
    ///
    /// # Example
    ///
    /// ```
    /// use apm_transport::protocol::{Compression, Header};
    ///
    /// let bytes = Header::new(Compression::Snappy, 300).encode();
    /// assert_eq!(bytes, [0x01, 0, 0, 0x01, 0x2c]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.compression.flag();
        buf[1..5].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode header from bytes.
    ///
    /// Fails on a short buffer or an unknown flag byte.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(TransportError::Protocol(format!(
                "Header needs {} bytes, got {}",
                HEADER_SIZE,
                buf.len()
            )));
        }
        Ok(Self {
            compression: Compression::from_flag(buf[0])?,
            payload_length: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
        })
    }

    /// Reject payloads larger than the permitted message size.
    pub fn validate(&self, max_message_size: u32) -> Result<()> {
        if self.payload_length > max_message_size {
            return Err(TransportError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_message_size
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compression == Compression::Snappy
    }
}
