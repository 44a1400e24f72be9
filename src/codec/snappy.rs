//! Snappy codec for compressed frames.
//!
//! Uses the raw block format (no framing/stream headers), which is what the
//! collector expects behind the `COMPRESSED` flag.

use crate::error::{Result, TransportError};

/// Snappy raw block compression.
pub struct SnappyCodec;

impl SnappyCodec {
    /// Compress a serialized payload.
    #[inline]
    pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
        Ok(snap::raw::Encoder::new().compress_vec(data)?)
    }

    /// Decompress a payload, refusing blocks that expand beyond `limit` bytes.
    ///
    /// The decompressed length is read from the block preamble before any
    /// output buffer is allocated.
    pub fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>> {
        let expected = snap::raw::decompress_len(data)?;
        if expected > limit {
            return Err(TransportError::Protocol(format!(
                "Decompressed size {} exceeds maximum {}",
                expected, limit
            )));
        }
        Ok(snap::raw::Decoder::new().decompress_vec(data)?)
    }
}
