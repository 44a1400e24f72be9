//! Transport frame: compression flag plus payload.
//!
//! Frames are only built from a [`Compression`] mode that also decides
//! whether the payload was compressed, so flag and bytes always agree.
//!
//! # Example
//!
//! ```
//! use apm_transport::protocol::{Compression, Frame, Packet, HEADER_SIZE};
//!
//! let frame = Frame::from_packet(&Packet::ping(), Compression::None).unwrap();
//! let bytes = frame.to_bytes();
//! assert_eq!(bytes[0], 0x00);
//! assert_eq!(bytes.len(), HEADER_SIZE + frame.payload_len());
//! ```

use std::io::ErrorKind;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::command::{Command, Packet};
use super::wire_format::{Compression, Header, HEADER_SIZE};
use crate::codec::{MsgPackCodec, SnappyCodec};
use crate::error::{Result, TransportError};

/// A complete transport frame.
#[derive(Debug, Clone)]
pub struct Frame {
    header: Header,
    payload: Bytes,
}

impl Frame {
    /// Wrap serialized bytes, compressing them when requested.
    pub fn from_serialized(serialized: Vec<u8>, compression: Compression) -> Result<Self> {
        let payload = match compression {
            Compression::None => serialized,
            Compression::Snappy => SnappyCodec::compress(&serialized)?,
        };
        let payload_length = u32::try_from(payload.len()).map_err(|_| {
            TransportError::Protocol(format!("Payload size {} does not fit a frame", payload.len()))
        })?;
        Ok(Self {
            header: Header::new(compression, payload_length),
            payload: Bytes::from(payload),
        })
    }

    /// Build an outbound frame carrying a packet.
    pub fn from_packet(packet: &Packet, compression: Compression) -> Result<Self> {
        Self::from_serialized(MsgPackCodec::encode_packet(packet)?, compression)
    }

    /// Build a frame carrying a single command (collector-to-agent direction).
    pub fn from_command(command: &Command, compression: Compression) -> Result<Self> {
        Self::from_serialized(MsgPackCodec::encode_command(command)?, compression)
    }

    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline]
    pub fn compression(&self) -> Compression {
        self.header.compression
    }

    /// Raw payload as it travels on the wire (compressed if flagged).
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Encode header and payload into one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(build_frame(&self.header, &self.payload))
    }

    /// Payload with compression removed.
    pub fn decompressed(&self, max_message_size: u32) -> Result<Bytes> {
        match self.header.compression {
            Compression::None => Ok(self.payload.clone()),
            Compression::Snappy => Ok(Bytes::from(SnappyCodec::decompress(
                &self.payload,
                max_message_size as usize,
            )?)),
        }
    }

    /// Decode the payload as exactly one command.
    pub fn decode_command(&self, max_message_size: u32) -> Result<Command> {
        MsgPackCodec::decode_command(&self.decompressed(max_message_size)?)
    }

    /// Decode the payload as a packet.
    pub fn decode_packet(&self, max_message_size: u32) -> Result<Packet> {
        MsgPackCodec::decode_packet(&self.decompressed(max_message_size)?)
    }
}

/// Build a complete frame as a single byte vector.
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}

/// Read exactly one frame from the stream.
///
/// Waits until the whole frame has arrived. A header announcing more than
/// `max_message_size` bytes fails before any payload is read. End of stream
/// before a complete frame is reported as [`TransportError::ConnectionClosed`].
pub async fn read_frame<R>(reader: &mut R, max_message_size: u32) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    reader
        .read_exact(&mut header_buf)
        .await
        .map_err(eof_as_closed)?;

    let header = Header::decode(&header_buf)?;
    header.validate(max_message_size)?;

    let mut payload = vec![0u8; header.payload_length as usize];
    reader.read_exact(&mut payload).await.map_err(eof_as_closed)?;

    Ok(Frame {
        header,
        payload: Bytes::from(payload),
    })
}

fn eof_as_closed(err: std::io::Error) -> TransportError {
    if err.kind() == ErrorKind::UnexpectedEof {
        TransportError::ConnectionClosed
    } else {
        TransportError::Io(err)
    }
}
