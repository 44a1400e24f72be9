//! Dedicated writer task for outbound frames.
//!
//! The write half of the connection is owned by a single task that receives
//! encoded frames over an mpsc channel. Heartbeats and the agent's outbound
//! path share the connection through cloned [`FrameWriter`] handles, with no
//! lock around the socket.
//!
//! # Architecture
//!
//! ```text
//! Heartbeat ──────┐
//!                 ├─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Socket
//! TransportHandle ┘
//! ```
//!
//! Each frame is written with one `write_all` and flushed before the next one
//! is taken, so frames never interleave on the wire. The result of the write
//! is reported back to whoever submitted the frame.

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Result, TransportError};
use crate::protocol::{Compression, Frame, Packet};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// An encoded frame waiting to be written.
#[derive(Debug)]
pub(crate) struct OutboundFrame {
    /// Header and payload in one contiguous buffer.
    bytes: Bytes,
    /// Receives the outcome of the write.
    done: oneshot::Sender<Result<()>>,
}

/// Handle for submitting frames to the writer task.
///
/// Cheap to clone. Once the writer task has stopped, every write reports
/// [`TransportError::ConnectionClosed`].
#[derive(Clone, Debug)]
pub struct FrameWriter {
    tx: mpsc::Sender<OutboundFrame>,
}

impl FrameWriter {
    /// Serialize a packet into one frame and write it.
    ///
    /// `compression` applies to this frame only.
    pub async fn write_packet(&self, packet: &Packet, compression: Compression) -> Result<()> {
        let frame = Frame::from_packet(packet, compression).map_err(|e| {
            tracing::warn!(error = %e, "Failed to encode outbound packet");
            e
        })?;
        self.write_frame(&frame).await
    }

    /// Write an already built frame and wait for the outcome.
    pub async fn write_frame(&self, frame: &Frame) -> Result<()> {
        let (done, result) = oneshot::channel();
        let outbound = OutboundFrame {
            bytes: frame.to_bytes(),
            done,
        };

        self.tx
            .send(outbound)
            .await
            .map_err(|_| TransportError::ConnectionClosed)?;

        result.await.map_err(|_| TransportError::ConnectionClosed)?
    }

    /// Whether the writer task has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends when every handle is dropped (shutting the write half down)
/// or on the first failed write.
pub fn spawn_writer_task<W>(
    writer: W,
    channel_capacity: usize,
) -> (FrameWriter, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(channel_capacity.max(1));
    let task = tokio::spawn(writer_loop(rx, writer));
    (FrameWriter { tx }, task)
}

/// Main writer loop - one frame per write call.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        match write_one(&mut writer, &frame.bytes).await {
            Ok(()) => {
                let _ = frame.done.send(Ok(()));
            }
            Err(e) => {
                tracing::warn!(error = %e, bytes = frame.bytes.len(), "Frame write failed");
                let reported = std::io::Error::new(e.kind(), e.to_string());
                let _ = frame.done.send(Err(TransportError::Io(reported)));
                return Err(TransportError::Io(e));
            }
        }
    }

    // All handles dropped: connection is being torn down.
    let _ = writer.shutdown().await;
    Ok(())
}

async fn write_one<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{read_frame, Command, HEADER_SIZE};
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_write_packet_produces_one_frame() {
        let (client, mut server) = duplex(4096);
        let (writer, _task) = spawn_writer_task(client, DEFAULT_CHANNEL_CAPACITY);

        writer
            .write_packet(&Packet::ping(), Compression::None)
            .await
            .unwrap();

        let frame = read_frame(&mut server, 1024).await.unwrap();
        assert_eq!(frame.compression(), Compression::None);
        assert_eq!(frame.decode_packet(1024).unwrap(), Packet::ping());
    }

    #[tokio::test]
    async fn test_compression_is_per_call() {
        let (client, mut server) = duplex(64 * 1024);
        let (writer, _task) = spawn_writer_task(client, DEFAULT_CHANNEL_CAPACITY);
        let packet = Packet::new(vec![Command::new(2, vec![b'm'; 2048])]);

        writer.write_packet(&packet, Compression::Snappy).await.unwrap();
        writer.write_packet(&packet, Compression::None).await.unwrap();

        let first = read_frame(&mut server, 1 << 20).await.unwrap();
        let second = read_frame(&mut server, 1 << 20).await.unwrap();

        assert!(first.header().is_compressed());
        assert!(!second.header().is_compressed());
        assert_eq!(first.decode_packet(1 << 20).unwrap(), packet);
        assert_eq!(second.decode_packet(1 << 20).unwrap(), packet);
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_interleave() {
        let (client, mut server) = duplex(1 << 20);
        let (writer, _task) = spawn_writer_task(client, 4);

        let mut tasks = Vec::new();
        for kind in 0..8u8 {
            let writer = writer.clone();
            tasks.push(tokio::spawn(async move {
                let packet = Packet::new(vec![Command::new(kind, vec![kind; 512])]);
                writer.write_packet(&packet, Compression::None).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..8 {
            let packet = read_frame(&mut server, 1 << 20)
                .await
                .unwrap()
                .decode_packet(1 << 20)
                .unwrap();
            let cmd = &packet.cmds[0];
            assert!(cmd.payload().iter().all(|&b| b == cmd.kind));
            seen.push(cmd.kind);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_write_fails_after_peer_closed() {
        let (client, server) = duplex(64);
        let (writer, task) = spawn_writer_task(client, DEFAULT_CHANNEL_CAPACITY);
        drop(server);

        let result = writer.write_packet(&Packet::ping(), Compression::None).await;
        assert!(matches!(result, Err(TransportError::Io(_))));
        assert!(task.await.unwrap().is_err());

        let again = writer.write_packet(&Packet::ping(), Compression::None).await;
        assert!(matches!(again, Err(TransportError::ConnectionClosed)));
        assert!(writer.is_closed());
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_handle_drop() {
        let (client, mut server) = duplex(4096);
        let (writer, task) = spawn_writer_task(client, DEFAULT_CHANNEL_CAPACITY);

        drop(writer);
        assert!(task.await.unwrap().is_ok());

        // Write half was shut down: the peer sees EOF.
        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_secs(1), server.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_frame_bytes_are_contiguous() {
        let (client, mut server) = duplex(4096);
        let (writer, _task) = spawn_writer_task(client, DEFAULT_CHANNEL_CAPACITY);
        let frame = Frame::from_packet(&Packet::ping(), Compression::None).unwrap();

        writer.write_frame(&frame).await.unwrap();

        let mut buf = vec![0u8; HEADER_SIZE + frame.payload_len()];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..], &frame.to_bytes()[..]);
    }
}
