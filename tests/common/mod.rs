//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use apm_transport::protocol::{read_frame, Frame};
use apm_transport::transport::Dialer;
use apm_transport::{Command, Compression, ConnectionState, Packet};
use async_trait::async_trait;
use tokio::io::{duplex, AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::watch;

pub const MAX: u32 = 64 * 1024;

/// What the next dial attempt does.
pub enum Step {
    Refuse,
    Panic(&'static str),
    Connect(DuplexStream),
    /// Connects, but the first write on the connection panics.
    ConnectPoisoned(DuplexStream),
}

/// Agent side of a scripted connection.
pub struct ScriptedStream {
    inner: DuplexStream,
    panic_on_write: bool,
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.panic_on_write {
            panic!("socket write exploded");
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Dialer that replays a script of outcomes, refusing once it runs out.
#[derive(Clone, Default)]
pub struct ScriptedDialer {
    steps: Arc<Mutex<VecDeque<Step>>>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    /// Queue a connection and return the collector's end of it.
    pub fn push_connection(&self) -> DuplexStream {
        let (agent, collector) = duplex(256 * 1024);
        self.push(Step::Connect(agent));
        collector
    }

    /// Queue a connection whose first write panics.
    pub fn push_poisoned_connection(&self) -> DuplexStream {
        let (agent, collector) = duplex(256 * 1024);
        self.push(Step::ConnectPoisoned(agent));
        collector
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    type Stream = ScriptedStream;

    async fn dial(&self, _addr: &str) -> io::Result<ScriptedStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Connect(inner)) => Ok(ScriptedStream {
                inner,
                panic_on_write: false,
            }),
            Some(Step::ConnectPoisoned(inner)) => Ok(ScriptedStream {
                inner,
                panic_on_write: true,
            }),
            Some(Step::Panic(msg)) => panic!("{}", msg),
            Some(Step::Refuse) | None => Err(io::ErrorKind::ConnectionRefused.into()),
        }
    }
}

/// Wire bytes for one collector-to-agent command.
pub fn command_frame(cmd: &Command) -> Vec<u8> {
    Frame::from_command(cmd, Compression::None)
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Read one packet sent by the agent.
pub async fn next_packet<R: AsyncRead + Unpin>(stream: &mut R) -> Packet {
    read_frame(stream, MAX)
        .await
        .unwrap()
        .decode_packet(MAX)
        .unwrap()
}

/// Wait until the client reports `wanted`.
pub async fn wait_for_state(state: &mut watch::Receiver<ConnectionState>, wanted: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(30), state.wait_for(|s| *s == wanted))
        .await
        .expect("state change timed out")
        .expect("client dropped");
}
