//! Client builder and connection supervisor.
//!
//! The [`Client`] keeps one live connection to the collector at (almost)
//! all times. Every iteration of its loop is a *session*:
//! 1. Dial, retrying forever with a fixed backoff
//! 2. Spawn the writer task and the heartbeat
//! 3. Run the read loop until it fails
//! 4. Tear everything down and start again from step 1
//!
//! Sessions run in their own task. A panic inside one is caught at the task
//! boundary, logged, and handled like any other connection failure. The
//! session in turn watches its heartbeat and writer tasks; if either stops
//! early or panics, the session ends and the client redials.
//!
//! # Example
//!
//! ```ignore
//! use apm_transport::{Client, Settings};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::channel(1024);
//!     let client = Client::builder(Settings::new("10.0.0.5:8931")).build(tx)?;
//!     let handle = client.handle();
//!
//!     tokio::spawn(client.run());
//!
//!     while let Some(cmd) = rx.recv().await {
//!         println!("command {} ({} bytes)", cmd.kind, cmd.payload().len());
//!     }
//!     Ok(())
//! }
//! ```

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{Settings, MAX_HEARTBEAT_INTERVAL};
use crate::error::{Result, TransportError};
use crate::heartbeat::run_heartbeat_loop;
use crate::protocol::{Command, Compression, Packet};
use crate::reader::read_loop;
use crate::transport::{Dialer, TcpDialer};
use crate::writer::{spawn_writer_task, FrameWriter, DEFAULT_CHANNEL_CAPACITY};

/// Lifecycle state of the supervised connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Between sessions, or stopped.
    Idle,
    /// Trying to reach the collector.
    Dialing,
    /// Heartbeat and read loop are running.
    Connected,
    /// Session is being torn down.
    Closing,
}

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub remote_address: String,
    pub heartbeat_interval: Duration,
    pub retry_backoff: Duration,
    pub connect_timeout: Duration,
    pub max_message_size: u32,
    pub writer_channel_capacity: usize,
}

impl From<&Settings> for ClientConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            remote_address: settings.remote_address.clone(),
            heartbeat_interval: settings.heartbeat_interval(),
            retry_backoff: settings.retry_backoff(),
            connect_timeout: settings.connect_timeout(),
            max_message_size: settings.max_message_size,
            writer_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Builder for configuring and creating a transport client.
pub struct ClientBuilder<D = TcpDialer> {
    settings: Settings,
    config: ClientConfig,
    dialer: D,
}

impl ClientBuilder<TcpDialer> {
    /// Create a builder from settings, dialing over TCP.
    pub fn new(settings: Settings) -> Self {
        Self {
            config: ClientConfig::from(&settings),
            settings,
            dialer: TcpDialer::default(),
        }
    }
}

impl<D: Dialer> ClientBuilder<D> {
    /// Override the heartbeat interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Override the wait between failed dial attempts.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    /// Override the per-attempt dial timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Override the largest accepted inbound message.
    pub fn max_message_size(mut self, size: u32) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the outbound frame queue capacity.
    ///
    /// Default: 64
    pub fn writer_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer_channel_capacity = capacity;
        self
    }

    /// Use a different connection source.
    pub fn dialer<D2: Dialer>(self, dialer: D2) -> ClientBuilder<D2> {
        ClientBuilder {
            settings: self.settings,
            config: self.config,
            dialer,
        }
    }

    /// Validate the configuration and create the client.
    ///
    /// Decoded commands are delivered to `consumer`; its capacity bounds how
    /// far the read loop can run ahead of the agent.
    pub fn build(self, consumer: mpsc::Sender<Command>) -> Result<Client<D>> {
        self.settings.validate()?;
        let config = self.config;
        if config.heartbeat_interval.is_zero() {
            return Err(TransportError::Config(
                "heartbeat interval must be positive".to_string(),
            ));
        }
        if config.heartbeat_interval > MAX_HEARTBEAT_INTERVAL {
            return Err(TransportError::Config(
                "heartbeat interval must be at most one day".to_string(),
            ));
        }
        if config.retry_backoff.is_zero() || config.connect_timeout.is_zero() {
            return Err(TransportError::Config(
                "retry backoff and connect timeout must be positive".to_string(),
            ));
        }
        if config.max_message_size == 0 {
            return Err(TransportError::Config(
                "max message size must be positive".to_string(),
            ));
        }

        let (writer, _) = watch::channel(None);
        let (state, _) = watch::channel(ConnectionState::Idle);

        Ok(Client {
            shared: Arc::new(Shared {
                config,
                dialer: self.dialer,
                consumer,
                link: Arc::new(Link { writer, state }),
            }),
            shutdown: CancellationToken::new(),
        })
    }
}

/// Current connection slot and state, shared with handles and the session guard.
struct Link {
    writer: watch::Sender<Option<FrameWriter>>,
    state: watch::Sender<ConnectionState>,
}

impl Link {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

struct Shared<D> {
    config: ClientConfig,
    dialer: D,
    consumer: mpsc::Sender<Command>,
    link: Arc<Link>,
}

/// How a session ended.
#[derive(Debug)]
enum SessionEnd {
    /// Connection failed; redial.
    Failed(TransportError),
    /// Client is stopping.
    Shutdown,
}

/// The supervised transport client.
pub struct Client<D = TcpDialer> {
    shared: Arc<Shared<D>>,
    shutdown: CancellationToken,
}

impl Client<TcpDialer> {
    /// Create a new client builder.
    pub fn builder(settings: Settings) -> ClientBuilder<TcpDialer> {
        ClientBuilder::new(settings)
    }
}

impl<D: Dialer> Client<D> {
    /// Handle for sending packets on whichever connection is live.
    pub fn handle(&self) -> TransportHandle {
        TransportHandle {
            writer: self.shared.link.writer.subscribe(),
        }
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.link.state.subscribe()
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Run the supervisor loop.
    ///
    /// Only returns after the shutdown token is cancelled or the command
    /// consumer is dropped. Connection failures and panics inside a session
    /// restart the session instead.
    pub async fn run(self) {
        let span = tracing::info_span!("transport", addr = %self.shared.config.remote_address);
        self.supervise().instrument(span).await
    }

    async fn supervise(self) {
        // Dropping the run future mid-session still stops the session task.
        let _stop_on_drop = self.shutdown.clone().drop_guard();
        let mut restarts = 0u64;

        while !self.shutdown.is_cancelled() {
            let session = tokio::spawn(
                run_session(self.shared.clone(), self.shutdown.clone()).in_current_span(),
            );
            let outcome = session.await;
            self.shared.link.set_state(ConnectionState::Idle);

            match outcome {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Failed(e)) => {
                    tracing::warn!(error = %e, restarts, "Connection lost, restarting transport");
                }
                Err(e) if e.is_panic() => {
                    let panic = panic_message(e.into_panic());
                    tracing::error!(panic = %panic, restarts, "Transport panicked, restarting");
                }
                Err(e) => {
                    tracing::warn!(error = %e, restarts, "Transport session aborted, restarting");
                }
            }
            restarts += 1;
        }

        self.shared.link.writer.send_replace(None);
        self.shared.link.set_state(ConnectionState::Idle);
        tracing::info!(restarts, "Transport stopped");
    }
}

/// Cloneable handle for the agent's outbound packets.
#[derive(Clone)]
pub struct TransportHandle {
    writer: watch::Receiver<Option<FrameWriter>>,
}

impl TransportHandle {
    /// Send a packet on the live connection.
    ///
    /// Without a live connection this is a no-op returning `Ok(())`, so
    /// callers racing with a reconnect do not see spurious errors.
    pub async fn send(&self, packet: &Packet, compression: Compression) -> Result<()> {
        let writer = self.writer.borrow().clone();
        match writer {
            Some(writer) => writer.write_packet(packet, compression).await,
            None => {
                tracing::debug!(cmds = packet.len(), "No live connection, packet not sent");
                Ok(())
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.writer.borrow().is_some()
    }
}

/// Tears a session down on every exit path, unwinding included.
struct SessionGuard {
    link: Arc<Link>,
    heartbeat_cancel: CancellationToken,
    writer_task: JoinHandle<Result<()>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.heartbeat_cancel.cancel();
        self.link.writer.send_replace(None);
        self.writer_task.abort();
    }
}

async fn run_session<D: Dialer>(shared: Arc<Shared<D>>, shutdown: CancellationToken) -> SessionEnd {
    let config = &shared.config;

    let Some(stream) = dial_with_retry(&shared, &shutdown).await else {
        return SessionEnd::Shutdown;
    };
    tracing::info!("Connected to collector");

    let (read_half, write_half) = tokio::io::split(stream);
    let (writer, writer_task) = spawn_writer_task(write_half, config.writer_channel_capacity);
    let heartbeat_cancel = shutdown.child_token();
    let mut guard = SessionGuard {
        link: shared.link.clone(),
        heartbeat_cancel: heartbeat_cancel.clone(),
        writer_task,
    };

    shared.link.writer.send_replace(Some(writer.clone()));
    let mut heartbeat = tokio::spawn(
        run_heartbeat_loop(writer, config.heartbeat_interval, heartbeat_cancel).in_current_span(),
    );
    shared.link.set_state(ConnectionState::Connected);

    // Heartbeat and writer only stop on their own after a fault.
    let mut heartbeat_joined = false;
    let end = tokio::select! {
        biased;
        _ = shutdown.cancelled() => SessionEnd::Shutdown,
        result = read_loop(read_half, config.max_message_size, &shared.consumer) => match result {
            Err(e) if e.is_terminal() => SessionEnd::Shutdown,
            Err(e) => SessionEnd::Failed(e),
            Ok(never) => match never {},
        },
        joined = &mut heartbeat => {
            heartbeat_joined = true;
            SessionEnd::Failed(task_failure("heartbeat", joined.map(|_| Ok(()))))
        }
        joined = &mut guard.writer_task => SessionEnd::Failed(task_failure("writer", joined)),
    };

    shared.link.set_state(ConnectionState::Closing);
    drop(guard);
    if !heartbeat_joined {
        if let Err(e) = heartbeat.await {
            tracing::warn!(error = %e, "Heartbeat task ended abnormally");
        }
    }
    tracing::debug!(?end, "Session closed");
    end
}

/// Turn an early exit of a session task into the error that ends the session.
fn task_failure(
    task: &'static str,
    joined: std::result::Result<Result<()>, JoinError>,
) -> TransportError {
    match joined {
        Ok(Ok(())) => {
            tracing::warn!(task, "Session task stopped unexpectedly");
            TransportError::ConnectionClosed
        }
        Ok(Err(e)) => {
            tracing::warn!(task, error = %e, "Session task failed");
            e
        }
        Err(e) if e.is_panic() => {
            let panic = panic_message(e.into_panic());
            tracing::error!(task, panic = %panic, "Session task panicked");
            TransportError::Panicked(panic)
        }
        Err(e) => {
            tracing::warn!(task, error = %e, "Session task aborted");
            TransportError::ConnectionClosed
        }
    }
}

/// Dial until it works or the client shuts down.
async fn dial_with_retry<D: Dialer>(
    shared: &Shared<D>,
    shutdown: &CancellationToken,
) -> Option<D::Stream> {
    let config = &shared.config;
    let mut attempt = 0u64;

    loop {
        attempt += 1;
        shared.link.set_state(ConnectionState::Dialing);

        let dial = tokio::time::timeout(
            config.connect_timeout,
            shared.dialer.dial(&config.remote_address),
        );
        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return None,
            result = dial => result,
        };

        let result = result
            .map_err(|_| TransportError::Timeout)
            .and_then(|dialed| dialed.map_err(TransportError::from));

        match result {
            Ok(stream) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Dial succeeded after retries");
                }
                return Some(stream);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    backoff_ms = config.retry_backoff.as_millis() as u64,
                    "Dial failed, retrying"
                );
            }
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return None,
            _ = tokio::time::sleep(config.retry_backoff) => {}
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
