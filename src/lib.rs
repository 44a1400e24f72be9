//! # apm-transport
//!
//! Collector transport for the APM agent.
//!
//! Keeps a persistent TCP stream to the collector, sends heartbeats on a
//! fixed cadence, decodes inbound commands and hands them to the agent
//! through a bounded channel. Any failure, panics included, tears the
//! connection down and redials.
//!
//! ## Architecture
//!
//! - **Supervisor** ([`Client`]): dial with retry, run one session, restart
//! - **Read loop** ([`reader`]): frames → commands → consumer channel
//! - **Writer task** ([`writer`]): single owner of the socket's write half
//! - **Heartbeat** ([`heartbeat`]): one ping packet per interval
//! - **Wire format** ([`protocol`], [`codec`]): flag + length + MsgPack, optional snappy
//!
//! ## Example
//!
//! ```ignore
//! use apm_transport::{Client, Command, Settings};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_json_str(r#"{"remote_address": "10.0.0.5:8931"}"#)?;
//!     let (tx, mut rx) = mpsc::channel::<Command>(1024);
//!
//!     let client = Client::builder(settings).build(tx)?;
//!     tokio::spawn(client.run());
//!
//!     while let Some(cmd) = rx.recv().await {
//!         // hand over to the agent
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod protocol;
pub mod reader;
pub mod transport;
pub mod writer;

mod client;

pub use client::{Client, ClientBuilder, ClientConfig, ConnectionState, TransportHandle};
pub use config::Settings;
pub use error::TransportError;
pub use protocol::{Command, Compression, Packet};
