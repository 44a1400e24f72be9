//! Agent - minimal host process for the collector transport.
//!
//! This example demonstrates:
//! - Loading settings from a JSON file (or an address on the command line)
//! - Installing a `tracing` subscriber in the host, not in the library
//! - Running the supervised client and consuming inbound commands
//! - Sending a packet back through a `TransportHandle`
//!
//! # Running
//!
//! ```text
//! nc -lk 8931 > /dev/null &
//! RUST_LOG=apm_transport=debug cargo run --example agent -- 127.0.0.1:8931
//! ```

use apm_transport::{Client, Command, Compression, Packet, Settings};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Command kind the agent answers with an acknowledgement packet.
const KIND_ECHO: u8 = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let arg = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8931".to_string());
    let settings = if arg.ends_with(".json") {
        Settings::from_json_str(&std::fs::read_to_string(&arg)?)?
    } else {
        Settings::new(arg)
    };

    let (tx, mut rx) = mpsc::channel::<Command>(1024);
    let client = Client::builder(settings).build(tx)?;
    let handle = client.handle();
    let shutdown = client.shutdown_token();
    let transport = tokio::spawn(client.run());

    loop {
        tokio::select! {
            cmd = rx.recv() => {
                let Some(cmd) = cmd else { break };
                tracing::info!(
                    kind = cmd.kind,
                    len = cmd.payload().len(),
                    "Command from collector"
                );
                if cmd.kind == KIND_ECHO {
                    let reply = Packet::new(vec![Command::new(KIND_ECHO, cmd.payload().to_vec())]);
                    handle.send(&reply, Compression::Snappy).await?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping transport");
                break;
            }
        }
    }

    shutdown.cancel();
    transport.await?;
    Ok(())
}
