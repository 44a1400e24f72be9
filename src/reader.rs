//! Inbound read loop.
//!
//! Pulls frames off a buffered view of the connection, decodes each payload
//! into one [`Command`] and hands it to the agent's consumer channel.

use std::convert::Infallible;

use tokio::io::{AsyncRead, BufReader};
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::protocol::{read_frame, Command};

/// Read and forward commands until the connection fails.
///
/// Every exit is an error that ends the current connection. Sending to a
/// full consumer channel suspends the loop, which stops reading from the
/// socket until the consumer catches up.
pub async fn read_loop<R>(
    reader: R,
    max_message_size: u32,
    consumer: &mpsc::Sender<Command>,
) -> Result<Infallible>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(max_message_size as usize, reader);

    loop {
        let command = match read_command(&mut reader, max_message_size).await {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(error = %e, "Read loop stopped");
                return Err(e);
            }
        };

        tracing::debug!(kind = command.kind, len = command.payload().len(), "Command received");

        if consumer.send(command).await.is_err() {
            tracing::warn!("Command consumer dropped, stopping read loop");
            return Err(TransportError::ConsumerClosed);
        }
    }
}

/// Decode exactly one command from the stream.
pub async fn read_command<R>(reader: &mut R, max_message_size: u32) -> Result<Command>
where
    R: AsyncRead + Unpin,
{
    read_frame(reader, max_message_size)
        .await?
        .decode_command(max_message_size)
}
