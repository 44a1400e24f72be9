//! Error types for apm-transport.

use thiserror::Error;

/// Main error type for all transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during dial, read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading settings.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Snappy compression or decompression error.
    #[error("Compression error: {0}")]
    Compression(#[from] snap::Error),

    /// Protocol error (unknown flag, oversized frame, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid settings.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Dial did not complete within the connect timeout.
    #[error("Timed out")]
    Timeout,

    /// Connection closed by the remote end or torn down locally.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A session task panicked; carries the panic message.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The upstream consumer dropped its receiver.
    #[error("Command consumer closed")]
    ConsumerClosed,
}

impl TransportError {
    /// Errors that mean the agent itself is going away, not the connection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportError::ConsumerClosed)
    }
}

/// Result type alias using TransportError.
pub type Result<T> = std::result::Result<T, TransportError>;
