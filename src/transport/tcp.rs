//! Dialing the collector.
//!
//! # Example
//!
//! ```ignore
//! use apm_transport::transport::{Dialer, TcpDialer};
//!
//! let stream = TcpDialer::default().dial("127.0.0.1:8931").await?;
//! ```

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Source of fresh connections to the collector.
///
/// Each call returns a brand new stream; the client never reuses one across
/// sessions.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Connected byte stream type.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Establish one connection to `addr`.
    async fn dial(&self, addr: &str) -> std::io::Result<Self::Stream>;
}

/// Plain TCP dialer.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    nodelay: bool,
}

impl TcpDialer {
    /// Create a dialer. `nodelay` disables Nagle so heartbeats leave promptly.
    pub fn new(nodelay: bool) -> Self {
        Self { nodelay }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, addr: &str) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(self.nodelay)?;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_dial_connects_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let dialer = TcpDialer::default();
        let (dialed, accepted) = tokio::join!(dialer.dial(&addr), listener.accept());

        let stream = dialed.unwrap();
        assert!(stream.nodelay().unwrap());
        assert_eq!(accepted.unwrap().1, stream.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_dial_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(TcpDialer::default().dial(&addr).await.is_err());
    }
}
