//! Transport module - how the client obtains a connection.
//!
//! The supervisor only sees the [`Dialer`] trait, so the same lifecycle runs
//! over TCP in production and over in-memory streams in tests.

mod tcp;

pub use tcp::{Dialer, TcpDialer};
