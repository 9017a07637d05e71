//! Byte transport for Lexgrid.
//!
//! The server speaks to players over whatever implements [`Transport`]
//! (accepts peers) and [`Connection`] (moves whole frames). The engine never
//! sees sockets; it only sees [`ConnectionId`]s.
//!
//! Frames larger than [`TransportConfig::max_frame_bytes`] are refused with
//! [`TransportError::FrameTooLarge`] and the connection stays usable.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Identifies one accepted connection for its whole lifetime.
///
/// A reconnecting player arrives on a new `ConnectionId`; the session layer
/// is what ties the two together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Limits applied to every accepted connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Largest inbound frame accepted. A full board resync for a 10×10 grid
    /// is well under 16 KiB; client frames are far smaller.
    pub max_frame_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 64 * 1024,
        }
    }
}

/// Accepts incoming player connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer and completes its handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// One player's frame pipe.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame. Safe to call while another task waits in
    /// [`recv`](Self::recv).
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next inbound frame, or `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}
