//! Transport layer for Quizcast.
//!
//! The game server only needs a bidirectional, message-oriented pipe per
//! client. [`Transport`] hands out newly accepted sockets, [`Incoming`]
//! upgrades one of them, and [`Connection`] moves whole frames in both
//! directions. The WebSocket implementation is
//! the only one shipped today.
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
pub use websocket::{WebSocketConnection, WebSocketIncoming, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Identifier the transport assigns to each accepted connection.
///
/// Only used for logging and the handshake reply. Game identity (member
/// ids) is issued by the room layer and never derived from this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

/// Accepts incoming connections.
pub trait Transport: Send + Sync + 'static {
    type Incoming: Incoming;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client socket.
    ///
    /// No bytes are read from the peer here. The protocol upgrade happens
    /// in [`Incoming::upgrade`], off the accept loop.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// An accepted socket that has not finished its protocol upgrade.
pub trait Incoming: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Runs the upgrade handshake. A peer that never speaks keeps this
    /// pending, so callers should bound it with a timeout.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;

    fn peer_addr(&self) -> SocketAddr;
}

/// One client connection.
///
/// `send` and `recv` take `&self` and must not block each other, so a
/// connection can be shared between a reader loop and a writer task.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}
