//! `QuizcastServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → rooms.

use std::sync::Arc;
use std::time::Duration;

use quizcast_protocol::{Codec, JsonCodec};
use quizcast_room::{RoomConfig, RoomManager};
use quizcast_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::QuizcastError;
use crate::handler::serve;

/// Clients must send this version in their handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Server settings. Game rules live in [`RoomConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// A connection that sends nothing for this long is closed.
    pub idle_timeout: Duration,
    /// How long a new connection has to finish its WebSocket upgrade, and
    /// then again to send its handshake.
    pub handshake_timeout: Duration,
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".to_string(),
            idle_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(5),
            room: RoomConfig::default(),
        }
    }
}

/// State shared by every connection task.
pub(crate) struct ServerState<C: Codec> {
    /// Held only for lookup, join and leave.
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    pub(crate) handshake_timeout: Duration,
    started: Instant,
}

impl<C: Codec> ServerState<C> {
    /// Milliseconds since the server started; used for every timestamp
    /// the server stamps on a frame.
    pub(crate) fn server_time(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Quizcast server.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), quizcast::QuizcastError> {
/// use quizcast::prelude::*;
///
/// let server = QuizcastServer::builder()
///     .bind("0.0.0.0:4000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct QuizcastServerBuilder {
    config: ServerConfig,
}

impl QuizcastServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Binds the listener. Frames are JSON over WebSocket.
    pub async fn build(self) -> Result<QuizcastServer<JsonCodec>, QuizcastError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomManager::with_config(self.config.room)),
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
            handshake_timeout: self.config.handshake_timeout,
            started: Instant::now(),
        });

        Ok(QuizcastServer { transport, state })
    }
}

impl Default for QuizcastServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Quizcast server. Call [`run()`](Self::run) to start accepting.
pub struct QuizcastServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl QuizcastServer<JsonCodec> {
    pub fn builder() -> QuizcastServerBuilder {
        QuizcastServerBuilder::new()
    }
}

impl<C: Codec> QuizcastServer<C> {
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Accepts connections and spawns a handler task for each. Runs until
    /// the task is dropped.
    ///
    /// The loop only accepts sockets. The WebSocket upgrade runs in the
    /// spawned task, so a client that never finishes it only stalls itself.
    pub async fn run(mut self) -> Result<(), QuizcastError> {
        tracing::info!(addr = ?self.local_addr().ok(), "quizcast server running");

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = serve(incoming, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:4000");
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.room.attempts_per_round, 3);
    }

    #[test]
    fn test_builder_overrides() {
        let builder = QuizcastServerBuilder::new()
            .bind("0.0.0.0:9000")
            .idle_timeout(Duration::from_secs(3))
            .room_config(RoomConfig {
                points_per_correct_guess: 5,
                ..RoomConfig::default()
            });
        assert_eq!(builder.config.bind_addr, "0.0.0.0:9000");
        assert_eq!(builder.config.idle_timeout, Duration::from_secs(3));
        assert_eq!(builder.config.room.points_per_correct_guess, 5);
    }
}
