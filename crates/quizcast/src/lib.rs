//! # Quizcast
//!
//! Real-time multiplayer trivia server.
//!
//! Clients join rooms by key over WebSocket. The first member of a room is
//! its game master: they set a question, start a timed round, and everyone
//! else races to guess the answer. Each room runs as its own actor task, so
//! rooms never block one another.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizcast::prelude::*;
//!
//! # async fn demo() -> Result<(), QuizcastError> {
//! let server = QuizcastServer::builder()
//!     .bind("0.0.0.0:4000")
//!     .room_config(RoomConfig {
//!         attempts_per_round: 5,
//!         ..RoomConfig::default()
//!     })
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::QuizcastError;
pub use server::{PROTOCOL_VERSION, QuizcastServer, QuizcastServerBuilder, ServerConfig};

/// Everything needed to run a server and speak its protocol.
pub mod prelude {
    pub use crate::{
        PROTOCOL_VERSION, QuizcastError, QuizcastServer, QuizcastServerBuilder, ServerConfig,
    };
    pub use quizcast_protocol::{
        Ack, AckStatus, ClientRequest, Codec, Envelope, ErrorKind, JsonCodec, MemberId, MemberView,
        Payload, ProtocolError, RoomEvent, RoomKey, RoomSnapshot, RoundEndReason, RoundState,
        SystemMessage, Winner,
    };
    pub use quizcast_room::{RoomConfig, RoomError};
    pub use quizcast_tick::CountdownConfig;
    pub use quizcast_transport::TransportError;
}
