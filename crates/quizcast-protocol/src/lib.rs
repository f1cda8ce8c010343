//! Wire protocol for Quizcast.
//!
//! - **Types** ([`Envelope`], [`Payload`], [`ClientRequest`], [`Ack`],
//!   [`RoomEvent`], ...): what travels between clients and the server.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those types become
//!   frames.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Room (game state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Ack, AckStatus, ClientRequest, Envelope, ErrorKind, MemberId, MemberView, Payload,
    RequestHeader, RoomEvent, RoomKey, RoomSnapshot, RoundEndReason, RoundState, SystemMessage,
    Winner,
};
