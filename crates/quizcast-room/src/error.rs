//! Error types for the room layer.

use quizcast_protocol::{ErrorKind, MemberId, RoomKey};

/// Why a room operation was refused.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A required field is missing, blank, or out of range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("room {0} not found")]
    NotFound(RoomKey),

    #[error("member {0} is not in room {1}")]
    NotInRoom(MemberId, RoomKey),

    /// The second field names the refused action, e.g. "start a round".
    #[error("only the game master of room {0} can {1}")]
    Forbidden(RoomKey, &'static str),

    /// The action does not fit the current round state.
    #[error("{0}")]
    InvalidState(String),

    #[error("member {0} has no attempts left this round")]
    OutOfAttempts(MemberId),

    /// The room's actor has already stopped, normally because the last
    /// member just left.
    #[error("room {0} is unavailable")]
    Unavailable(RoomKey),
}

impl RoomError {
    /// The category reported to clients in an error ack.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::NotFound(_) | Self::NotInRoom(..) | Self::Unavailable(_) => ErrorKind::NotFound,
            Self::Forbidden(..) => ErrorKind::Forbidden,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::OutOfAttempts(_) => ErrorKind::OutOfAttempts,
        }
    }
}
