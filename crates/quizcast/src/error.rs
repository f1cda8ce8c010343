//! Unified error type for the Quizcast server.

use quizcast_protocol::ProtocolError;
use quizcast_room::RoomError;
use quizcast_transport::TransportError;

/// Top-level error wrapping every layer's error, so `?` converts across
/// crate boundaries.
#[derive(Debug, thiserror::Error)]
pub enum QuizcastError {
    /// Connection, send or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed frame or failed handshake.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A refused room operation.
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use quizcast_protocol::RoomKey;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: QuizcastError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, QuizcastError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: QuizcastError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, QuizcastError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error_keeps_message() {
        let err: QuizcastError = RoomError::NotFound(RoomKey::new("r1")).into();
        assert!(matches!(err, QuizcastError::Room(_)));
        assert_eq!(err.to_string(), "room r1 not found");
    }
}
