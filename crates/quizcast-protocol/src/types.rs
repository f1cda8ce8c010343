//! Types that travel on the wire between game clients and the server.
//!
//! Field names are camelCase on the wire because the clients are browser
//! apps. Request and event enums are tagged by `"event"`; the outer
//! [`Payload`] is tagged by `"type"` with its body under `"data"`.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A member of a room. Issued by the room manager on join and unrelated to
/// the transport's connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// The client-chosen key that names a room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomKey(String);

impl RoomKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for an empty or whitespace-only key.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for RoomKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

// ---------------------------------------------------------------------------
// RoundState
// ---------------------------------------------------------------------------

/// Where a room is in its question cycle.
///
/// ```text
/// Waiting ──set question──→ Ready ──start round──→ Running
///    ↑                      │   ↺ set question        │
///    └──────────────── timeout | correct guess ───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    /// No question set, no timer.
    #[default]
    Waiting,
    /// Question set by the game master, timer not started.
    Ready,
    /// Timer running, guesses accepted.
    Running,
}

impl RoundState {
    pub fn accepts_guesses(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether the state machine has an edge from `self` to `target`.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Ready)
                | (Self::Ready, Self::Ready)
                | (Self::Ready, Self::Running)
                | (Self::Running, Self::Waiting)
        )
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client requests
// ---------------------------------------------------------------------------

/// A game action sent by a client. Every request is answered with an
/// [`Ack`] carrying the same request id.
///
/// String fields default to empty when missing so the room layer can
/// reject them as invalid requests instead of failing the whole frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientRequest {
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default)]
        room_key: RoomKey,
        #[serde(default)]
        name: String,
    },

    #[serde(rename_all = "camelCase")]
    SetQuestion {
        #[serde(default)]
        room_key: RoomKey,
        #[serde(default)]
        question: String,
        #[serde(default)]
        answer: String,
    },

    #[serde(rename_all = "camelCase")]
    StartRound {
        #[serde(default)]
        room_key: RoomKey,
        #[serde(default)]
        duration_seconds: Option<u64>,
    },

    #[serde(rename_all = "camelCase")]
    SubmitGuess {
        #[serde(default)]
        room_key: RoomKey,
        #[serde(default)]
        guess: String,
    },

    #[serde(rename_all = "camelCase")]
    Leave {
        #[serde(default)]
        room_key: RoomKey,
    },
}

impl ClientRequest {
    pub fn room_key(&self) -> &RoomKey {
        match self {
            Self::Join { room_key, .. }
            | Self::SetQuestion { room_key, .. }
            | Self::StartRound { room_key, .. }
            | Self::SubmitGuess { room_key, .. }
            | Self::Leave { room_key } => room_key,
        }
    }

    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::SetQuestion { .. } => "setQuestion",
            Self::StartRound { .. } => "startRound",
            Self::SubmitGuess { .. } => "submitGuess",
            Self::Leave { .. } => "leave",
        }
    }
}

// ---------------------------------------------------------------------------
// Acknowledgements
// ---------------------------------------------------------------------------

/// Failure categories reported back to the requesting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A required field is missing or blank.
    InvalidRequest,
    /// Unknown room, or the caller is not a member of it.
    NotFound,
    /// Only the game master may do this.
    Forbidden,
    /// Not allowed in the current round state.
    InvalidState,
    /// No guesses left this round.
    OutOfAttempts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

/// Reply to a [`ClientRequest`].
///
/// Only `status` is always present; the optional fields are filled in by
/// the requests they belong to (`memberId` on join, `attemptsLeft` and
/// `correct` on a guess, `message`/`kind` on errors).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<MemberId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_left: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            status: AckStatus::Ok,
            message: None,
            kind: None,
            member_id: None,
            attempts_left: None,
            correct: None,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            message: Some(message.into()),
            kind: Some(kind),
            ..Self::ok()
        }
    }

    pub fn joined(member_id: MemberId) -> Self {
        Self {
            member_id: Some(member_id),
            ..Self::ok()
        }
    }

    pub fn guessed(correct: bool, attempts_left: u8) -> Self {
        Self {
            correct: Some(correct),
            attempts_left: Some(attempts_left),
            ..Self::ok()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AckStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// Room events (broadcast to every member of a room)
// ---------------------------------------------------------------------------

/// One entry of the member list. Attempts are left out so members do not
/// learn more about each other than the attempt notices already reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub id: MemberId,
    pub name: String,
    pub score: u32,
}

/// The session snapshot broadcast after every membership or state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_key: RoomKey,
    /// In join order.
    pub members: Vec<MemberView>,
    pub game_master_id: MemberId,
    pub state: RoundState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub id: MemberId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundEndReason {
    #[serde(rename = "time expired")]
    TimeExpired,
    #[serde(rename = "correct guess")]
    CorrectGuess,
}

impl fmt::Display for RoundEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeExpired => write!(f, "time expired"),
            Self::CorrectGuess => write!(f, "correct guess"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RoomEvent {
    SessionUpdate(RoomSnapshot),

    /// The answer is deliberately not part of this event.
    QuestionSet { question: String },

    #[serde(rename_all = "camelCase")]
    RoundStarted { question: String, time_left: u32 },

    #[serde(rename_all = "camelCase")]
    TimerTick { time_left: u32 },

    #[serde(rename_all = "camelCase")]
    PlayerAttempt {
        member_id: MemberId,
        name: String,
        guess: String,
        attempts_left: u8,
    },

    RoundEnded {
        winner: Option<Winner>,
        answer: String,
        reason: RoundEndReason,
    },
}

// ---------------------------------------------------------------------------
// System messages
// ---------------------------------------------------------------------------

/// Connection plumbing that is not tied to any room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server, must be the first frame.
    Handshake { version: u32 },

    /// Server → Client: the handshake was accepted.
    HandshakeAck { connection_id: u64, server_time: u64 },

    /// Client → Server keep-alive; resets the idle timeout.
    Heartbeat { client_time: u64 },

    /// Server → Client, echoes `client_time` for RTT estimation.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Either direction: closing the connection.
    Disconnect { reason: String },

    /// Server → Client: a frame could not be processed. `code` follows
    /// HTTP conventions (400 = bad request).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Payload and Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),

    /// Client → Server game action. `id` is chosen by the client and echoed
    /// in the matching [`Payload::Ack`].
    Request { id: u64, request: ClientRequest },

    /// Server → Client reply to a request.
    Ack { id: u64, ack: Ack },

    /// Server → Client broadcast scoped to one room.
    #[serde(rename_all = "camelCase")]
    Event { room_key: RoomKey, event: RoomEvent },
}

/// Top-level frame. `seq` and `timestamp` are stamped by the sender; both
/// default to 0 so lightweight clients may omit them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub seq: u64,

    /// Milliseconds since the sender started.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: Payload,
}

/// Just the request id of a client frame.
///
/// Decodes even when the request body does not, so a malformed request
/// can still be answered with an ack carrying its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RequestHeader {
    payload: RequestIdPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "data")]
enum RequestIdPayload {
    Request { id: u64 },
}

impl RequestHeader {
    pub fn id(&self) -> u64 {
        match self.payload {
            RequestIdPayload::Request { id } => id,
        }
    }
}
