//! Rooms and rounds for Quizcast.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! members, its game master and the current round with its countdown.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates rooms on first join, drops them when empty
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomConfig`]: attempts, scoring and round limits
//! - [`RoomError`]: why an operation was refused

mod config;
mod error;
mod manager;
mod room;
mod round;

pub use config::RoomConfig;
pub use error::RoomError;
pub use manager::RoomManager;
pub use room::{GuessOutcome, LeaveOutcome, MemberSender, MemberStatus, RoomHandle, RoomInfo};
pub use round::answer_matches;
