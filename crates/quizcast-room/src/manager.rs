//! Room manager: the registry from room key to running room.

use std::collections::HashMap;

use quizcast_protocol::{MemberId, RoomKey, RoomSnapshot};
use tracing::{info, warn};

use crate::room::spawn_room;
use crate::{GuessOutcome, LeaveOutcome, MemberSender, RoomConfig, RoomError, RoomHandle, RoomInfo};

/// Owns every live room.
///
/// Rooms come into being on the first join to an unused key and disappear
/// when their last member leaves, so a key with no entry here is simply a
/// room nobody is in. Member ids are issued here and are unique across
/// all rooms for the lifetime of the manager.
pub struct RoomManager {
    rooms: HashMap<RoomKey, RoomHandle>,
    config: RoomConfig,
    next_member_id: u64,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::with_config(RoomConfig::default())
    }

    pub fn with_config(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            next_member_id: 1,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Adds a member named `name` to the room at `room_key`, creating the
    /// room (with this member as game master) if nobody is in it.
    ///
    /// Every member of the room, including the new one, receives the
    /// updated snapshot through its sender before this returns.
    pub async fn join(
        &mut self,
        room_key: RoomKey,
        name: &str,
        sender: MemberSender,
    ) -> Result<MemberId, RoomError> {
        if room_key.is_blank() {
            return Err(RoomError::InvalidRequest("roomKey is required".into()));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(RoomError::InvalidRequest("name is required".into()));
        }

        let member_id = MemberId(self.next_member_id);
        self.next_member_id += 1;

        if let Some(handle) = self.rooms.get(&room_key) {
            match handle.join(member_id, name.to_owned(), sender.clone()).await {
                Ok(()) => return Ok(member_id),
                Err(RoomError::Unavailable(_)) => {
                    warn!(%room_key, "room actor gone, recreating room");
                    self.rooms.remove(&room_key);
                }
                Err(e) => return Err(e),
            }
        }

        let handle = spawn_room(
            room_key.clone(),
            self.config.clone(),
            member_id,
            name.to_owned(),
            sender,
        );
        self.rooms.insert(room_key.clone(), handle);
        info!(%room_key, rooms = self.rooms.len(), "room created");
        Ok(member_id)
    }

    /// A clone of the room's handle. Callers that share the manager behind
    /// a lock use this to talk to the room without holding the lock.
    pub fn handle(&self, room_key: &RoomKey) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(room_key)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_key.clone()))
    }

    pub async fn set_question(
        &self,
        room_key: &RoomKey,
        member_id: MemberId,
        question: String,
        answer: String,
    ) -> Result<(), RoomError> {
        self.handle(room_key)?
            .set_question(member_id, question, answer)
            .await
    }

    pub async fn start_round(
        &self,
        room_key: &RoomKey,
        member_id: MemberId,
        duration_secs: u64,
    ) -> Result<(), RoomError> {
        self.handle(room_key)?.start_round(member_id, duration_secs).await
    }

    pub async fn submit_guess(
        &self,
        room_key: &RoomKey,
        member_id: MemberId,
        guess: String,
    ) -> Result<GuessOutcome, RoomError> {
        self.handle(room_key)?.submit_guess(member_id, guess).await
    }

    /// Removes a member. Leaving a room one is not in is a no-op. The room
    /// is dropped from the registry once its last member is gone.
    pub async fn leave(&mut self, room_key: &RoomKey, member_id: MemberId) -> LeaveOutcome {
        let Some(handle) = self.rooms.get(room_key) else {
            return LeaveOutcome::NotMember;
        };

        match handle.leave(member_id).await {
            Ok(LeaveOutcome::Closed) => {
                self.rooms.remove(room_key);
                info!(%room_key, rooms = self.rooms.len(), "room destroyed");
                LeaveOutcome::Closed
            }
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(%room_key, "room actor gone, dropping room");
                self.rooms.remove(room_key);
                LeaveOutcome::NotMember
            }
        }
    }

    /// Leaves every listed membership, e.g. when a connection closes.
    pub async fn leave_all(&mut self, memberships: impl IntoIterator<Item = (RoomKey, MemberId)>) {
        for (room_key, member_id) in memberships {
            self.leave(&room_key, member_id).await;
        }
    }

    pub async fn snapshot(&self, room_key: &RoomKey) -> Result<RoomSnapshot, RoomError> {
        self.handle(room_key)?.snapshot().await
    }

    pub async fn info(&self, room_key: &RoomKey) -> Result<RoomInfo, RoomError> {
        self.handle(room_key)?.info().await
    }

    pub fn contains(&self, room_key: &RoomKey) -> bool {
        self.rooms.contains_key(room_key)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn test_blank_key_or_name_is_rejected() {
        let mut manager = RoomManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = manager.join(RoomKey::new("  "), "ann", tx.clone()).await.unwrap_err();
        assert!(matches!(err, RoomError::InvalidRequest(_)));

        let err = manager.join(RoomKey::new("r1"), "", tx).await.unwrap_err();
        assert!(matches!(err, RoomError::InvalidRequest(_)));
        assert_eq!(manager.room_count(), 0);
    }

    #[tokio::test]
    async fn test_member_ids_are_unique_across_rooms() {
        let mut manager = RoomManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let a = manager.join(RoomKey::new("r1"), "ann", tx.clone()).await.unwrap();
        let b = manager.join(RoomKey::new("r2"), "bob", tx.clone()).await.unwrap();
        let c = manager.join(RoomKey::new("r1"), "cat", tx).await.unwrap();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert_eq!(manager.room_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found() {
        let manager = RoomManager::new();
        let err = manager.snapshot(&RoomKey::new("nope")).await.unwrap_err();
        assert!(matches!(err, RoomError::NotFound(_)));
        assert!(manager.handle(&RoomKey::new("nope")).is_err());
    }

    #[tokio::test]
    async fn test_leave_unknown_room_is_a_no_op() {
        let mut manager = RoomManager::new();
        let outcome = manager.leave(&RoomKey::new("nope"), MemberId(1)).await;
        assert_eq!(outcome, LeaveOutcome::NotMember);
    }
}
