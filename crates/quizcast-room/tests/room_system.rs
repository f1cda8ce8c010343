//! Integration tests for rooms and rounds.
//!
//! Time is paused, so countdowns run instantly and deterministically once
//! the test task goes to sleep.

use std::time::Duration;

use quizcast_protocol::{MemberId, Payload, RoomEvent, RoomKey, RoundEndReason, RoundState, Winner};
use quizcast_room::{LeaveOutcome, RoomConfig, RoomError, RoomManager};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

struct Client {
    id: MemberId,
    rx: mpsc::UnboundedReceiver<Payload>,
}

impl Client {
    /// Everything delivered so far, in order.
    fn events(&mut self) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        while let Ok(payload) = self.rx.try_recv() {
            if let Payload::Event { event, .. } = payload {
                events.push(event);
            }
        }
        events
    }
}

fn key() -> RoomKey {
    RoomKey::new("r1")
}

async fn join(manager: &mut RoomManager, name: &str) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = manager.join(key(), name, tx).await.expect("join");
    Client { id, rx }
}

/// A room with `gm` and `player`, a question set and both inboxes drained.
async fn ready_room(manager: &mut RoomManager) -> (Client, Client) {
    let mut gm = join(manager, "ann").await;
    let mut player = join(manager, "bob").await;
    manager
        .set_question(&key(), gm.id, "Capital of France?".into(), "Paris".into())
        .await
        .expect("set question");
    gm.events();
    player.events();
    (gm, player)
}

fn ticks(events: &[RoomEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            RoomEvent::TimerTick { time_left } => Some(*time_left),
            _ => None,
        })
        .collect()
}

// =========================================================================
// Join and leave
// =========================================================================

#[tokio::test]
async fn test_first_joiner_becomes_game_master() {
    let mut manager = RoomManager::new();
    let mut ann = join(&mut manager, "ann").await;

    let events = ann.events();
    let [RoomEvent::SessionUpdate(snapshot)] = events.as_slice() else {
        panic!("expected one snapshot, got {events:?}");
    };
    assert_eq!(snapshot.game_master_id, ann.id);
    assert_eq!(snapshot.state, RoundState::Waiting);
    assert_eq!(snapshot.members.len(), 1);
    assert_eq!(snapshot.members[0].score, 0);
}

#[tokio::test]
async fn test_join_broadcasts_snapshot_to_everyone() {
    let mut manager = RoomManager::new();
    let mut ann = join(&mut manager, "ann").await;
    ann.events();
    let mut bob = join(&mut manager, "bob").await;
    let gm_id = ann.id;

    for client in [&mut ann, &mut bob] {
        let events = client.events();
        let Some(RoomEvent::SessionUpdate(snapshot)) = events.last() else {
            panic!("expected a snapshot, got {events:?}");
        };
        let names: Vec<_> = snapshot.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["ann", "bob"]);
        assert_eq!(snapshot.game_master_id, gm_id);
    }
}

#[tokio::test]
async fn test_game_master_leaving_promotes_oldest_member() {
    let mut manager = RoomManager::new();
    let ann = join(&mut manager, "ann").await;
    let mut bob = join(&mut manager, "bob").await;
    let _cat = join(&mut manager, "cat").await;
    bob.events();

    assert_eq!(manager.leave(&key(), ann.id).await, LeaveOutcome::Left);

    let events = bob.events();
    let Some(RoomEvent::SessionUpdate(snapshot)) = events.last() else {
        panic!("expected a snapshot, got {events:?}");
    };
    assert_eq!(snapshot.game_master_id, bob.id);
    assert_eq!(snapshot.members.len(), 2);
}

#[tokio::test]
async fn test_last_leave_destroys_room_and_rejoin_starts_fresh() {
    let mut manager = RoomManager::new();
    let (gm, player) = ready_room(&mut manager).await;

    manager.leave(&key(), player.id).await;
    assert_eq!(manager.leave(&key(), gm.id).await, LeaveOutcome::Closed);
    assert!(!manager.contains(&key()));
    assert_eq!(manager.room_count(), 0);

    let dan = join(&mut manager, "dan").await;
    let info = manager.info(&key()).await.unwrap();
    assert_eq!(info.game_master, dan.id);
    assert_eq!(info.state, RoundState::Waiting);
    assert_eq!(info.member_count(), 1);
}

#[tokio::test]
async fn test_leave_twice_is_a_no_op() {
    let mut manager = RoomManager::new();
    let ann = join(&mut manager, "ann").await;
    let bob = join(&mut manager, "bob").await;

    assert_eq!(manager.leave(&key(), bob.id).await, LeaveOutcome::Left);
    assert_eq!(manager.leave(&key(), bob.id).await, LeaveOutcome::NotMember);
    assert_eq!(manager.info(&key()).await.unwrap().game_master, ann.id);
}

// =========================================================================
// Permissions and validation
// =========================================================================

#[tokio::test]
async fn test_only_game_master_sets_question() {
    let mut manager = RoomManager::new();
    let _ann = join(&mut manager, "ann").await;
    let bob = join(&mut manager, "bob").await;

    let err = manager
        .set_question(&key(), bob.id, "Q?".into(), "A".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::Forbidden(..)));
    assert_eq!(manager.snapshot(&key()).await.unwrap().state, RoundState::Waiting);
}

#[tokio::test]
async fn test_only_game_master_starts_round() {
    let mut manager = RoomManager::new();
    let (_gm, player) = ready_room(&mut manager).await;

    let err = manager.start_round(&key(), player.id, 30).await.unwrap_err();
    assert!(matches!(err, RoomError::Forbidden(..)));
    assert_eq!(manager.info(&key()).await.unwrap().state, RoundState::Ready);
}

#[tokio::test]
async fn test_blank_question_or_answer_is_rejected() {
    let mut manager = RoomManager::new();
    let gm = join(&mut manager, "ann").await;

    let err = manager
        .set_question(&key(), gm.id, " ".into(), "A".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::InvalidRequest(_)));

    let err = manager
        .set_question(&key(), gm.id, "Q?".into(), "".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_round_duration_must_be_in_range() {
    let mut manager = RoomManager::with_config(RoomConfig {
        max_round_secs: 120,
        ..RoomConfig::default()
    });
    let (gm, _player) = ready_room(&mut manager).await;

    for secs in [0, 121, u64::MAX] {
        let err = manager.start_round(&key(), gm.id, secs).await.unwrap_err();
        assert!(matches!(err, RoomError::InvalidRequest(_)), "{secs}: {err}");
    }
    assert_eq!(manager.info(&key()).await.unwrap().state, RoundState::Ready);
}

#[tokio::test]
async fn test_start_without_question_is_invalid_state() {
    let mut manager = RoomManager::new();
    let gm = join(&mut manager, "ann").await;

    let err = manager.start_round(&key(), gm.id, 30).await.unwrap_err();
    assert!(matches!(err, RoomError::InvalidState(_)));
}

#[tokio::test]
async fn test_guess_outside_round_is_invalid_state() {
    let mut manager = RoomManager::new();
    let (_gm, player) = ready_room(&mut manager).await;

    let err = manager
        .submit_guess(&key(), player.id, "Paris".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::InvalidState(_)));
    assert_eq!(manager.info(&key()).await.unwrap().member(player.id).unwrap().attempts_left, 3);
}

#[tokio::test]
async fn test_non_member_cannot_guess() {
    let mut manager = RoomManager::new();
    let (gm, _player) = ready_room(&mut manager).await;
    manager.start_round(&key(), gm.id, 30).await.unwrap();

    let err = manager
        .submit_guess(&key(), MemberId(999), "Paris".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::NotInRoom(..)));
}

// =========================================================================
// Rounds
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_correct_guess_ends_round_and_scores() {
    let mut manager = RoomManager::new();
    let (mut gm, player) = ready_room(&mut manager).await;

    manager.start_round(&key(), gm.id, 30).await.unwrap();
    let started = gm.events();
    assert!(matches!(
        started.first(),
        Some(RoomEvent::RoundStarted { time_left: 30, .. })
    ));

    let outcome = manager
        .submit_guess(&key(), player.id, " paris ".into())
        .await
        .unwrap();
    assert!(outcome.correct);
    assert_eq!(outcome.attempts_left, 2);

    let events = gm.events();
    assert_eq!(events.len(), 3, "{events:?}");
    assert!(matches!(
        &events[0],
        RoomEvent::PlayerAttempt { member_id, attempts_left: 2, .. } if *member_id == player.id
    ));
    assert_eq!(
        events[1],
        RoomEvent::RoundEnded {
            winner: Some(Winner {
                id: player.id,
                name: "bob".into(),
            }),
            answer: "Paris".into(),
            reason: RoundEndReason::CorrectGuess,
        }
    );
    let RoomEvent::SessionUpdate(snapshot) = &events[2] else {
        panic!("expected a snapshot, got {:?}", events[2]);
    };
    assert_eq!(snapshot.state, RoundState::Waiting);
    let bob = snapshot.members.iter().find(|m| m.id == player.id).unwrap();
    assert_eq!(bob.score, 10);

    // The countdown went with the round.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(ticks(&gm.events()).is_empty());
    let info = manager.info(&key()).await.unwrap();
    assert!(!info.countdown_active);
    assert_eq!(info.time_left, None);
}

#[tokio::test(start_paused = true)]
async fn test_round_times_out_without_winner() {
    let mut manager = RoomManager::new();
    let (mut gm, mut player) = ready_room(&mut manager).await;

    manager.start_round(&key(), gm.id, 3).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;

    let events = player.events();
    assert_eq!(ticks(&events), [2, 1, 0]);
    let ended: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, RoomEvent::RoundEnded { .. }))
        .collect();
    assert_eq!(
        ended,
        [&RoomEvent::RoundEnded {
            winner: None,
            answer: "Paris".into(),
            reason: RoundEndReason::TimeExpired,
        }]
    );
    assert!(matches!(
        events.last(),
        Some(RoomEvent::SessionUpdate(s)) if s.state == RoundState::Waiting
    ));
    assert_eq!(ticks(&gm.events()), [2, 1, 0]);

    let err = manager
        .submit_guess(&key(), player.id, "Paris".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::InvalidState(_)));
}

#[tokio::test(start_paused = true)]
async fn test_time_left_counts_down() {
    let mut manager = RoomManager::new();
    let (gm, _player) = ready_room(&mut manager).await;

    manager.start_round(&key(), gm.id, 10).await.unwrap();
    tokio::time::sleep(Duration::from_millis(4500)).await;

    let info = manager.info(&key()).await.unwrap();
    assert_eq!(info.state, RoundState::Running);
    assert!(info.countdown_active);
    assert_eq!(info.time_left, Some(6));
}

#[tokio::test(start_paused = true)]
async fn test_wrong_guesses_use_up_attempts() {
    let mut manager = RoomManager::new();
    let (gm, player) = ready_room(&mut manager).await;
    manager.start_round(&key(), gm.id, 30).await.unwrap();

    for expected in [2, 1, 0] {
        let outcome = manager
            .submit_guess(&key(), player.id, "Lyon".into())
            .await
            .unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.attempts_left, expected);
    }

    let err = manager
        .submit_guess(&key(), player.id, "Paris".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::OutOfAttempts(id) if id == player.id));
    assert_eq!(manager.info(&key()).await.unwrap().state, RoundState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_while_running_is_rejected() {
    let mut manager = RoomManager::new();
    let (gm, mut player) = ready_room(&mut manager).await;

    manager.start_round(&key(), gm.id, 5).await.unwrap();
    let err = manager.start_round(&key(), gm.id, 5).await.unwrap_err();
    assert!(matches!(err, RoomError::InvalidState(_)));

    // Still exactly one countdown: one tick per second.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(ticks(&player.events()), [4, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_question_cannot_change_mid_round() {
    let mut manager = RoomManager::new();
    let (gm, _player) = ready_room(&mut manager).await;
    manager.start_round(&key(), gm.id, 30).await.unwrap();

    let err = manager
        .set_question(&key(), gm.id, "Other?".into(), "x".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::InvalidState(_)));
}

#[tokio::test(start_paused = true)]
async fn test_new_question_resets_attempts() {
    let mut manager = RoomManager::new();
    let (gm, player) = ready_room(&mut manager).await;
    manager.start_round(&key(), gm.id, 30).await.unwrap();
    manager
        .submit_guess(&key(), player.id, "Lyon".into())
        .await
        .unwrap();
    manager
        .submit_guess(&key(), player.id, "paris".into())
        .await
        .unwrap();
    assert_eq!(manager.info(&key()).await.unwrap().member(player.id).unwrap().attempts_left, 1);

    manager
        .set_question(&key(), gm.id, "Capital of Italy?".into(), "Rome".into())
        .await
        .unwrap();
    let info = manager.info(&key()).await.unwrap();
    assert_eq!(info.state, RoundState::Ready);
    assert!(info.members.iter().all(|m| m.attempts_left == 3));
}

#[tokio::test(start_paused = true)]
async fn test_round_survives_game_master_leaving() {
    let mut manager = RoomManager::new();
    let (gm, mut player) = ready_room(&mut manager).await;
    manager.start_round(&key(), gm.id, 3).await.unwrap();

    manager.leave(&key(), gm.id).await;
    tokio::time::sleep(Duration::from_millis(3500)).await;

    let events = player.events();
    assert_eq!(ticks(&events), [2, 1, 0]);
    let info = manager.info(&key()).await.unwrap();
    assert_eq!(info.game_master, player.id);
    assert_eq!(info.state, RoundState::Waiting);
}

#[tokio::test(start_paused = true)]
async fn test_emptying_room_cancels_countdown() {
    let mut manager = RoomManager::new();
    let (gm, mut player) = ready_room(&mut manager).await;
    manager.start_round(&key(), gm.id, 30).await.unwrap();

    manager.leave(&key(), player.id).await;
    manager.leave(&key(), gm.id).await;
    player.events();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(player.events().is_empty());
    assert!(!manager.contains(&key()));
}
