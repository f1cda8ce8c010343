//! Room actor: one Tokio task per room key.
//!
//! The actor owns the member list, the game master and the current
//! [`Round`], including its countdown. Commands arrive over a bounded mpsc
//! channel and answer on a oneshot; countdown ticks are awaited in the same
//! `select!`, so a tick and a guess can never interleave inside one
//! operation.

use std::ops::ControlFlow;

use quizcast_protocol::{
    MemberId, MemberView, Payload, RoomEvent, RoomKey, RoomSnapshot, RoundEndReason, RoundState,
    Winner,
};
use quizcast_tick::{Countdown, TickInfo};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::round::{Question, Round, answer_matches};
use crate::{RoomConfig, RoomError};

/// Channel to one member's connection. The room pushes
/// [`Payload::Event`]s into it and never waits on it.
pub type MemberSender = mpsc::UnboundedSender<Payload>;

/// What a submitted guess achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessOutcome {
    pub correct: bool,
    pub attempts_left: u8,
}

/// What a leave did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The member was not in the room; nothing changed.
    NotMember,
    /// The member left and others remain.
    Left,
    /// The last member left. The actor has stopped.
    Closed,
}

/// Server-side view of one member, including what the broadcast snapshot
/// leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberStatus {
    pub id: MemberId,
    pub name: String,
    pub score: u32,
    pub attempts_left: u8,
}

/// Diagnostic snapshot of a room.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_key: RoomKey,
    pub state: RoundState,
    pub game_master: MemberId,
    /// In join order.
    pub members: Vec<MemberStatus>,
    pub countdown_active: bool,
    /// Seconds left in the running round.
    pub time_left: Option<u32>,
}

impl RoomInfo {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn member(&self, id: MemberId) -> Option<&MemberStatus> {
        self.members.iter().find(|m| m.id == id)
    }
}

pub(crate) enum RoomCommand {
    Join {
        member_id: MemberId,
        name: String,
        sender: MemberSender,
        reply: oneshot::Sender<()>,
    },
    SetQuestion {
        member_id: MemberId,
        question: String,
        answer: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    StartRound {
        member_id: MemberId,
        duration_secs: u64,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    SubmitGuess {
        member_id: MemberId,
        guess: String,
        reply: oneshot::Sender<Result<GuessOutcome, RoomError>>,
    },
    Leave {
        member_id: MemberId,
        reply: oneshot::Sender<LeaveOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
}

/// Cheap, cloneable handle to a running room actor.
#[derive(Clone)]
pub struct RoomHandle {
    room_key: RoomKey,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_key(&self) -> &RoomKey {
        &self.room_key
    }

    /// Adds a member. The new member receives the updated snapshot like
    /// everyone else.
    pub async fn join(
        &self,
        member_id: MemberId,
        name: String,
        sender: MemberSender,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Join {
            member_id,
            name,
            sender,
            reply,
        })
        .await
    }

    /// Stores a new question and answer. Game master only.
    pub async fn set_question(
        &self,
        member_id: MemberId,
        question: String,
        answer: String,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::SetQuestion {
            member_id,
            question,
            answer,
            reply,
        })
        .await?
    }

    /// Starts the countdown for the stored question. Game master only.
    pub async fn start_round(&self, member_id: MemberId, duration_secs: u64) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::StartRound {
            member_id,
            duration_secs,
            reply,
        })
        .await?
    }

    pub async fn submit_guess(&self, member_id: MemberId, guess: String) -> Result<GuessOutcome, RoomError> {
        self.request(|reply| RoomCommand::SubmitGuess {
            member_id,
            guess,
            reply,
        })
        .await?
    }

    pub async fn leave(&self, member_id: MemberId) -> Result<LeaveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Leave { member_id, reply }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_key.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_key.clone()))
    }
}

struct Member {
    id: MemberId,
    name: String,
    score: u32,
    attempts_left: u8,
    sender: MemberSender,
}

struct RoomActor {
    room_key: RoomKey,
    config: RoomConfig,
    /// Join order. Never empty while the actor runs.
    members: Vec<Member>,
    game_master: MemberId,
    round: Round,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        info!(
            room_key = %self.room_key,
            game_master = %self.game_master,
            "room opened"
        );

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else {
                        debug!(room_key = %self.room_key, "all handles dropped");
                        break;
                    };
                    if self.handle_command(cmd).is_break() {
                        break;
                    }
                }
                tick = next_tick(&mut self.round) => self.handle_tick(tick),
            }
        }

        info!(room_key = %self.room_key, "room closed");
    }

    fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Join {
                member_id,
                name,
                sender,
                reply,
            } => {
                self.handle_join(member_id, name, sender);
                let _ = reply.send(());
            }
            RoomCommand::SetQuestion {
                member_id,
                question,
                answer,
                reply,
            } => {
                let _ = reply.send(self.handle_set_question(member_id, question, answer));
            }
            RoomCommand::StartRound {
                member_id,
                duration_secs,
                reply,
            } => {
                let _ = reply.send(self.handle_start_round(member_id, duration_secs));
            }
            RoomCommand::SubmitGuess {
                member_id,
                guess,
                reply,
            } => {
                let _ = reply.send(self.handle_guess(member_id, guess));
            }
            RoomCommand::Leave { member_id, reply } => {
                let outcome = self.handle_leave(member_id);
                let _ = reply.send(outcome);
                if outcome == LeaveOutcome::Closed {
                    return ControlFlow::Break(());
                }
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_join(&mut self, member_id: MemberId, name: String, sender: MemberSender) {
        self.members.push(Member {
            id: member_id,
            name,
            score: 0,
            attempts_left: self.config.attempts_per_round,
            sender,
        });
        info!(
            room_key = %self.room_key,
            %member_id,
            members = self.members.len(),
            "member joined"
        );
        self.broadcast_snapshot();
    }

    fn handle_set_question(
        &mut self,
        member_id: MemberId,
        question: String,
        answer: String,
    ) -> Result<(), RoomError> {
        if question.trim().is_empty() {
            return Err(RoomError::InvalidRequest("question is required".into()));
        }
        if answer.trim().is_empty() {
            return Err(RoomError::InvalidRequest("answer is required".into()));
        }
        self.require_game_master(member_id, "set a question")?;
        let state = self.round.state();
        if !state.can_transition_to(RoundState::Ready) {
            return Err(RoomError::InvalidState(format!(
                "cannot set a question while the round is {state}"
            )));
        }

        for member in &mut self.members {
            member.attempts_left = self.config.attempts_per_round;
        }
        self.round = Round::Ready(Question {
            text: question.clone(),
            answer,
        });
        info!(room_key = %self.room_key, "question set");

        self.broadcast(RoomEvent::QuestionSet { question });
        self.broadcast_snapshot();
        Ok(())
    }

    fn handle_start_round(&mut self, member_id: MemberId, duration_secs: u64) -> Result<(), RoomError> {
        let max = self.config.max_round_secs;
        let seconds = match u32::try_from(duration_secs) {
            Ok(0) => {
                return Err(RoomError::InvalidRequest(
                    "durationSeconds must be a positive number".into(),
                ));
            }
            Ok(secs) if secs <= max => secs,
            _ => {
                return Err(RoomError::InvalidRequest(format!(
                    "durationSeconds may not exceed {max}"
                )));
            }
        };
        self.require_game_master(member_id, "start a round")?;

        let question = match std::mem::take(&mut self.round) {
            Round::Ready(question) => question,
            other => {
                let reason = match other.state() {
                    RoundState::Running => "a round is already running",
                    _ => "no question has been set",
                };
                self.round = other;
                return Err(RoomError::InvalidState(reason.into()));
            }
        };

        let text = question.text.clone();
        self.round = Round::Running {
            question,
            countdown: Countdown::start(seconds, self.config.countdown.clone()),
        };
        info!(room_key = %self.room_key, seconds, "round started");

        self.broadcast(RoomEvent::RoundStarted {
            question: text,
            time_left: seconds,
        });
        self.broadcast_snapshot();
        Ok(())
    }

    fn handle_guess(&mut self, member_id: MemberId, guess: String) -> Result<GuessOutcome, RoomError> {
        if guess.trim().is_empty() {
            return Err(RoomError::InvalidRequest("guess is required".into()));
        }
        let index = self.member_index(member_id)?;
        if !self.round.state().accepts_guesses() {
            return Err(RoomError::InvalidState("no round is running".into()));
        }

        let member = &mut self.members[index];
        if member.attempts_left == 0 {
            return Err(RoomError::OutOfAttempts(member_id));
        }
        member.attempts_left -= 1;
        let attempts_left = member.attempts_left;
        let name = member.name.clone();

        let correct = self
            .round
            .question()
            .is_some_and(|q| answer_matches(&q.answer, &guess));
        debug!(
            room_key = %self.room_key,
            %member_id,
            correct,
            attempts_left,
            "guess submitted"
        );

        self.broadcast(RoomEvent::PlayerAttempt {
            member_id,
            name: name.clone(),
            guess,
            attempts_left,
        });

        if correct {
            let member = &mut self.members[index];
            member.score = member.score.saturating_add(self.config.points_per_correct_guess);
            self.end_round(
                Some(Winner { id: member_id, name }),
                RoundEndReason::CorrectGuess,
            );
        } else {
            self.broadcast_snapshot();
        }

        Ok(GuessOutcome {
            correct,
            attempts_left,
        })
    }

    fn handle_leave(&mut self, member_id: MemberId) -> LeaveOutcome {
        let Some(index) = self.members.iter().position(|m| m.id == member_id) else {
            return LeaveOutcome::NotMember;
        };
        self.members.remove(index);
        info!(
            room_key = %self.room_key,
            %member_id,
            members = self.members.len(),
            "member left"
        );

        if self.members.is_empty() {
            if self.round.finish().is_some() {
                debug!(room_key = %self.room_key, "running round cancelled");
            }
            return LeaveOutcome::Closed;
        }

        if member_id == self.game_master {
            self.game_master = self.members[0].id;
            info!(
                room_key = %self.room_key,
                game_master = %self.game_master,
                "game master promoted"
            );
        }
        self.broadcast_snapshot();
        LeaveOutcome::Left
    }

    fn handle_tick(&mut self, tick: TickInfo) {
        self.broadcast(RoomEvent::TimerTick {
            time_left: tick.remaining,
        });
        if tick.expired {
            self.end_round(None, RoundEndReason::TimeExpired);
        }
    }

    fn end_round(&mut self, winner: Option<Winner>, reason: RoundEndReason) {
        debug_assert_eq!(self.round.state(), RoundState::Running);
        let Some(question) = self.round.finish() else {
            return;
        };
        info!(
            room_key = %self.room_key,
            %reason,
            winner = winner.as_ref().map(|w| w.id.0),
            "round ended"
        );

        self.broadcast(RoomEvent::RoundEnded {
            winner,
            answer: question.answer,
            reason,
        });
        self.broadcast_snapshot();
    }

    fn member_index(&self, member_id: MemberId) -> Result<usize, RoomError> {
        self.members
            .iter()
            .position(|m| m.id == member_id)
            .ok_or_else(|| RoomError::NotInRoom(member_id, self.room_key.clone()))
    }

    fn require_game_master(&self, member_id: MemberId, action: &'static str) -> Result<(), RoomError> {
        self.member_index(member_id)?;
        if member_id != self.game_master {
            return Err(RoomError::Forbidden(self.room_key.clone(), action));
        }
        Ok(())
    }

    /// Delivers `event` to every member. A member whose connection is gone
    /// is skipped; its leave is already on the way.
    fn broadcast(&self, event: RoomEvent) {
        for member in &self.members {
            let _ = member.sender.send(Payload::Event {
                room_key: self.room_key.clone(),
                event: event.clone(),
            });
        }
    }

    fn broadcast_snapshot(&self) {
        self.broadcast(RoomEvent::SessionUpdate(self.snapshot()));
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_key: self.room_key.clone(),
            members: self
                .members
                .iter()
                .map(|m| MemberView {
                    id: m.id,
                    name: m.name.clone(),
                    score: m.score,
                })
                .collect(),
            game_master_id: self.game_master,
            state: self.round.state(),
        }
    }

    fn info(&self) -> RoomInfo {
        let countdown = self.round.countdown();
        RoomInfo {
            room_key: self.room_key.clone(),
            state: self.round.state(),
            game_master: self.game_master,
            members: self
                .members
                .iter()
                .map(|m| MemberStatus {
                    id: m.id,
                    name: m.name.clone(),
                    score: m.score,
                    attempts_left: m.attempts_left,
                })
                .collect(),
            countdown_active: countdown.is_some_and(|c| !c.is_expired()),
            time_left: countdown.map(Countdown::remaining),
        }
    }
}

/// The next tick of the running round, or never.
async fn next_tick(round: &mut Round) -> TickInfo {
    match round.countdown_mut() {
        Some(countdown) => countdown.wait_for_tick().await,
        None => std::future::pending().await,
    }
}

/// Spawns a room actor with `founder` as its first member and game master.
pub(crate) fn spawn_room(
    room_key: RoomKey,
    config: RoomConfig,
    founder: MemberId,
    name: String,
    sender: MemberSender,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let actor = RoomActor {
        room_key: room_key.clone(),
        members: vec![Member {
            id: founder,
            name,
            score: 0,
            attempts_left: config.attempts_per_round,
            sender,
        }],
        game_master: founder,
        round: Round::Waiting,
        config,
        receiver: rx,
    };
    // Queued before the caller sees the member id.
    actor.broadcast_snapshot();
    tokio::spawn(actor.run());
    RoomHandle {
        room_key,
        sender: tx,
    }
}
