//! The round cycle of a single room.
//!
//! [`Round`] owns the question and, while running, the countdown. A
//! countdown therefore exists exactly when the round is `Running`, and
//! leaving that variant is the only way to cancel it.

use quizcast_protocol::RoundState;
use quizcast_tick::Countdown;

/// A question as entered by the game master. Case is kept for display;
/// matching ignores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Question {
    pub(crate) text: String,
    pub(crate) answer: String,
}

#[derive(Debug, Default)]
pub(crate) enum Round {
    #[default]
    Waiting,
    Ready(Question),
    Running {
        question: Question,
        countdown: Countdown,
    },
}

impl Round {
    pub(crate) fn state(&self) -> RoundState {
        match self {
            Self::Waiting => RoundState::Waiting,
            Self::Ready(_) => RoundState::Ready,
            Self::Running { .. } => RoundState::Running,
        }
    }

    pub(crate) fn question(&self) -> Option<&Question> {
        match self {
            Self::Waiting => None,
            Self::Ready(question) | Self::Running { question, .. } => Some(question),
        }
    }

    pub(crate) fn countdown(&self) -> Option<&Countdown> {
        match self {
            Self::Running { countdown, .. } => Some(countdown),
            _ => None,
        }
    }

    pub(crate) fn countdown_mut(&mut self) -> Option<&mut Countdown> {
        match self {
            Self::Running { countdown, .. } => Some(countdown),
            _ => None,
        }
    }

    /// Ends a running round: drops the countdown, clears the question and
    /// returns it. Does nothing (and returns `None`) unless running.
    pub(crate) fn finish(&mut self) -> Option<Question> {
        if !matches!(self, Self::Running { .. }) {
            return None;
        }
        match std::mem::take(self) {
            Self::Running { question, .. } => Some(question),
            _ => None,
        }
    }
}

/// Whether `guess` names `answer`: surrounding whitespace and letter case
/// are ignored, nothing else is.
pub fn answer_matches(answer: &str, guess: &str) -> bool {
    answer.trim().to_lowercase() == guess.trim().to_lowercase()
}
