//! Room configuration.

use quizcast_tick::CountdownConfig;

/// Game rules and limits shared by every room a manager creates.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Guesses each member gets per question. Reset on every new question.
    pub attempts_per_round: u8,

    /// Score awarded for the winning guess.
    pub points_per_correct_guess: u32,

    /// Longest round a game master may start, in seconds.
    pub max_round_secs: u32,

    /// Capacity of each room actor's command channel.
    pub channel_size: usize,

    /// Timing of the round countdown.
    pub countdown: CountdownConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            attempts_per_round: 3,
            points_per_correct_guess: 10,
            max_round_secs: 3600,
            channel_size: 64,
            countdown: CountdownConfig::default(),
        }
    }
}
