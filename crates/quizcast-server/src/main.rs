use std::time::Duration;

use clap::Parser;
use quizcast::prelude::*;

/// Quizcast - real-time multiplayer trivia server
#[derive(Parser, Debug)]
#[command(name = "quizcast-server", version, about)]
struct Args {
    /// Address to bind the WebSocket listener to
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    bind: String,

    /// Guesses each player gets per question
    #[arg(long, default_value_t = 3)]
    attempts: u8,

    /// Points awarded for a correct guess
    #[arg(long, default_value_t = 10)]
    points: u32,

    /// Longest round a game master may start, in seconds
    #[arg(long, default_value_t = 3600)]
    max_round_secs: u32,

    /// Close connections that send nothing for this many seconds
    #[arg(long, default_value_t = 30)]
    idle_timeout_secs: u64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind.clone(),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            room: RoomConfig {
                attempts_per_round: self.attempts,
                points_per_correct_guess: self.points,
                max_round_secs: self.max_round_secs,
                ..RoomConfig::default()
            },
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizcast=info,quizcast_room=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = args.server_config();

    tracing::info!(
        bind = %config.bind_addr,
        attempts = config.room.attempts_per_round,
        max_round_secs = config.room.max_round_secs,
        "starting quizcast server"
    );
    let server = QuizcastServer::builder().config(config).build().await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}
