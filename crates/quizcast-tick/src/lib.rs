//! Round countdown for Quizcast.
//!
//! A [`Countdown`] counts whole seconds down to zero, firing one tick per
//! period. It is meant to live inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* handle commands */ }
//!         tick = countdown.wait_for_tick() => {
//!             broadcast(tick.remaining);
//!             if tick.expired { /* end the round */ }
//!         }
//!     }
//! }
//! ```
//!
//! Once expired, [`Countdown::wait_for_tick`] pends forever, so the branch
//! simply stops firing. Cancelling a countdown is dropping it.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CountdownConfig {
    /// Wall-clock length of one countdown step. Default: one second.
    pub period: Duration,
    /// Random delay (0..max µs) added to the first tick so rooms started
    /// in the same instant do not wake together. 0 disables it.
    pub initial_jitter_us: u64,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            initial_jitter_us: 0,
        }
    }
}

impl CountdownConfig {
    /// Shortest accepted period. Anything below is clamped.
    pub const MIN_PERIOD: Duration = Duration::from_millis(10);

    pub fn validated(mut self) -> Self {
        if self.period < Self::MIN_PERIOD {
            warn!(
                period_ms = self.period.as_millis() as u64,
                "countdown period below minimum, clamping"
            );
            self.period = Self::MIN_PERIOD;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// TickInfo
// ---------------------------------------------------------------------------

/// Result of one countdown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Step number, starting at 1.
    pub tick: u64,
    /// Seconds left after this step.
    pub remaining: u32,
    /// `true` on the step that reached zero.
    pub expired: bool,
    /// `true` if the step fired noticeably late (>10% of a period).
    pub overrun: bool,
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Countdown {
    period: Duration,
    total: u32,
    remaining: u32,
    ticks: u64,
    /// `None` once the countdown has expired.
    next_tick: Option<Instant>,
}

impl Countdown {
    /// Starts counting down from `seconds`. The first tick fires one period
    /// from now (plus jitter, if configured).
    ///
    /// A zero-second countdown is already expired and never ticks.
    pub fn start(seconds: u32, config: CountdownConfig) -> Self {
        let config = config.validated();

        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };
        let next_tick = (seconds > 0).then(|| Instant::now() + config.period + jitter);

        debug!(
            seconds,
            period_ms = config.period.as_millis() as u64,
            "countdown started"
        );

        Self {
            period: config.period,
            total: seconds,
            remaining: seconds,
            ticks: 0,
            next_tick,
        }
    }

    /// Waits for the next step and decrements the remaining time.
    ///
    /// Pends forever once the countdown has expired.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(deadline) = self.next_tick else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(deadline).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(deadline);
        let overrun = late_by > self.period / 10;
        if overrun {
            warn!(
                tick = self.ticks + 1,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "countdown tick fired late, rescheduling from now"
            );
        }

        self.ticks += 1;
        self.remaining = self.remaining.saturating_sub(1);
        let expired = self.remaining == 0;

        self.next_tick = if expired {
            None
        } else if overrun {
            Some(now + self.period)
        } else {
            Some(deadline + self.period)
        };

        trace!(tick = self.ticks, remaining = self.remaining, "countdown tick");

        TickInfo {
            tick: self.ticks,
            remaining: self.remaining,
            expired,
            overrun,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_expired(&self) -> bool {
        self.next_tick.is_none()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
