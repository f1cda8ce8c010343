//! Integration tests for the round countdown.
//!
//! Time is paused (`start_paused = true`) so sleeps complete as soon as
//! the runtime has nothing else to do and elapsed time is exact.

use std::time::Duration;

use quizcast_tick::{Countdown, CountdownConfig};
use tokio::time::Instant;

fn one_second() -> CountdownConfig {
    CountdownConfig::default()
}

#[test]
fn test_default_config_is_one_hertz_without_jitter() {
    let cfg = CountdownConfig::default();
    assert_eq!(cfg.period, Duration::from_secs(1));
    assert_eq!(cfg.initial_jitter_us, 0);
}

#[test]
fn test_tiny_period_is_clamped() {
    let cfg = CountdownConfig {
        period: Duration::from_micros(5),
        ..CountdownConfig::default()
    }
    .validated();
    assert_eq!(cfg.period, CountdownConfig::MIN_PERIOD);
}

#[tokio::test(start_paused = true)]
async fn test_new_countdown_reports_full_time() {
    let c = Countdown::start(60, one_second());
    assert_eq!(c.remaining(), 60);
    assert_eq!(c.total(), 60);
    assert_eq!(c.ticks(), 0);
    assert!(!c.is_expired());
}

#[tokio::test(start_paused = true)]
async fn test_ticks_decrement_once_per_period() {
    let start = Instant::now();
    let mut c = Countdown::start(3, one_second());

    let first = c.wait_for_tick().await;
    assert_eq!(first.tick, 1);
    assert_eq!(first.remaining, 2);
    assert!(!first.expired);
    assert_eq!(start.elapsed(), Duration::from_secs(1));

    let second = c.wait_for_tick().await;
    assert_eq!(second.remaining, 1);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_last_tick_is_marked_expired() {
    let mut c = Countdown::start(2, one_second());
    c.wait_for_tick().await;
    let last = c.wait_for_tick().await;

    assert_eq!(last.remaining, 0);
    assert!(last.expired);
    assert!(c.is_expired());
    assert_eq!(c.ticks(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_expired_countdown_never_fires_again() {
    let mut c = Countdown::start(1, one_second());
    assert!(c.wait_for_tick().await.expired);

    let again = tokio::time::timeout(Duration::from_secs(3600), c.wait_for_tick()).await;
    assert!(again.is_err(), "expired countdown must pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_zero_seconds_is_already_expired() {
    let mut c = Countdown::start(0, one_second());
    assert!(c.is_expired());
    let tick = tokio::time::timeout(Duration::from_secs(10), c.wait_for_tick()).await;
    assert!(tick.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_custom_period() {
    let start = Instant::now();
    let mut c = Countdown::start(
        5,
        CountdownConfig {
            period: Duration::from_millis(100),
            ..CountdownConfig::default()
        },
    );
    for _ in 0..5 {
        c.wait_for_tick().await;
    }
    assert!(c.is_expired());
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_late_tick_is_flagged_and_rescheduled_from_now() {
    let mut c = Countdown::start(10, one_second());

    // Stall the owner well past the first deadline.
    tokio::time::advance(Duration::from_millis(2500)).await;
    let late = c.wait_for_tick().await;
    assert!(late.overrun);
    assert_eq!(late.remaining, 9);

    let before = Instant::now();
    let next = c.wait_for_tick().await;
    assert!(!next.overrun);
    assert_eq!(before.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_jitter_only_delays_first_tick() {
    let start = Instant::now();
    let mut c = Countdown::start(
        2,
        CountdownConfig {
            initial_jitter_us: 5_000,
            ..CountdownConfig::default()
        },
    );
    c.wait_for_tick().await;
    let first = start.elapsed();
    assert!(first >= Duration::from_secs(1));
    assert!(first <= Duration::from_millis(1005));
}
