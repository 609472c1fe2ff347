//! Time-related abstractions.
//!
//! `Instant` is tokio's instant rather than `std::time::Instant`, so that
//! debounce and rate-limit bookkeeping follows the runtime clock. Under a
//! paused test runtime the clock only moves when the runtime advances it,
//! which keeps timing tests deterministic.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(500)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(500));
//! }
//! ```

pub use tokio::time::{
    interval, sleep, sleep_until, timeout, Instant, Interval, MissedTickBehavior, Sleep, Timeout,
};

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns the wall-clock time as milliseconds since the Unix epoch.
///
/// Returns `0` if the system clock is set before the epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builds an interval whose missed ticks are delayed rather than bursted.
///
/// Reconciliation and progress loops use this: after a stall they resume at
/// the regular cadence instead of firing every missed tick back to back.
pub fn steady_interval(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
