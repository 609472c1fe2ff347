//! Async runtime facade for the video playback core.
//!
//! Every core crate depends on this crate instead of depending on tokio
//! directly. It re-exports the runtime primitives the core uses and adds the
//! timer building blocks shared by the playback components.
//!
//! # Modules
//!
//! - `task`: task spawning, including [`task::spawn_detached`] for callers
//!   that may not be inside a runtime (platform callback threads)
//! - `time`: sleep, interval, timeout and a runtime-aware `Instant`
//! - `sync`: channels, locks and [`sync::CancellationToken`]
//! - `timer`: [`timer::TimerSlot`], a single-slot retriggerable timer, and
//!   [`timer::spawn_ticker`] for cancellable periodic work
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::Duration;
//! use core_async::timer::TimerSlot;
//!
//! async fn example() {
//!     let slot = TimerSlot::new();
//!     slot.schedule(Duration::from_millis(300), || println!("first"));
//!     // Replaces the pending callback; "first" never runs.
//!     slot.schedule(Duration::from_millis(300), || println!("second"));
//! }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;
pub mod timer;

pub use futures::{future, stream};
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
pub use timer::{spawn_ticker, TimerSlot};
