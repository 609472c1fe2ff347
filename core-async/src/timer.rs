//! Single-slot retriggerable timers.
//!
//! A [`TimerSlot`] holds at most one pending callback. Scheduling a new
//! callback aborts the previous one, which gives trailing-edge debounce
//! semantics: only the last request within a burst fires. Cancelling the
//! slot is synchronous, and a callback that already woke up re-checks its
//! generation under the slot lock before running, so nothing fires after
//! [`TimerSlot::cancel`] returns.
//!
//! [`spawn_ticker`] covers the other recurring shape: a periodic callback
//! that runs until its cancellation token fires.

use crate::runtime::Handle;
use crate::sync::CancellationToken;
use crate::task::JoinHandle;
use crate::time::{sleep, steady_interval, Duration};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct SlotState {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

/// A timer slot owned by exactly one component.
///
/// Clones share the same slot.
#[derive(Clone)]
pub struct TimerSlot {
    state: Arc<Mutex<SlotState>>,
    runtime: Option<Handle>,
}

impl TimerSlot {
    /// Creates an empty slot.
    ///
    /// When called inside a runtime, the runtime handle is remembered so the
    /// slot can later be scheduled from threads outside the runtime.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState::default())),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Creates a slot bound to an explicit runtime handle.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState::default())),
            runtime: Some(handle),
        }
    }

    /// Schedules `callback` to run after `delay`, replacing any pending one.
    ///
    /// Returns `false` when no runtime is reachable; nothing is scheduled in
    /// that case and the previous callback is still cancelled.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = match Handle::try_current().ok().or_else(|| self.runtime.clone()) {
            Some(handle) => handle,
            None => {
                self.cancel();
                return false;
            }
        };

        let mut state = self.state.lock();
        if let Some(previous) = state.pending.take() {
            previous.abort();
        }
        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;
        let slot = Arc::clone(&self.state);

        state.pending = Some(handle.spawn(async move {
            sleep(delay).await;
            {
                let mut state = slot.lock();
                if state.generation != generation {
                    return;
                }
                state.pending = None;
            }
            callback();
        }));
        true
    }

    /// Cancels the pending callback, if any.
    ///
    /// Returns `true` if a callback was pending.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        match state.pending.take() {
            Some(pending) => {
                pending.abort();
                true
            }
            None => false,
        }
    }

    /// Returns `true` while a callback is scheduled and has not fired.
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

impl Default for TimerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TimerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSlot")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Calls `on_tick` every `period` until `token` is cancelled or `on_tick`
/// returns `false`.
///
/// The first call happens one full period after spawning. Returns `None`
/// when there is no runtime on the current thread.
pub fn spawn_ticker<F>(
    period: Duration,
    token: CancellationToken,
    mut on_tick: F,
) -> Option<JoinHandle<()>>
where
    F: FnMut() -> bool + Send + 'static,
{
    let handle = Handle::try_current().ok()?;
    Some(handle.spawn(async move {
        let mut ticker = steady_interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if token.is_cancelled() || !on_tick() {
                        break;
                    }
                }
            }
        }
    }))
}
