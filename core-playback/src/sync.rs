//! # State Synchronizer
//!
//! Keeps a secondary session (fullscreen / picture-in-picture mirror) aligned
//! with a primary session.
//!
//! ## Reconciliation
//!
//! A reconciliation pass reads both sessions and corrects the secondary:
//!
//! - position drift above the tolerance: hard reseek of the secondary
//! - play state mismatch: the secondary plays or pauses to match
//!
//! Passes run on a periodic tick and on demand when the primary reports a
//! rate change, a position discontinuity or a status change. Reconciliation
//! is level-triggered, so missed or reordered notifications heal on the next
//! pass.
//!
//! ## Reentrancy
//!
//! A single `syncing` flag brackets each pass. Anything that would start a
//! pass while one is running (an observer reacting to a write made by the
//! pass itself) gets [`SkipReason::Reentrant`] and does nothing.
//!
//! User actions on the secondary (play, pause, scrub) are mirrored back to
//! the primary under the same flag, so the resulting primary events cannot
//! bounce back into a pass. A secondary that stops without an explicit
//! pause (stall, item not ready, system pause) is not mirrored; the next
//! pass resumes it instead.
//!
//! ## Teardown
//!
//! [`commit_reverse`](StateSynchronizer::commit_reverse) copies the secondary
//! state onto the primary once and then stops the synchronizer.

use crate::config::SyncConfig;
use crate::session::{PlayIntent, PlaybackSession, SessionEventKind, SubscriptionHandle};
use bridge_traits::player::PlayerEvent;
use core_async::sync::CancellationToken;
use core_async::timer::spawn_ticker;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// Why a reconciliation pass did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The synchronizer is not running.
    Inactive,
    /// Another pass is in progress.
    Reentrant,
    /// One of the sessions has released its handle.
    HandleReleased,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Reconciled {
        reseeked: bool,
        play_state_changed: bool,
    },
    Skipped(SkipReason),
}

impl SyncOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }
}

/// Counters describing synchronizer activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub passes: u64,
    pub reseeks: u64,
    pub play_state_changes: u64,
    pub reentrant_skips: u64,
    pub released_skips: u64,
    pub mirrored_actions: u64,
}

#[derive(Default)]
struct Counters {
    passes: AtomicU64,
    reseeks: AtomicU64,
    play_state_changes: AtomicU64,
    reentrant_skips: AtomicU64,
    released_skips: AtomicU64,
    mirrored_actions: AtomicU64,
}

/// Callback run when a pass finds the secondary released.
pub type SecondaryReleasedCallback = Arc<dyn Fn() + Send + Sync>;

/// RAII bracket around the `syncing` flag.
struct SyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SyncGuard<'a> {
    fn try_enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard { flag })
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Reconciles a secondary session against a primary session.
pub struct StateSynchronizer {
    primary: Arc<PlaybackSession>,
    secondary: Mutex<Option<Arc<PlaybackSession>>>,
    config: SyncConfig,
    syncing: AtomicBool,
    active: AtomicBool,
    ticker: Mutex<Option<CancellationToken>>,
    subscriptions: Mutex<Vec<(Arc<PlaybackSession>, SubscriptionHandle)>>,
    on_secondary_released: Mutex<Option<SecondaryReleasedCallback>>,
    counters: Counters,
}

impl StateSynchronizer {
    pub fn new(
        primary: Arc<PlaybackSession>,
        secondary: Arc<PlaybackSession>,
        config: SyncConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            primary,
            secondary: Mutex::new(Some(secondary)),
            config,
            syncing: AtomicBool::new(false),
            active: AtomicBool::new(false),
            ticker: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
            on_secondary_released: Mutex::new(None),
            counters: Counters::default(),
        })
    }

    /// Wires observers on both sessions, starts the periodic tick and runs
    /// a first pass.
    pub fn start(self: &Arc<Self>) -> SyncOutcome {
        if self.active.swap(true, Ordering::AcqRel) {
            return self.reconcile();
        }

        self.observe_primary();
        if let Some(secondary) = self.secondary() {
            self.observe_secondary(&secondary);
        }

        let token = CancellationToken::new();
        let weak = Arc::downgrade(self);
        let spawned = spawn_ticker(self.config.tick_interval(), token.clone(), move || {
            match weak.upgrade() {
                Some(sync) => {
                    sync.reconcile();
                    true
                }
                None => false,
            }
        });
        if spawned.is_none() {
            warn!("No runtime available; reconciliation only runs on demand");
        }
        *self.ticker.lock() = Some(token);

        debug!(
            tick_ms = self.config.tick_interval_ms,
            tolerance_ms = self.config.drift_tolerance_ms,
            "State synchronizer started"
        );
        self.reconcile()
    }

    fn observe_primary(self: &Arc<Self>) {
        let kinds = [
            SessionEventKind::RateChanged,
            SessionEventKind::PositionDiscontinuity,
            SessionEventKind::StatusChanged,
        ];
        let mut subscriptions = self.subscriptions.lock();
        for kind in kinds {
            let weak = Arc::downgrade(self);
            let handle = self.primary.subscribe(kind, move |_| {
                if let Some(sync) = weak.upgrade() {
                    sync.reconcile();
                }
            });
            subscriptions.push((Arc::clone(&self.primary), handle));
        }
    }

    fn observe_secondary(self: &Arc<Self>, secondary: &Arc<PlaybackSession>) {
        let mut subscriptions = self.subscriptions.lock();
        for kind in [
            SessionEventKind::RateChanged,
            SessionEventKind::PositionDiscontinuity,
        ] {
            let weak: Weak<Self> = Arc::downgrade(self);
            let handle = secondary.subscribe(kind, move |event| {
                if let Some(sync) = weak.upgrade() {
                    sync.mirror_to_primary(event);
                }
            });
            subscriptions.push((Arc::clone(secondary), handle));
        }
    }

    /// Runs one reconciliation pass.
    pub fn reconcile(&self) -> SyncOutcome {
        if !self.active.load(Ordering::Acquire) {
            return SyncOutcome::Skipped(SkipReason::Inactive);
        }

        let outcome = match SyncGuard::try_enter(&self.syncing) {
            Some(_guard) => self.reconcile_locked(),
            None => {
                self.counters.reentrant_skips.fetch_add(1, Ordering::Relaxed);
                trace!("Reconciliation already in progress; skipping");
                return SyncOutcome::Skipped(SkipReason::Reentrant);
            }
        };

        if outcome == SyncOutcome::Skipped(SkipReason::HandleReleased) {
            self.counters.released_skips.fetch_add(1, Ordering::Relaxed);
            let secondary_gone = self
                .secondary()
                .map_or(true, |secondary| secondary.is_released());
            if secondary_gone && !self.primary.is_released() {
                let callback = self.on_secondary_released.lock().clone();
                if let Some(callback) = callback {
                    callback();
                }
            }
        }
        outcome
    }

    fn reconcile_locked(&self) -> SyncOutcome {
        self.counters.passes.fetch_add(1, Ordering::Relaxed);

        let secondary = match self.secondary() {
            Some(secondary) if !secondary.is_released() && !self.primary.is_released() => {
                secondary
            }
            _ => {
                trace!("Session handle released; reconciliation skipped");
                return SyncOutcome::Skipped(SkipReason::HandleReleased);
            }
        };

        let primary_position = self.primary.current_position();
        let secondary_position = secondary.current_position();
        let drift = primary_position.abs_diff(secondary_position);

        let mut reseeked = false;
        if drift > self.config.drift_tolerance_ms {
            debug!(
                drift_ms = drift,
                target_ms = primary_position,
                "Drift above tolerance; reseeking secondary"
            );
            match secondary.seek(primary_position, 0) {
                Ok(()) => {
                    reseeked = true;
                    self.counters.reseeks.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!(error = %e, "Secondary reseek failed"),
            }
        }

        let primary_playing = self.primary.is_playing();
        let mut play_state_changed = false;
        if primary_playing != secondary.is_playing() {
            let result = if primary_playing {
                secondary
                    .set_rate(self.primary.rate())
                    .and_then(|_| secondary.play())
            } else {
                secondary.pause()
            };
            match result {
                Ok(()) => {
                    play_state_changed = true;
                    self.counters
                        .play_state_changes
                        .fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!(error = %e, "Secondary play state update failed"),
            }
        }

        SyncOutcome::Reconciled {
            reseeked,
            play_state_changed,
        }
    }

    /// Mirrors a user action on the secondary back to the primary.
    fn mirror_to_primary(&self, event: &PlayerEvent) {
        if !self.active.load(Ordering::Acquire) || self.primary.is_released() {
            return;
        }
        // Events caused by our own pass land here while the flag is held.
        let Some(_guard) = SyncGuard::try_enter(&self.syncing) else {
            return;
        };

        let result = match event {
            PlayerEvent::RateChanged { rate } if *rate > 0.0 && !self.primary.is_playing() => {
                Some(self.primary.play())
            }
            PlayerEvent::RateChanged { rate } if *rate == 0.0 && self.primary.is_playing() => {
                if self.secondary_paused_by_user() {
                    Some(self.primary.pause())
                } else {
                    trace!("Secondary stopped on its own; left to the next pass");
                    None
                }
            }
            PlayerEvent::PositionDiscontinuity { position_ms } => {
                let drift = self.primary.current_position().abs_diff(*position_ms);
                (drift > self.config.drift_tolerance_ms)
                    .then(|| self.primary.seek(*position_ms, 0))
            }
            _ => None,
        };

        match result {
            Some(Ok(())) => {
                self.counters.mirrored_actions.fetch_add(1, Ordering::Relaxed);
                debug!(?event, "Mirrored secondary action to primary");
            }
            Some(Err(e)) => warn!(error = %e, "Mirroring to primary failed"),
            None => {}
        }
    }

    fn secondary_paused_by_user(&self) -> bool {
        self.secondary()
            .is_some_and(|secondary| secondary.intent() == PlayIntent::ExplicitPause)
    }

    /// Copies the secondary's position and play state onto the primary
    /// once, then stops.
    pub fn commit_reverse(&self) -> SyncOutcome {
        let outcome = match SyncGuard::try_enter(&self.syncing) {
            Some(_guard) => self.commit_locked(),
            None => SyncOutcome::Skipped(SkipReason::Reentrant),
        };
        self.stop();
        outcome
    }

    fn commit_locked(&self) -> SyncOutcome {
        let secondary = match self.secondary() {
            Some(secondary) if !secondary.is_released() && !self.primary.is_released() => {
                secondary
            }
            _ => return SyncOutcome::Skipped(SkipReason::HandleReleased),
        };

        let position = secondary.current_position();
        let playing = secondary.is_playing();
        let mut reseeked = false;
        if self.primary.current_position() != position {
            reseeked = self.primary.seek(position, 0).is_ok();
        }

        let play_state_changed = playing != self.primary.is_playing();
        let result = if playing {
            self.primary.play()
        } else {
            self.primary.pause()
        };
        if let Err(e) = result {
            warn!(error = %e, "Final state commit to primary failed");
        }

        debug!(position_ms = position, playing, "Committed secondary state to primary");
        SyncOutcome::Reconciled {
            reseeked,
            play_state_changed,
        }
    }

    /// Stops ticking and removes every observer. Idempotent.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(token) = self.ticker.lock().take() {
            token.cancel();
        }
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for (session, handle) in subscriptions {
            session.unsubscribe(&handle);
        }
        debug!("State synchronizer stopped");
    }

    /// Swaps in a recreated secondary and reconciles it immediately.
    pub fn replace_secondary(self: &Arc<Self>, secondary: Arc<PlaybackSession>) -> SyncOutcome {
        {
            let mut subscriptions = self.subscriptions.lock();
            let previous = self.secondary.lock().replace(Arc::clone(&secondary));
            if let Some(previous) = previous {
                subscriptions.retain(|(session, handle)| {
                    if Arc::ptr_eq(session, &previous) {
                        session.unsubscribe(handle);
                        false
                    } else {
                        true
                    }
                });
            }
        }
        if self.is_active() {
            self.observe_secondary(&secondary);
        }
        self.reconcile()
    }

    /// Registers the callback run when a pass finds the secondary released.
    pub fn set_on_secondary_released<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_secondary_released.lock() = Some(Arc::new(callback));
    }

    pub fn primary(&self) -> &Arc<PlaybackSession> {
        &self.primary
    }

    pub fn secondary(&self) -> Option<Arc<PlaybackSession>> {
        self.secondary.lock().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            passes: self.counters.passes.load(Ordering::Relaxed),
            reseeks: self.counters.reseeks.load(Ordering::Relaxed),
            play_state_changes: self.counters.play_state_changes.load(Ordering::Relaxed),
            reentrant_skips: self.counters.reentrant_skips.load(Ordering::Relaxed),
            released_skips: self.counters.released_skips.load(Ordering::Relaxed),
            mirrored_actions: self.counters.mirrored_actions.load(Ordering::Relaxed),
        }
    }
}

impl Drop for StateSynchronizer {
    fn drop(&mut self) {
        if let Some(token) = self.ticker.get_mut().take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive_and_resets() {
        let flag = AtomicBool::new(false);
        {
            let _outer = SyncGuard::try_enter(&flag).unwrap();
            assert!(SyncGuard::try_enter(&flag).is_none());
        }
        assert!(!flag.load(Ordering::Acquire));
        assert!(SyncGuard::try_enter(&flag).is_some());
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(SyncOutcome::Skipped(SkipReason::Inactive).is_skipped());
        assert!(!SyncOutcome::Reconciled {
            reseeked: false,
            play_state_changed: false
        }
        .is_skipped());
    }
}
