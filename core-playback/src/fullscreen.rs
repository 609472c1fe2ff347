//! # Fullscreen Presentation
//!
//! Presents a second, muted playback session mirroring the primary for
//! fullscreen display, keeps it aligned through a [`StateSynchronizer`], and
//! commits its final state back to the primary on dismissal.
//!
//! ## State Machine
//!
//! ```text
//!              present()                 host presented
//!  Dismissed ─────────────> Presenting ─────────────────> Presented
//!      ^                        │                            │
//!      └──────── dismiss() ─────┴────────── dismiss() ───────┘
//! ```
//!
//! Every presentation attempt carries an epoch. A dismissal bumps the
//! epoch, so a mirror player that arrives after its presentation was
//! cancelled is released instead of used.
//!
//! ## Recreation
//!
//! The platform may tear the mirror down while the presentation is still
//! up. Recreation is requested when a reconciliation pass finds the
//! secondary released, and by a slower backstop tick. It is single-flight.

use crate::config::SyncConfig;
use crate::controls::ControlsConfig;
use crate::error::{PlaybackError, Result};
use crate::session::PlaybackSession;
use crate::sync::StateSynchronizer;
use bridge_traits::media::PlayableItem;
use bridge_traits::presentation::PresentationHost;
use core_async::sync::CancellationToken;
use core_async::task::spawn_detached;
use core_async::timer::spawn_ticker;
use core_runtime::events::{CoreEvent, EventBus, FullscreenEvent};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationState {
    Dismissed,
    Presenting,
    Presented,
}

impl fmt::Display for PresentationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PresentationState::Dismissed => "dismissed",
            PresentationState::Presenting => "presenting",
            PresentationState::Presented => "presented",
        };
        f.write_str(name)
    }
}

struct Inner {
    state: PresentationState,
    epoch: u64,
    sync: Option<Arc<StateSynchronizer>>,
    controls: ControlsConfig,
}

/// Drives fullscreen presentation of one primary session.
pub struct FullscreenPresentationController {
    primary: Arc<PlaybackSession>,
    host: Arc<dyn PresentationHost>,
    bus: EventBus,
    config: SyncConfig,
    inner: Mutex<Inner>,
    backstop: Mutex<Option<CancellationToken>>,
    recreating: AtomicBool,
    recreations: AtomicU64,
    weak_self: Weak<Self>,
}

impl FullscreenPresentationController {
    pub fn new(
        primary: Arc<PlaybackSession>,
        host: Arc<dyn PresentationHost>,
        bus: EventBus,
        config: SyncConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            primary,
            host,
            bus,
            config,
            inner: Mutex::new(Inner {
                state: PresentationState::Dismissed,
                epoch: 0,
                sync: None,
                controls: ControlsConfig::default(),
            }),
            backstop: Mutex::new(None),
            recreating: AtomicBool::new(false),
            recreations: AtomicU64::new(0),
            weak_self: weak_self.clone(),
        })
    }

    /// Presents the primary's current item fullscreen.
    ///
    /// Valid only from [`PresentationState::Dismissed`] with an item loaded
    /// on the primary. Returns `Ok(())` without presenting when a dismissal
    /// cancelled the attempt while the platform was working.
    #[instrument(skip(self))]
    pub async fn present(&self) -> Result<()> {
        let (epoch, item) = {
            let mut inner = self.inner.lock();
            if inner.state != PresentationState::Dismissed {
                return Err(PlaybackError::InvalidTransition {
                    from: inner.state.to_string(),
                    to: PresentationState::Presenting.to_string(),
                });
            }
            let item = self
                .primary
                .current_item()
                .ok_or(PlaybackError::NoItemLoaded)?;
            inner.state = PresentationState::Presenting;
            inner.epoch += 1;
            (inner.epoch, item)
        };

        self.emit(FullscreenEvent::WillPresent);

        let secondary = match self.create_secondary(&item).await {
            Ok(secondary) => secondary,
            Err(e) => {
                warn!(error = %e, "Mirror player creation failed");
                self.abandon(epoch);
                return Err(e);
            }
        };
        let Some(secondary) = self.claim_if_current(epoch, secondary) else {
            return Ok(());
        };

        let sync = StateSynchronizer::new(
            Arc::clone(&self.primary),
            Arc::clone(&secondary),
            self.config.clone(),
        );
        let weak = self.weak_self.clone();
        sync.set_on_secondary_released(move || {
            if let Some(controller) = weak.upgrade() {
                controller.request_recreation();
            }
        });

        {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                drop(inner);
                secondary.release();
                return Ok(());
            }
            inner.sync = Some(Arc::clone(&sync));
        }
        self.apply_controls();
        sync.start();

        if let Err(e) = self.host.present().await {
            warn!(error = %e, "Platform presentation failed");
            let sync = {
                let mut inner = self.inner.lock();
                if inner.epoch != epoch {
                    return Ok(());
                }
                inner.state = PresentationState::Dismissed;
                inner.epoch += 1;
                inner.sync.take()
            };
            if let Some(sync) = sync {
                sync.stop();
                if let Some(secondary) = sync.secondary() {
                    secondary.release();
                }
            }
            return Err(e.into());
        }

        {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                return Ok(());
            }
            inner.state = PresentationState::Presented;
        }
        self.start_backstop();
        info!(position_ms = self.primary.current_position(), "Fullscreen presented");
        self.emit(FullscreenEvent::DidPresent);
        Ok(())
    }

    /// Builds a muted mirror of `item` seeded with the primary's position
    /// and play state.
    async fn create_secondary(&self, item: &PlayableItem) -> Result<Arc<PlaybackSession>> {
        let handle = self.host.create_mirror_player(item).await?;
        let secondary = PlaybackSession::new(handle);

        let seeded = secondary
            .set_muted(true)
            .and_then(|_| secondary.load(item.clone()))
            .and_then(|_| secondary.seek(self.primary.current_position(), 0))
            .and_then(|_| {
                if self.primary.is_playing() {
                    secondary
                        .set_rate(self.primary.desired_rate())
                        .and_then(|_| secondary.play())
                } else {
                    Ok(())
                }
            });
        match seeded {
            Ok(()) => Ok(secondary),
            Err(e) => {
                secondary.release();
                Err(e)
            }
        }
    }

    /// Returns `secondary` if `epoch` is still the live presentation,
    /// releasing it otherwise.
    fn claim_if_current(
        &self,
        epoch: u64,
        secondary: Arc<PlaybackSession>,
    ) -> Option<Arc<PlaybackSession>> {
        let current = self.inner.lock().epoch == epoch;
        if current {
            Some(secondary)
        } else {
            debug!("Presentation cancelled while the mirror was created; releasing it");
            secondary.release();
            None
        }
    }

    fn abandon(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.epoch == epoch {
            inner.state = PresentationState::Dismissed;
            inner.epoch += 1;
        }
    }

    /// Dismisses the presentation. No-op when already dismissed.
    ///
    /// Order: will-dismiss, final secondary-to-primary commit, synchronizer
    /// stop, secondary release, did-dismiss.
    #[instrument(skip(self))]
    pub async fn dismiss(&self) -> Result<()> {
        let (sync, previous) = {
            let mut inner = self.inner.lock();
            if inner.state == PresentationState::Dismissed {
                return Ok(());
            }
            let previous = inner.state;
            inner.state = PresentationState::Dismissed;
            inner.epoch += 1;
            (inner.sync.take(), previous)
        };

        self.emit(FullscreenEvent::WillDismiss);
        self.stop_backstop();

        if let Some(sync) = sync {
            let outcome = sync.commit_reverse();
            debug!(?outcome, "Secondary state committed to primary");
            sync.stop();
            if let Some(secondary) = sync.secondary() {
                secondary.release();
            }
        }

        if let Err(e) = self.host.dismiss().await {
            warn!(error = %e, "Platform dismissal failed");
        }
        info!(from = %previous, "Fullscreen dismissed");
        self.emit(FullscreenEvent::DidDismiss);
        Ok(())
    }

    /// Records that the platform tore the mirror player down.
    ///
    /// The next reconciliation pass finds the secondary released and
    /// requests recreation.
    pub fn notify_secondary_lost(&self) {
        let secondary = self.inner.lock().sync.as_ref().and_then(|s| s.secondary());
        if let Some(secondary) = secondary {
            warn!(session_id = %secondary.id(), "Mirror player torn down by the platform");
            secondary.release();
        }
    }

    /// Requests a fresh mirror player while presented. Single-flight.
    pub fn request_recreation(&self) -> bool {
        let (epoch, item) = {
            let inner = self.inner.lock();
            if inner.state != PresentationState::Presented {
                return false;
            }
            match self.primary.current_item() {
                Some(item) => (inner.epoch, item),
                None => return false,
            }
        };
        if self.recreating.swap(true, Ordering::AcqRel) {
            return false;
        }

        info!("Recreating fullscreen mirror player");
        let weak = self.weak_self.clone();
        spawn_detached(async move {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            controller.recreate(epoch, item).await;
            controller.recreating.store(false, Ordering::Release);
        });
        true
    }

    async fn recreate(&self, epoch: u64, item: PlayableItem) {
        let secondary = match self.create_secondary(&item).await {
            Ok(secondary) => secondary,
            Err(e) => {
                warn!(error = %e, "Mirror recreation failed");
                return;
            }
        };

        let sync = {
            let inner = self.inner.lock();
            if inner.epoch != epoch || inner.state != PresentationState::Presented {
                None
            } else {
                inner.sync.clone()
            }
        };
        match sync {
            Some(sync) => {
                self.recreations.fetch_add(1, Ordering::Relaxed);
                let outcome = sync.replace_secondary(secondary);
                debug!(?outcome, "Mirror player replaced");
            }
            None => {
                debug!("Presentation ended during recreation; releasing new mirror");
                secondary.release();
            }
        }
    }

    fn start_backstop(&self) {
        let token = CancellationToken::new();
        let weak = self.weak_self.clone();
        spawn_ticker(self.config.backstop_interval(), token.clone(), move || {
            match weak.upgrade() {
                Some(controller) => controller.backstop_check(),
                None => false,
            }
        });
        if let Some(previous) = self.backstop.lock().replace(token) {
            previous.cancel();
        }
    }

    fn stop_backstop(&self) {
        if let Some(token) = self.backstop.lock().take() {
            token.cancel();
        }
    }

    /// Returns `false` once the presentation is over, ending the ticker.
    fn backstop_check(&self) -> bool {
        let (state, secondary) = {
            let inner = self.inner.lock();
            (
                inner.state,
                inner.sync.as_ref().and_then(|s| s.secondary()),
            )
        };
        if state != PresentationState::Presented {
            return false;
        }
        if secondary.map_or(true, |s| s.is_released()) {
            self.request_recreation();
        }
        true
    }

    /// Stores the control configuration, applying it now if presented.
    pub fn set_controls(&self, controls: ControlsConfig) {
        let presented = {
            let mut inner = self.inner.lock();
            inner.controls = controls;
            inner.state != PresentationState::Dismissed
        };
        if presented {
            self.apply_controls();
        }
    }

    fn apply_controls(&self) {
        let controls = self.inner.lock().controls.clone();
        self.host
            .apply_controls(&controls.visibility(), &controls.chrome());
    }

    fn emit(&self, event: FullscreenEvent) {
        let _ = self.bus.emit(CoreEvent::Fullscreen(event));
    }

    pub fn state(&self) -> PresentationState {
        self.inner.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() != PresentationState::Dismissed
    }

    pub fn secondary(&self) -> Option<Arc<PlaybackSession>> {
        self.inner.lock().sync.as_ref().and_then(|s| s.secondary())
    }

    pub fn synchronizer(&self) -> Option<Arc<StateSynchronizer>> {
        self.inner.lock().sync.clone()
    }

    pub fn recreation_count(&self) -> u64 {
        self.recreations.load(Ordering::Relaxed)
    }

    pub fn primary(&self) -> &Arc<PlaybackSession> {
        &self.primary
    }
}

impl Drop for FullscreenPresentationController {
    fn drop(&mut self) {
        if let Some(token) = self.backstop.get_mut().take() {
            token.cancel();
        }
    }
}

impl fmt::Debug for FullscreenPresentationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullscreenPresentationController")
            .field("state", &self.state())
            .field("recreations", &self.recreation_count())
            .finish()
    }
}
