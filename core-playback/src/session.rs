//! # Playback Session
//!
//! One controlled instance of an underlying player handle plus its
//! observable state.
//!
//! ## Overview
//!
//! A [`PlaybackSession`] exclusively owns its [`PlayerHandle`] from creation
//! until [`release`](PlaybackSession::release). It adds three things on top
//! of the raw handle:
//!
//! - **Intent tracking**: whether playback is wanted, explicitly paused by
//!   the user, or paused by the system (interruption, backgrounding).
//! - **Idempotent mutators**: repeating a call whose effect already holds
//!   performs no write on the handle.
//! - **Pending seek**: a seek issued before the item is ready is held (last
//!   write wins) and applied once the item reports ready.
//!
//! ## Subscriptions
//!
//! Observers subscribe per event kind and get back a [`SubscriptionHandle`].
//! Unsubscribing is explicit; `release()` drops every remaining subscriber
//! and detaches the handle listener before releasing the handle, so no
//! observer outlives the handle it watched.
//!
//! ```ignore
//! let session = PlaybackSession::new(player);
//! let sub = session.subscribe(SessionEventKind::RateChanged, |event| {
//!     println!("rate event: {:?}", event);
//! });
//! session.load(item)?;
//! session.seek(30_000, 0)?; // held until ready
//! session.play()?;
//! session.unsubscribe(&sub);
//! session.release();
//! ```

use crate::error::{PlaybackError, Result};
use bridge_traits::media::{PlayableItem, SelectedTrack, TrackKind};
use bridge_traits::player::{ItemStatus, PlayerEvent, PlayerHandle, PlayerListener};
use parking_lot::{Mutex, ReentrantMutex};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Unique identifier of a session, used in logs and registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the session is (or is not) playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayIntent {
    /// Playback was requested.
    Playing,
    /// The user paused.
    #[default]
    ExplicitPause,
    /// The system paused (interruption, lifecycle); playback may resume.
    SystemPause,
}

/// Event categories a subscriber can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    RateChanged,
    PositionDiscontinuity,
    StatusChanged,
    ReachedEnd,
    BufferingChanged,
}

impl SessionEventKind {
    pub fn of(event: &PlayerEvent) -> Self {
        match event {
            PlayerEvent::RateChanged { .. } => SessionEventKind::RateChanged,
            PlayerEvent::PositionDiscontinuity { .. } => SessionEventKind::PositionDiscontinuity,
            PlayerEvent::StatusChanged(_) => SessionEventKind::StatusChanged,
            PlayerEvent::ReachedEnd => SessionEventKind::ReachedEnd,
            PlayerEvent::BufferingChanged { .. } => SessionEventKind::BufferingChanged,
        }
    }
}

/// Callback invoked for each delivered session event.
pub type SessionCallback = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

/// Token returned by [`PlaybackSession::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    session: SessionId,
}

impl SubscriptionHandle {
    pub fn session_id(&self) -> SessionId {
        self.session
    }
}

/// A seek waiting for the item to become ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSeek {
    pub position_ms: u64,
    pub tolerance_ms: u64,
}

struct Subscriber {
    id: u64,
    kind: Option<SessionEventKind>,
    callback: SessionCallback,
}

struct SessionState {
    item: Option<PlayableItem>,
    desired_rate: f32,
    intent: PlayIntent,
    muted: bool,
    volume: f32,
    buffering: bool,
    pending_seek: Option<PendingSeek>,
    released: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            item: None,
            desired_rate: 1.0,
            intent: PlayIntent::default(),
            muted: false,
            volume: 1.0,
            buffering: false,
            pending_seek: None,
            released: false,
        }
    }
}

/// Player listener installed on the handle. Holds the session weakly so the
/// handle never keeps its owner alive.
struct SessionListener {
    session: Weak<PlaybackSession>,
}

impl PlayerListener for SessionListener {
    fn on_player_event(&self, event: PlayerEvent) {
        if let Some(session) = self.session.upgrade() {
            session.handle_player_event(event);
        }
    }
}

/// A playback session wrapping one player handle.
pub struct PlaybackSession {
    id: SessionId,
    handle: Arc<dyn PlayerHandle>,
    state: Mutex<SessionState>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscription: AtomicU64,
    // Serializes event delivery so subscribers see one session's events in
    // order. Reentrant: a subscriber may act on the handle, which can emit
    // synchronously on the same thread.
    delivery: ReentrantMutex<()>,
}

impl PlaybackSession {
    /// Wraps `handle` and installs the session's listener on it.
    pub fn new(handle: Arc<dyn PlayerHandle>) -> Arc<Self> {
        let session = Arc::new(Self {
            id: SessionId::new(),
            handle,
            state: Mutex::new(SessionState::default()),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            delivery: ReentrantMutex::new(()),
        });

        let listener: Arc<dyn PlayerListener> = Arc::new(SessionListener {
            session: Arc::downgrade(&session),
        });
        session.handle.set_listener(Some(listener));
        debug!(session_id = %session.id, "Playback session created");
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The underlying handle, for attaching it to a render surface.
    pub fn player(&self) -> Arc<dyn PlayerHandle> {
        Arc::clone(&self.handle)
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Subscribes to one kind of event.
    pub fn subscribe<F>(&self, kind: SessionEventKind, callback: F) -> SubscriptionHandle
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.add_subscriber(Some(kind), Arc::new(callback))
    }

    /// Subscribes to every event.
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.add_subscriber(None, Arc::new(callback))
    }

    fn add_subscriber(
        &self,
        kind: Option<SessionEventKind>,
        callback: SessionCallback,
    ) -> SubscriptionHandle {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push(Subscriber { id, kind, callback });
        SubscriptionHandle {
            id,
            session: self.id,
        }
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        if handle.session != self.id {
            return false;
        }
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != handle.id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn handle_player_event(&self, event: PlayerEvent) {
        let _delivery = self.delivery.lock();

        let pending_seek = {
            let mut state = self.state.lock();
            if state.released {
                return;
            }
            match &event {
                PlayerEvent::BufferingChanged { is_buffering } => {
                    state.buffering = *is_buffering;
                    None
                }
                PlayerEvent::StatusChanged(ItemStatus::ReadyToPlay) => state.pending_seek.take(),
                PlayerEvent::StatusChanged(ItemStatus::Failed(failure)) => {
                    warn!(
                        session_id = %self.id,
                        code = failure.code,
                        description = %failure.description,
                        "Item failed"
                    );
                    state.pending_seek = None;
                    None
                }
                _ => None,
            }
        };

        if let Some(seek) = pending_seek {
            debug!(
                session_id = %self.id,
                position_ms = seek.position_ms,
                "Applying pending seek"
            );
            if let Err(e) = self.handle.seek(seek.position_ms, seek.tolerance_ms) {
                warn!(session_id = %self.id, error = %e, "Pending seek failed");
            }
        }

        let kind = SessionEventKind::of(&event);
        let callbacks: Vec<SessionCallback> = self
            .subscribers
            .lock()
            .iter()
            .filter(|s| s.kind.map_or(true, |k| k == kind))
            .map(|s| Arc::clone(&s.callback))
            .collect();

        trace!(session_id = %self.id, ?kind, subscribers = callbacks.len(), "Delivering event");
        for callback in callbacks {
            callback(&event);
        }
    }

    // ========================================================================
    // Item
    // ========================================================================

    /// Swaps `item` in as the current item. Any pending seek is dropped.
    pub fn load(&self, item: PlayableItem) -> Result<()> {
        {
            let mut state = self.state.lock();
            ensure_live(&state)?;
            state.item = Some(item.clone());
            state.pending_seek = None;
            state.buffering = false;
        }
        debug!(session_id = %self.id, item_id = %item.id, "Loading item");
        self.handle.replace_item(Some(item))?;
        Ok(())
    }

    /// Removes the current item.
    pub fn unload(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            ensure_live(&state)?;
            if state.item.is_none() {
                return Ok(());
            }
            state.item = None;
            state.pending_seek = None;
        }
        self.handle.replace_item(None)?;
        Ok(())
    }

    pub fn current_item(&self) -> Option<PlayableItem> {
        self.state.lock().item.clone()
    }

    pub fn item_id(&self) -> Option<String> {
        self.state.lock().item.as_ref().map(|item| item.id.clone())
    }

    pub fn has_item(&self) -> bool {
        self.state.lock().item.is_some()
    }

    /// Readiness of the current item, as reported by the handle.
    pub fn status(&self) -> ItemStatus {
        let state = self.state.lock();
        if state.released || state.item.is_none() {
            return ItemStatus::Unknown;
        }
        drop(state);
        self.handle.status()
    }

    pub fn is_ready(&self) -> bool {
        self.status().is_ready()
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Starts playback at the desired rate.
    pub fn play(&self) -> Result<()> {
        let current_rate = self.handle.rate();
        let desired = {
            let mut state = self.state.lock();
            ensure_live(&state)?;
            if state.intent == PlayIntent::Playing && current_rate > 0.0 {
                return Ok(());
            }
            state.intent = PlayIntent::Playing;
            state.desired_rate
        };

        self.handle.play()?;
        if (desired - 1.0).abs() > f32::EPSILON {
            self.handle.set_rate(desired)?;
        }
        Ok(())
    }

    /// Pauses on behalf of the user. The rate drops to zero.
    pub fn pause(&self) -> Result<()> {
        self.pause_with(PlayIntent::ExplicitPause)
    }

    /// Pauses on behalf of the system (interruption, backgrounding).
    pub fn pause_for_system(&self) -> Result<()> {
        self.pause_with(PlayIntent::SystemPause)
    }

    fn pause_with(&self, intent: PlayIntent) -> Result<()> {
        let current_rate = self.handle.rate();
        {
            let mut state = self.state.lock();
            ensure_live(&state)?;
            let unchanged = state.intent == intent;
            state.intent = intent;
            if unchanged && current_rate == 0.0 {
                return Ok(());
            }
        }
        if current_rate == 0.0 {
            return Ok(());
        }
        self.handle.pause()?;
        Ok(())
    }

    /// Seeks to `position_ms`. Before the item is ready the seek is held and
    /// replaces any previously held seek.
    pub fn seek(&self, position_ms: u64, tolerance_ms: u64) -> Result<()> {
        let ready = self.is_ready();
        {
            let mut state = self.state.lock();
            ensure_live(&state)?;
            if !ready {
                trace!(session_id = %self.id, position_ms, "Holding seek until ready");
                state.pending_seek = Some(PendingSeek {
                    position_ms,
                    tolerance_ms,
                });
                return Ok(());
            }
            state.pending_seek = None;
        }

        if self.current_position() == position_ms {
            return Ok(());
        }
        self.handle.seek(position_ms, tolerance_ms)?;
        Ok(())
    }

    /// Sets the playback rate. A rate of zero pauses.
    ///
    /// While paused, a positive rate is remembered and applied by the next
    /// [`play`](Self::play).
    pub fn set_rate(&self, rate: f32) -> Result<()> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(PlaybackError::InvalidRate(rate));
        }
        if rate == 0.0 {
            return self.pause();
        }

        let playing = {
            let mut state = self.state.lock();
            ensure_live(&state)?;
            state.desired_rate = rate;
            state.intent == PlayIntent::Playing
        };

        if playing && (self.handle.rate() - rate).abs() > f32::EPSILON {
            self.handle.set_rate(rate)?;
        }
        Ok(())
    }

    /// Sets the output volume in `[0.0, 1.0]`.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume));
        }
        {
            let mut state = self.state.lock();
            ensure_live(&state)?;
            if (state.volume - volume).abs() <= f32::EPSILON {
                return Ok(());
            }
            state.volume = volume;
        }
        self.handle.set_volume(volume)?;
        Ok(())
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        {
            let mut state = self.state.lock();
            ensure_live(&state)?;
            if state.muted == muted {
                return Ok(());
            }
            state.muted = muted;
        }
        self.handle.set_muted(muted)?;
        Ok(())
    }

    pub fn select_track(&self, kind: TrackKind, selection: &SelectedTrack) -> Result<()> {
        ensure_live(&self.state.lock())?;
        self.handle.select_track(kind, selection)?;
        Ok(())
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Current position in milliseconds; 0 when the handle reports a
    /// non-finite or negative time.
    pub fn current_position(&self) -> u64 {
        if self.is_released() {
            return 0;
        }
        secs_to_ms(self.handle.current_time_secs())
    }

    /// Duration of the current item in milliseconds, when finite.
    pub fn duration_ms(&self) -> Option<u64> {
        let state = self.state.lock();
        let item = state.item.as_ref()?;
        item.duration_secs
            .is_finite()
            .then(|| secs_to_ms(item.duration_secs))
    }

    pub fn rate(&self) -> f32 {
        if self.is_released() {
            return 0.0;
        }
        self.handle.rate()
    }

    pub fn is_playing(&self) -> bool {
        self.rate() > 0.0
    }

    pub fn intent(&self) -> PlayIntent {
        self.state.lock().intent
    }

    pub fn desired_rate(&self) -> f32 {
        self.state.lock().desired_rate
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn is_buffering(&self) -> bool {
        self.state.lock().buffering
    }

    pub fn pending_seek(&self) -> Option<PendingSeek> {
        self.state.lock().pending_seek
    }

    pub fn is_external_playback_active(&self) -> bool {
        !self.is_released() && self.handle.is_external_playback_active()
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Drops all subscribers, detaches the listener and releases the handle.
    ///
    /// Idempotent.
    pub fn release(&self) {
        {
            let mut state = self.state.lock();
            if state.released {
                return;
            }
            state.released = true;
            state.pending_seek = None;
            state.item = None;
        }

        self.subscribers.lock().clear();
        self.handle.set_listener(None);
        self.handle.release();
        debug!(session_id = %self.id, "Playback session released");
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("item", &state.item.as_ref().map(|item| item.id.as_str()))
            .field("intent", &state.intent)
            .field("muted", &state.muted)
            .field("released", &state.released)
            .finish()
    }
}

fn ensure_live(state: &SessionState) -> Result<()> {
    if state.released {
        Err(PlaybackError::SessionReleased)
    } else {
        Ok(())
    }
}

pub(crate) fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    }
}
