use super::{metadata, NowPlayingContext, TrackChangeRequest};
use crate::config::NowPlayingConfig;
use crate::session::{PlaybackSession, SessionEventKind, SessionId, SubscriptionHandle};
use bridge_traits::now_playing::{
    CommandHandler, CommandStatus, CommandTargetId, NowPlayingInfo, NowPlayingSurface,
    RemoteCommand, RemoteCommandCenter,
};
use bridge_traits::player::{ItemStatus, PlayerEvent};
use core_async::sync::{broadcast, CancellationToken};
use core_async::time::{Duration, Instant};
use core_async::timer::{spawn_ticker, TimerSlot};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, trace, warn};

const TRACK_CHANGE_CAPACITY: usize = 16;

/// Result of [`NowPlayingCoordinator::register_player`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The session was added, or re-registered after its debounce window.
    Registered { became_current: bool },
    /// Within the debounce window of the previous registration.
    Coalesced,
    /// The session already is the current one.
    AlreadyCurrent,
}

/// Result of [`NowPlayingCoordinator::update_now_playing_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// Too soon after the previous publish; a trailing refresh is scheduled.
    Throttled,
    NoCurrent,
    NotReady,
}

struct Registration {
    session_id: SessionId,
    session: Weak<PlaybackSession>,
    context: Option<Weak<dyn NowPlayingContext>>,
    observers: Vec<SubscriptionHandle>,
    last_registered_at: Instant,
}

#[derive(Default)]
struct Registry {
    entries: Vec<Registration>,
    current: Option<SessionId>,
    receiving_remote_events: bool,
    last_published_at: Option<Instant>,
}

impl Registry {
    fn entry(&self, id: SessionId) -> Option<&Registration> {
        self.entries.iter().find(|e| e.session_id == id)
    }

    fn current_entry(&self) -> Option<&Registration> {
        self.current.and_then(|id| self.entry(id))
    }
}

fn same_context(
    a: &Option<Weak<dyn NowPlayingContext>>,
    b: &Option<Weak<dyn NowPlayingContext>>,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Weak::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Registry of playback sessions feeding the system now-playing surface.
///
/// Sessions are held weakly: registration never extends a session's
/// lifetime. Observers the coordinator adds to a session are removed in
/// [`remove_player`](Self::remove_player), which owners must call before
/// releasing the session.
pub struct NowPlayingCoordinator {
    surface: Arc<dyn NowPlayingSurface>,
    commands: Arc<dyn RemoteCommandCenter>,
    config: NowPlayingConfig,
    registry: Mutex<Registry>,
    targets: Mutex<Vec<(RemoteCommand, CommandTargetId)>>,
    refresh: TimerSlot,
    elapsed_ticker: Mutex<Option<CancellationToken>>,
    track_changes: broadcast::Sender<TrackChangeRequest>,
    weak_self: Weak<Self>,
}

impl NowPlayingCoordinator {
    pub fn new(
        surface: Arc<dyn NowPlayingSurface>,
        commands: Arc<dyn RemoteCommandCenter>,
        config: NowPlayingConfig,
    ) -> Arc<Self> {
        let (track_changes, _) = broadcast::channel(TRACK_CHANGE_CAPACITY);
        Arc::new_cyclic(|weak_self| Self {
            surface,
            commands,
            config,
            registry: Mutex::new(Registry::default()),
            targets: Mutex::new(Vec::new()),
            refresh: TimerSlot::new(),
            elapsed_ticker: Mutex::new(None),
            track_changes,
            weak_self: weak_self.clone(),
        })
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers `session`, optionally with the view context that owns it.
    ///
    /// Repeated registrations of the same session within its debounce
    /// window are coalesced; a changed context is still recorded. A new
    /// session becomes current when there is no current session or when it
    /// is already producing output.
    #[instrument(skip(self, session, context), fields(session_id = %session.id()))]
    pub fn register_player(
        &self,
        session: &Arc<PlaybackSession>,
        context: Option<Weak<dyn NowPlayingContext>>,
    ) -> RegistrationOutcome {
        let id = session.id();
        let now = Instant::now();
        let rate = session.rate();
        let queue_mode = context
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|ctx| ctx.is_queue_mode());

        let mut refresh = false;
        let mut elect = false;
        let mut observe = false;
        let outcome = {
            let mut registry = self.registry.lock();
            let is_current = registry.current == Some(id);
            let window = self.config.registration_window(queue_mode, is_current);
            let no_current = registry.current.is_none();

            match registry.entries.iter_mut().find(|e| e.session_id == id) {
                Some(entry) => {
                    let changed = !same_context(&entry.context, &context);
                    if now.duration_since(entry.last_registered_at) < window {
                        if changed {
                            entry.context = context;
                            refresh = true;
                        }
                        RegistrationOutcome::Coalesced
                    } else {
                        entry.last_registered_at = now;
                        entry.context = context;
                        if is_current {
                            refresh = changed || queue_mode;
                            RegistrationOutcome::AlreadyCurrent
                        } else {
                            elect = no_current || rate > 0.0;
                            RegistrationOutcome::Registered {
                                became_current: elect,
                            }
                        }
                    }
                }
                None => {
                    registry.entries.push(Registration {
                        session_id: id,
                        session: Arc::downgrade(session),
                        context,
                        observers: Vec::new(),
                        last_registered_at: now,
                    });
                    observe = true;
                    elect = no_current || rate > 0.0;
                    RegistrationOutcome::Registered {
                        became_current: elect,
                    }
                }
            }
        };

        if observe {
            let observers = self.observe(session);
            let orphaned = {
                let mut registry = self.registry.lock();
                match registry.entries.iter_mut().find(|e| e.session_id == id) {
                    Some(entry) => {
                        entry.observers = observers;
                        Vec::new()
                    }
                    None => observers,
                }
            };
            for handle in &orphaned {
                session.unsubscribe(handle);
            }
        }

        if !matches!(outcome, RegistrationOutcome::Coalesced) {
            self.enable_remote_events();
        }
        if elect {
            self.make_current(id);
        } else if refresh {
            self.schedule_refresh();
        }

        debug!(?outcome, rate, queue_mode, "Player registration");
        outcome
    }

    /// Removes a session and its observers. Removing the last session
    /// tears the coordinator down.
    #[instrument(skip(self))]
    pub fn remove_player(&self, session_id: SessionId) -> bool {
        let (entry, was_current, empty) = {
            let mut registry = self.registry.lock();
            let Some(position) = registry
                .entries
                .iter()
                .position(|e| e.session_id == session_id)
            else {
                return false;
            };
            let entry = registry.entries.remove(position);
            let was_current = registry.current == Some(session_id);
            if was_current {
                registry.current = None;
            }
            (entry, was_current, registry.entries.is_empty())
        };

        if let Some(session) = entry.session.upgrade() {
            for handle in &entry.observers {
                session.unsubscribe(handle);
            }
        }
        debug!(was_current, "Player removed");

        if empty {
            self.teardown();
        } else if was_current {
            self.elect_replacement(session_id);
        }
        true
    }

    /// Resets the coordinator: cancels the refresh timers, removes command
    /// targets and observers, clears the surface and stops remote event
    /// reception. Safe to call repeatedly.
    pub fn teardown(&self) -> bool {
        let entries = {
            let mut registry = self.registry.lock();
            if registry.entries.is_empty()
                && registry.current.is_none()
                && !registry.receiving_remote_events
            {
                return false;
            }
            registry.current = None;
            registry.receiving_remote_events = false;
            registry.last_published_at = None;
            std::mem::take(&mut registry.entries)
        };

        self.refresh.cancel();
        self.stop_elapsed_ticker();
        self.invalidate_targets(true);
        for entry in entries {
            if let Some(session) = entry.session.upgrade() {
                for handle in &entry.observers {
                    session.unsubscribe(handle);
                }
            }
        }
        self.surface.clear();
        self.surface.set_receiving_remote_events(false);
        info!("Now-playing coordinator reset");
        true
    }

    fn enable_remote_events(&self) {
        let enable = {
            let mut registry = self.registry.lock();
            !std::mem::replace(&mut registry.receiving_remote_events, true)
        };
        if enable {
            self.surface.set_receiving_remote_events(true);
        }
    }

    // ========================================================================
    // Election
    // ========================================================================

    fn make_current(&self, id: SessionId) {
        {
            let mut registry = self.registry.lock();
            if registry.current == Some(id) || registry.entry(id).is_none() {
                return;
            }
            registry.current = Some(id);
        }
        info!(session_id = %id, "Now-playing session elected");
        self.register_command_targets();
        self.start_elapsed_ticker(id);
        self.schedule_refresh();
    }

    /// Republishes the elapsed time periodically while `id` is current
    /// and playing. Replaces the ticker of the previous current session.
    fn start_elapsed_ticker(&self, id: SessionId) {
        let token = CancellationToken::new();
        if let Some(previous) = self.elapsed_ticker.lock().replace(token.clone()) {
            previous.cancel();
        }

        let weak = self.weak_self.clone();
        let spawned = spawn_ticker(self.config.elapsed_refresh_interval(), token, move || {
            let Some(coordinator) = weak.upgrade() else {
                return false;
            };
            let Some(session) = coordinator.current_session().filter(|s| s.id() == id) else {
                return false;
            };
            if session.is_playing() {
                coordinator.update_now_playing_info();
            }
            true
        });
        if spawned.is_none() {
            trace!(session_id = %id, "No runtime; elapsed refresh relies on events");
        }
    }

    fn stop_elapsed_ticker(&self) {
        if let Some(token) = self.elapsed_ticker.lock().take() {
            token.cancel();
        }
    }

    /// Elects the first other session with a nonzero rate, or clears the
    /// current session and the published entry.
    fn elect_replacement(&self, excluding: SessionId) {
        let candidates: Vec<Arc<PlaybackSession>> = {
            let registry = self.registry.lock();
            registry
                .entries
                .iter()
                .filter(|e| e.session_id != excluding)
                .filter_map(|e| e.session.upgrade())
                .collect()
        };

        match candidates.into_iter().find(|s| s.rate() != 0.0) {
            Some(session) => self.make_current(session.id()),
            None => {
                {
                    let mut registry = self.registry.lock();
                    if registry.current.is_some_and(|id| id != excluding) {
                        return;
                    }
                    registry.current = None;
                }
                self.refresh.cancel();
                self.stop_elapsed_ticker();
                self.surface.clear();
                debug!("No playing session left; now-playing cleared");
            }
        }
    }

    fn observe(&self, session: &Arc<PlaybackSession>) -> Vec<SubscriptionHandle> {
        let id = session.id();

        let weak = self.weak_self.clone();
        let rate = session.subscribe(SessionEventKind::RateChanged, move |event| {
            if let (Some(coordinator), PlayerEvent::RateChanged { rate }) = (weak.upgrade(), event)
            {
                coordinator.on_rate_changed(id, *rate);
            }
        });

        let weak = self.weak_self.clone();
        let status = session.subscribe(SessionEventKind::StatusChanged, move |event| {
            if let (Some(coordinator), PlayerEvent::StatusChanged(status)) = (weak.upgrade(), event)
            {
                coordinator.on_status_changed(id, status);
            }
        });

        let weak = self.weak_self.clone();
        let seek = session.subscribe(SessionEventKind::PositionDiscontinuity, move |_| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_position_changed(id);
            }
        });

        vec![rate, status, seek]
    }

    fn on_rate_changed(&self, id: SessionId, rate: f32) {
        let current = self.registry.lock().current;
        trace!(session_id = %id, rate, "Registered session rate changed");

        if rate != 0.0 && current != Some(id) {
            self.make_current(id);
            return;
        }
        if rate == 0.0 && current == Some(id) {
            self.elect_replacement(id);
            return;
        }
        if current == Some(id) {
            self.schedule_refresh();
        }
    }

    fn on_position_changed(&self, id: SessionId) {
        if self.registry.lock().current == Some(id) {
            trace!(session_id = %id, "Position jumped; refreshing elapsed time");
            self.schedule_refresh();
        }
    }

    fn on_status_changed(&self, id: SessionId, status: &ItemStatus) {
        match status {
            ItemStatus::Failed(failure) => {
                warn!(session_id = %id, code = failure.code, "Item failed; leaving now-playing");
                self.remove_player(id);
            }
            ItemStatus::ReadyToPlay if self.registry.lock().current == Some(id) => {
                self.schedule_refresh();
            }
            _ => {}
        }
    }

    // ========================================================================
    // Remote command targets
    // ========================================================================

    fn register_command_targets(&self) {
        self.invalidate_targets(false);

        let mut registered = Vec::with_capacity(RemoteCommand::ALL.len());
        for command in RemoteCommand::ALL {
            let weak = self.weak_self.clone();
            let handler: CommandHandler = Arc::new(move |event| match weak.upgrade() {
                Some(coordinator) => coordinator.handle_remote_command(event),
                None => CommandStatus::CommandFailed,
            });
            registered.push((command, self.commands.add_target(command, handler)));
            self.commands.set_enabled(command, true);
        }
        *self.targets.lock() = registered;
        debug!("Remote command targets registered");
    }

    fn invalidate_targets(&self, disable: bool) {
        let targets = std::mem::take(&mut *self.targets.lock());
        for (command, target) in targets {
            self.commands.remove_target(command, target);
        }
        if disable {
            for command in RemoteCommand::ALL {
                self.commands.set_enabled(command, false);
            }
        }
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    /// Schedules a refresh after the configured delay, replacing any
    /// pending one.
    pub fn schedule_refresh(&self) {
        let queue_mode = self
            .current_context()
            .is_some_and(|ctx| ctx.is_queue_mode());
        let delay = self.config.refresh_delay(queue_mode);
        if !self.schedule_update(delay) {
            self.update_now_playing_info();
        }
    }

    fn schedule_update(&self, delay: Duration) -> bool {
        let weak = self.weak_self.clone();
        self.refresh.schedule(delay, move || {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.update_now_playing_info();
            }
        })
    }

    /// Publishes the current session's info now, subject to the publish
    /// rate limit.
    pub fn update_now_playing_info(&self) -> PublishOutcome {
        let now = Instant::now();
        let (session, context) = {
            let registry = self.registry.lock();
            if let Some(last) = registry.last_published_at {
                let elapsed = now.duration_since(last);
                let min = self.config.min_publish_interval();
                if elapsed < min {
                    drop(registry);
                    trace!("Publish throttled; trailing refresh scheduled");
                    self.schedule_update(min - elapsed);
                    return PublishOutcome::Throttled;
                }
            }
            match registry.current_entry() {
                Some(entry) => (
                    entry.session.upgrade(),
                    entry.context.as_ref().and_then(Weak::upgrade),
                ),
                None => (None, None),
            }
        };

        let Some(session) = session else {
            return PublishOutcome::NoCurrent;
        };
        let Some(item) = session.current_item().filter(|_| session.is_ready()) else {
            return PublishOutcome::NotReady;
        };

        let custom = context.and_then(|ctx| ctx.custom_metadata());
        let display = metadata::extract(custom.as_ref(), &item);
        let elapsed_ms = session.current_position();
        let info = NowPlayingInfo {
            title: display.title,
            artist: display.artist,
            artwork: display.artwork,
            duration_secs: item.finite_duration_secs(),
            elapsed_secs: (elapsed_ms as f64 / 1000.0).round(),
            rate: session.rate(),
            is_live: item.is_live,
        };

        self.registry.lock().last_published_at = Some(now);
        debug!(title = %info.title, rate = info.rate, "Publishing now-playing info");
        self.surface.publish(info);
        PublishOutcome::Published
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub(super) fn current_session(&self) -> Option<Arc<PlaybackSession>> {
        self.registry
            .lock()
            .current_entry()
            .and_then(|e| e.session.upgrade())
    }

    pub(super) fn current_context(&self) -> Option<Arc<dyn NowPlayingContext>> {
        self.registry
            .lock()
            .current_entry()
            .and_then(|e| e.context.as_ref())
            .and_then(Weak::upgrade)
    }

    pub(super) fn broadcast_track_change(&self, request: TrackChangeRequest) {
        // No listener means no host view wants the request.
        let _ = self.track_changes.send(request);
    }

    /// Track changes requested while queue mode was inactive.
    pub fn subscribe_track_changes(&self) -> broadcast::Receiver<TrackChangeRequest> {
        self.track_changes.subscribe()
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.registry.lock().current
    }

    pub fn is_registered(&self, session_id: SessionId) -> bool {
        self.registry.lock().entry(session_id).is_some()
    }

    pub fn registered_count(&self) -> usize {
        self.registry.lock().entries.len()
    }

    pub fn is_receiving_remote_events(&self) -> bool {
        self.registry.lock().receiving_remote_events
    }

    pub fn command_target_count(&self) -> usize {
        self.targets.lock().len()
    }

    pub fn config(&self) -> &NowPlayingConfig {
        &self.config
    }
}

impl fmt::Debug for NowPlayingCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("NowPlayingCoordinator")
            .field("registered", &registry.entries.len())
            .field("current", &registry.current)
            .field("receiving_remote_events", &registry.receiving_remote_events)
            .finish()
    }
}
