//! # Video Controller
//!
//! One controller per player view. It owns the view's primary session and
//! the components built on it (loader, queue, fullscreen), exposes the
//! command surface the application layer drives, and translates session
//! events into named events on the view's [`EventBus`].
//!
//! ## Teardown
//!
//! [`VideoController::release`] tears down in a fixed order: timers and
//! listeners first, then fullscreen, then the now-playing registration
//! (which removes the coordinator's observers), then queue and loader, and
//! the session (which releases the player handle) last.

use crate::error::{CoreError, Result};
use crate::lifecycle::{self, LifecycleAction, LifecycleFlags};
use bridge_traits::host::AdsController;
use bridge_traits::lifecycle::{
    AudioSessionEvent, HostSignal, LifecycleEvent, LifecycleObserver,
};
use bridge_traits::media::{SelectedTrack, TrackKind};
use bridge_traits::player::{ItemStatus, PlayerEvent, PlayerHandle};
use bridge_traits::presentation::{RenderSurface, ResizeMode};
use bridge_traits::source::{CustomMetadata, SourceDescriptor, SourcePreparer};
use core_async::future::{select, Either};
use core_async::sync::broadcast::error::RecvError;
use core_async::sync::CancellationToken;
use core_async::task::spawn_detached;
use core_async::time::Duration;
use core_async::timer::{spawn_ticker, TimerSlot};
use core_playback::{
    ControlsConfig, ExternalServiceRegistry, FullscreenPresentationController, LoadTicket,
    LoaderEvent, NavigationOutcome, NowPlayingContext, NowPlayingCoordinator, PlayIntent,
    PlaybackConfig, PlaybackSession, PresentationState, QueueController, SessionId,
    SourceLoader, TrackChangeRequest,
};
use core_playback::session::SubscriptionHandle;
use core_playback::source::LoaderSubscription;
use core_runtime::events::{CoreEvent, EventBus, EventStream, LoadEvent, PlaybackEvent};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, trace, warn};

/// Playback position past which a source counts as started for ads.
const AD_REQUEST_THRESHOLD_SECS: f64 = 0.0001;

/// Everything a controller is built from.
pub(crate) struct ControllerParts {
    pub player: Arc<dyn PlayerHandle>,
    pub surface: Option<Arc<dyn RenderSurface>>,
    pub preparer: Arc<dyn SourcePreparer>,
    pub presentation_host: Option<Arc<dyn bridge_traits::presentation::PresentationHost>>,
    pub coordinator: Option<Arc<NowPlayingCoordinator>>,
    pub external: Option<Arc<ExternalServiceRegistry>>,
    pub ads: Option<Arc<dyn AdsController>>,
    pub config: PlaybackConfig,
    pub bus: EventBus,
}

#[derive(Debug, Default)]
struct ViewState {
    play_in_background: bool,
    play_when_inactive: bool,
    show_notification_controls: bool,
    interrupted: bool,
    resume_after_interruption: bool,
    text_track: Option<SelectedTrack>,
    audio_track: Option<SelectedTrack>,
    controls: Option<ControlsConfig>,
    /// Target of the last seek issued through the controller, in ms.
    seek_target: Option<u64>,
    ad_tag_url: Option<String>,
    ads_requested: bool,
}

#[derive(Default)]
struct Listeners {
    session: Vec<SubscriptionHandle>,
    loader: Option<LoaderSubscription>,
    progress: Option<CancellationToken>,
}

/// Per-view playback controller.
pub struct VideoController {
    session: Arc<PlaybackSession>,
    loader: Arc<SourceLoader>,
    queue: Arc<QueueController>,
    fullscreen: Option<Arc<FullscreenPresentationController>>,
    coordinator: Option<Arc<NowPlayingCoordinator>>,
    external: Option<Arc<ExternalServiceRegistry>>,
    ads: Option<Arc<dyn AdsController>>,
    surface: Option<Arc<dyn RenderSurface>>,
    bus: EventBus,
    config: Mutex<PlaybackConfig>,
    state: Mutex<ViewState>,
    listeners: Mutex<Listeners>,
    now_playing: TimerSlot,
    background: CancellationToken,
    released: AtomicBool,
    weak_self: Weak<Self>,
}

impl VideoController {
    pub(crate) fn new(parts: ControllerParts) -> Arc<Self> {
        let session = PlaybackSession::new(parts.player);
        let loader = SourceLoader::new(
            Arc::clone(&session),
            parts.preparer,
            parts.bus.clone(),
        );
        let queue = QueueController::new(
            Arc::clone(&loader),
            parts.bus.clone(),
            parts.config.queue.clone(),
        );
        let fullscreen = parts.presentation_host.map(|host| {
            FullscreenPresentationController::new(
                Arc::clone(&session),
                host,
                parts.bus.clone(),
                parts.config.sync.clone(),
            )
        });

        let controller = Arc::new_cyclic(|weak_self| Self {
            session,
            loader,
            queue,
            fullscreen,
            coordinator: parts.coordinator,
            external: parts.external,
            ads: parts.ads,
            surface: parts.surface,
            bus: parts.bus,
            config: Mutex::new(parts.config),
            state: Mutex::new(ViewState::default()),
            listeners: Mutex::new(Listeners::default()),
            now_playing: TimerSlot::new(),
            background: CancellationToken::new(),
            released: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        });
        controller.wire();
        controller
    }

    fn wire(self: &Arc<Self>) {
        if let Some(surface) = &self.surface {
            surface.attach(self.session.player().as_ref());
        }

        let weak = Arc::downgrade(self);
        let session_events = self.session.subscribe_all(move |event| {
            if let Some(controller) = weak.upgrade() {
                controller.on_session_event(event);
            }
        });

        let weak = Arc::downgrade(self);
        let loader_events = self.loader.subscribe(move |event| {
            if let Some(controller) = weak.upgrade() {
                controller.on_loader_event(event);
            }
        });

        {
            let mut listeners = self.listeners.lock();
            listeners.session.push(session_events);
            listeners.loader = Some(loader_events);
        }

        self.start_progress();
        self.listen_for_track_changes();
        debug!(session_id = %self.session.id(), "Video controller wired");
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Assigns a single source, replacing whatever is loading or playing.
    #[instrument(skip(self, source), fields(session_id = %self.session.id()))]
    pub fn set_src(&self, source: SourceDescriptor) -> Result<LoadTicket> {
        self.ensure_live()?;
        Ok(self.loader.set_src(source)?)
    }

    /// Assigns a queue. An empty list leaves queue mode.
    #[instrument(skip(self, sources), fields(session_id = %self.session.id(), len = sources.len()))]
    pub fn set_queue(&self, sources: Vec<SourceDescriptor>) -> Result<()> {
        self.ensure_live()?;
        self.queue.set_queue(sources)?;
        self.schedule_now_playing();
        Ok(())
    }

    pub fn play(&self) -> Result<()> {
        self.ensure_live()?;
        self.session.play()?;
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.ensure_live()?;
        self.session.pause()?;
        Ok(())
    }

    /// The `paused` view property.
    pub fn set_paused(&self, paused: bool) -> Result<()> {
        if paused {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn seek(&self, position_ms: u64, tolerance_ms: u64) -> Result<()> {
        self.ensure_live()?;
        self.state.lock().seek_target = Some(position_ms);
        self.session.seek(position_ms, tolerance_ms)?;
        Ok(())
    }

    pub fn set_rate(&self, rate: f32) -> Result<()> {
        self.ensure_live()?;
        self.session.set_rate(rate)?;
        Ok(())
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.ensure_live()?;
        self.session.set_muted(muted)?;
        Ok(())
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.ensure_live()?;
        self.session.set_volume(volume)?;
        if let Some(external) = &self.external {
            external.notify_volume_changed(volume);
        }
        Ok(())
    }

    pub fn set_resize_mode(&self, mode: ResizeMode) {
        if let Some(surface) = &self.surface {
            surface.set_resize_mode(mode);
        }
    }

    /// Stores the text track selection and applies it to the current item.
    /// The selection is re-applied to every item that becomes ready.
    pub fn set_selected_text_track(&self, selection: SelectedTrack) -> Result<()> {
        self.select_track(TrackKind::Text, selection)
    }

    /// Stores the audio track selection and applies it to the current item.
    pub fn set_selected_audio_track(&self, selection: SelectedTrack) -> Result<()> {
        self.select_track(TrackKind::Audio, selection)
    }

    fn select_track(&self, kind: TrackKind, selection: SelectedTrack) -> Result<()> {
        self.ensure_live()?;
        {
            let mut state = self.state.lock();
            match kind {
                TrackKind::Text => state.text_track = Some(selection.clone()),
                TrackKind::Audio => state.audio_track = Some(selection.clone()),
            }
        }
        if self.session.is_ready() {
            self.session.select_track(kind, &selection)?;
        }
        Ok(())
    }

    /// Presents or dismisses fullscreen.
    pub async fn set_fullscreen(&self, fullscreen: bool) -> Result<()> {
        self.ensure_live()?;
        let controller = self.fullscreen.as_ref().ok_or_else(|| {
            CoreError::capability_missing(
                "PresentationHost",
                "Fullscreen was requested but the core was built without a \
                 PresentationHost. Enable fullscreen in CoreConfig.",
            )
        })?;

        if fullscreen {
            if controller.state() != PresentationState::Dismissed {
                return Ok(());
            }
            controller.present().await?;
        } else {
            controller.dismiss().await?;
        }
        Ok(())
    }

    /// Applies the fullscreen control-bar configuration.
    pub fn set_controls_config(&self, controls: ControlsConfig) {
        self.state.lock().controls = Some(controls.clone());
        if let Some(fullscreen) = &self.fullscreen {
            fullscreen.set_controls(controls);
        }
    }

    /// Shows or hides this view's entry on the system now-playing surface.
    pub fn set_show_notification_controls(&self, show: bool) {
        self.state.lock().show_notification_controls = show;
        if show {
            self.schedule_now_playing();
        } else {
            self.now_playing.cancel();
            if let Some(coordinator) = &self.coordinator {
                coordinator.remove_player(self.session.id());
            }
        }
    }

    pub fn set_play_in_background(&self, enabled: bool) {
        self.state.lock().play_in_background = enabled;
    }

    pub fn set_play_when_inactive(&self, enabled: bool) {
        self.state.lock().play_when_inactive = enabled;
    }

    /// Changes the `progress` interval. Restarts the reporter.
    pub fn set_progress_update_interval(&self, interval_ms: u64) {
        if interval_ms == 0 {
            warn!("Ignoring zero progress update interval");
            return;
        }
        self.config.lock().progress_update_interval_ms = interval_ms;
        if let Some(controller) = self.weak_self.upgrade() {
            controller.start_progress();
        }
    }

    pub fn next_track(&self) -> Result<NavigationOutcome> {
        self.ensure_live()?;
        Ok(self.queue.advance()?)
    }

    pub fn previous_track(&self) -> Result<NavigationOutcome> {
        self.ensure_live()?;
        Ok(self.queue.retreat()?)
    }

    // ========================================================================
    // Host signals
    // ========================================================================

    pub fn handle_lifecycle(&self, event: LifecycleEvent) {
        self.handle_signal(HostSignal::Lifecycle(event));
    }

    pub fn handle_audio_session(&self, event: AudioSessionEvent) {
        self.handle_signal(HostSignal::AudioSession(event));
    }

    #[instrument(skip(self), fields(session_id = %self.session.id()))]
    pub fn handle_signal(&self, signal: HostSignal) {
        if self.is_released() {
            return;
        }
        let flags = self.flags();
        let actions = lifecycle::decide(signal, &flags);
        debug!(?actions, "Host signal handled");
        for action in actions {
            self.perform(action);
        }
    }

    /// Feeds this controller from `observer`'s signal stream until release.
    pub async fn attach_lifecycle_observer(
        &self,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Result<()> {
        self.ensure_live()?;
        let mut stream = observer.subscribe_changes().await.map_err(|e| {
            CoreError::InitializationFailed(format!("lifecycle subscription failed: {e}"))
        })?;

        let weak = self.weak_self.clone();
        let token = self.background.clone();
        spawn_detached(async move {
            loop {
                let signal = match select(Box::pin(token.cancelled()), stream.next()).await {
                    Either::Left(_) => break,
                    Either::Right((None, _)) => break,
                    Either::Right((Some(signal), _)) => signal,
                };
                match weak.upgrade() {
                    Some(controller) => controller.handle_signal(signal),
                    None => break,
                }
            }
            trace!("Lifecycle listener stopped");
        });
        Ok(())
    }

    fn flags(&self) -> LifecycleFlags {
        let state = self.state.lock();
        LifecycleFlags {
            play_in_background: state.play_in_background,
            play_when_inactive: state.play_when_inactive,
            is_playing: self.session.is_playing(),
            user_paused: self.session.intent() == PlayIntent::ExplicitPause,
            queue_mode: self.queue.is_queue_mode(),
            interrupted: state.interrupted,
            resume_after_interruption: state.resume_after_interruption,
        }
    }

    fn perform(&self, action: LifecycleAction) {
        let result = match action {
            LifecycleAction::PauseForSystem => self.session.pause_for_system(),
            LifecycleAction::Resume => {
                // Only playback the system paused comes back on its own.
                if self.session.has_item() && self.session.intent() == PlayIntent::SystemPause {
                    self.session.play()
                } else {
                    Ok(())
                }
            }
            LifecycleAction::RePause => self.session.pause(),
            LifecycleAction::DetachSurface => {
                if let Some(surface) = &self.surface {
                    surface.detach(self.session.player().as_ref());
                }
                Ok(())
            }
            LifecycleAction::AttachSurface => {
                if let Some(surface) = &self.surface {
                    surface.attach(self.session.player().as_ref());
                }
                Ok(())
            }
            LifecycleAction::ScheduleNowPlaying => {
                self.schedule_now_playing();
                Ok(())
            }
            LifecycleAction::BeginInterruption { resume_after } => {
                let mut state = self.state.lock();
                state.interrupted = true;
                state.resume_after_interruption = resume_after;
                Ok(())
            }
            LifecycleAction::EndInterruption => {
                let mut state = self.state.lock();
                state.interrupted = false;
                state.resume_after_interruption = false;
                Ok(())
            }
            LifecycleAction::EmitAudioBecomingNoisy => {
                self.emit(CoreEvent::Playback(PlaybackEvent::AudioBecomingNoisy));
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(?action, error = %e, "Lifecycle action failed");
        }
    }

    // ========================================================================
    // Session and loader events
    // ========================================================================

    fn on_session_event(&self, event: &PlayerEvent) {
        if self.is_released() {
            return;
        }
        match event {
            PlayerEvent::RateChanged { rate } => self.on_rate_changed(*rate),
            PlayerEvent::PositionDiscontinuity { position_ms } => {
                let target = self.state.lock().seek_target.take().unwrap_or(*position_ms);
                self.emit(CoreEvent::Playback(PlaybackEvent::Seek {
                    current_time: ms_to_secs(*position_ms),
                    seek_time: ms_to_secs(target),
                }));
                if let Some(external) = &self.external {
                    external.notify_seek_completed(*position_ms);
                }
            }
            PlayerEvent::StatusChanged(ItemStatus::ReadyToPlay) => self.on_ready(),
            PlayerEvent::StatusChanged(ItemStatus::Failed(failure)) => {
                self.emit(CoreEvent::Load(LoadEvent::Error {
                    code: failure.code,
                    description: failure.description.clone(),
                    domain: failure.domain.clone(),
                }));
            }
            PlayerEvent::StatusChanged(ItemStatus::Unknown) => {}
            PlayerEvent::ReachedEnd => {
                self.emit(CoreEvent::Playback(PlaybackEvent::End));
                if let Some(ads) = &self.ads {
                    ads.notify_content_complete();
                }
            }
            PlayerEvent::BufferingChanged { is_buffering } => {
                self.emit(CoreEvent::Playback(PlaybackEvent::BufferingChanged {
                    is_buffering: *is_buffering,
                }));
            }
        }
    }

    fn on_rate_changed(&self, rate: f32) {
        let is_playing = rate > 0.0;
        if is_playing && self.session.intent() == PlayIntent::ExplicitPause {
            // Something other than the user resumed playback.
            info!(rate, "Re-pausing unwanted resume");
            if let Err(e) = self.session.pause() {
                warn!(error = %e, "Failed to re-pause");
            }
            return;
        }

        self.emit(CoreEvent::Playback(PlaybackEvent::StateChanged {
            is_playing,
            is_seeking: false,
        }));
        if let Some(external) = &self.external {
            external.notify_playback_state(is_playing, self.session.current_position(), rate);
        }
    }

    fn on_ready(&self) {
        let Some(item) = self.session.current_item() else {
            return;
        };
        self.emit(CoreEvent::Load(LoadEvent::Loaded {
            duration: item.finite_duration_secs(),
            natural_size: item.natural_size,
            audio_tracks: item.audio_tracks.clone(),
            text_tracks: item.text_tracks.clone(),
        }));

        let (text, audio) = {
            let state = self.state.lock();
            (state.text_track.clone(), state.audio_track.clone())
        };
        for (kind, selection) in [(TrackKind::Text, text), (TrackKind::Audio, audio)] {
            if let Some(selection) = selection {
                if let Err(e) = self.session.select_track(kind, &selection) {
                    warn!(?kind, error = %e, "Failed to re-apply track selection");
                }
            }
        }

        if let Some(external) = &self.external {
            external.notify_item_changed(item.source_id.as_deref());
        }
    }

    fn on_loader_event(&self, event: &LoaderEvent) {
        match event {
            LoaderEvent::Applied { .. } => {
                let ad_tag_url = self
                    .loader
                    .current_source()
                    .and_then(|source| source.ad_tag_url);
                {
                    let mut state = self.state.lock();
                    state.ad_tag_url = ad_tag_url;
                    state.ads_requested = false;
                    state.seek_target = None;
                }
                self.schedule_now_playing();
            }
            LoaderEvent::Cleared { .. } => {
                self.state.lock().ad_tag_url = None;
                if let Some(coordinator) = &self.coordinator {
                    coordinator.remove_player(self.session.id());
                }
            }
            LoaderEvent::Started { .. }
            | LoaderEvent::Failed { .. }
            | LoaderEvent::Superseded { .. } => {}
        }
    }

    // ========================================================================
    // Progress and ads
    // ========================================================================

    fn start_progress(self: &Arc<Self>) {
        let token = self.background.child_token();
        let previous = self.listeners.lock().progress.replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let period = self.config.lock().progress_update_interval();
        let weak = Arc::downgrade(self);
        if spawn_ticker(period, token, move || match weak.upgrade() {
            Some(controller) => {
                controller.report_progress();
                true
            }
            None => false,
        })
        .is_none()
        {
            warn!("No runtime available; progress events disabled");
        }
    }

    /// Emits one `progress` event when the item is ready.
    pub fn report_progress(&self) {
        if self.is_released() || !self.session.is_ready() {
            return;
        }
        let player = self.session.player();
        let duration = self
            .session
            .current_item()
            .map(|item| item.finite_duration_secs())
            .unwrap_or(0.0);
        let mut current_time = ms_to_secs(self.session.current_position());
        if duration > 0.0 {
            current_time = current_time.min(duration);
        }

        self.emit(CoreEvent::Playback(PlaybackEvent::Progress {
            current_time,
            playable_duration: finite_or_zero(player.playable_duration_secs()),
            seekable_duration: finite_or_zero(player.seekable_duration_secs()),
        }));
        self.maybe_request_ads(current_time);
    }

    fn maybe_request_ads(&self, current_time: f64) {
        let Some(ads) = &self.ads else {
            return;
        };
        let ad_tag_url = {
            let mut state = self.state.lock();
            if state.ads_requested || current_time <= AD_REQUEST_THRESHOLD_SECS {
                return;
            }
            match state.ad_tag_url.clone() {
                Some(url) => {
                    state.ads_requested = true;
                    url
                }
                None => return,
            }
        };
        info!("Requesting ads for current source");
        ads.request_ads(&ad_tag_url);
    }

    // ========================================================================
    // Now playing
    // ========================================================================

    /// Registers with the coordinator after the scheduling delay, when
    /// notification controls are shown.
    fn schedule_now_playing(&self) {
        let Some(coordinator) = self.coordinator.clone() else {
            return;
        };
        if !self.state.lock().show_notification_controls || self.is_released() {
            return;
        }

        let delay = self.config.lock().now_playing.scheduling_delay();
        let weak = self.weak_self.clone();
        self.now_playing.schedule(delay, move || {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            if controller.is_released() || !controller.state.lock().show_notification_controls {
                return;
            }
            let context: Weak<dyn NowPlayingContext> = controller.weak_self.clone();
            let outcome = coordinator.register_player(&controller.session, Some(context));
            trace!(?outcome, "Now-playing registration");
        });
    }

    fn listen_for_track_changes(&self) {
        let Some(coordinator) = &self.coordinator else {
            return;
        };
        let mut requests = coordinator.subscribe_track_changes();
        let weak = self.weak_self.clone();
        let token = self.background.clone();
        spawn_detached(async move {
            loop {
                let request = match select(Box::pin(token.cancelled()), Box::pin(requests.recv()))
                    .await
                {
                    Either::Left(_) => break,
                    Either::Right((Ok(request), _)) => request,
                    Either::Right((Err(RecvError::Lagged(missed)), _)) => {
                        warn!(missed, "Track change listener lagged");
                        continue;
                    }
                    Either::Right((Err(RecvError::Closed), _)) => break,
                };
                match weak.upgrade() {
                    Some(controller) => controller.on_track_change_request(request),
                    None => break,
                }
            }
        });
    }

    /// Track changes broadcast outside queue mode reach every view; only
    /// views registered for now-playing act on them.
    fn on_track_change_request(&self, request: TrackChangeRequest) {
        let registered = self
            .coordinator
            .as_ref()
            .is_some_and(|c| c.is_registered(self.session.id()));
        if !registered || self.is_released() {
            return;
        }
        let result = match request {
            TrackChangeRequest::Next => self.queue.advance(),
            TrackChangeRequest::Previous => self.queue.retreat(),
        };
        if let Err(e) = result {
            warn!(?request, error = %e, "Track change request failed");
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn session(&self) -> &Arc<PlaybackSession> {
        &self.session
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    pub fn queue(&self) -> &Arc<QueueController> {
        &self.queue
    }

    pub fn loader(&self) -> &Arc<SourceLoader> {
        &self.loader
    }

    pub fn fullscreen(&self) -> Option<&Arc<FullscreenPresentationController>> {
        self.fullscreen.as_ref()
    }

    /// A stream of this view's events.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.bus.subscribe())
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            Err(core_playback::PlaybackError::SessionReleased.into())
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: CoreEvent) {
        trace!(event = event.event_name(), "Emitting");
        let _ = self.bus.emit(event);
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Tears the view down. Idempotent.
    #[instrument(skip(self), fields(session_id = %self.session.id()))]
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        self.background.cancel();
        self.now_playing.cancel();
        let listeners = std::mem::take(&mut *self.listeners.lock());
        if let Some(progress) = listeners.progress {
            progress.cancel();
        }
        for handle in &listeners.session {
            self.session.unsubscribe(handle);
        }
        if let Some(subscription) = listeners.loader {
            self.loader.unsubscribe(subscription);
        }

        if let Some(fullscreen) = &self.fullscreen {
            if let Err(e) = fullscreen.dismiss().await {
                warn!(error = %e, "Fullscreen dismissal during release failed");
            }
        }

        if let Some(coordinator) = &self.coordinator {
            coordinator.remove_player(self.session.id());
        }

        self.queue.release();
        self.loader.release();

        if let Some(surface) = &self.surface {
            surface.detach(self.session.player().as_ref());
        }
        self.session.release();
        info!("Video controller released");
    }
}

impl NowPlayingContext for VideoController {
    fn is_queue_mode(&self) -> bool {
        self.queue.is_queue_mode()
    }

    fn request_next_track(&self) {
        if let Err(e) = self.queue.advance() {
            warn!(error = %e, "Queue advance from remote command failed");
        }
    }

    fn request_previous_track(&self) {
        if let Err(e) = self.queue.retreat() {
            warn!(error = %e, "Queue retreat from remote command failed");
        }
    }

    fn custom_metadata(&self) -> Option<CustomMetadata> {
        self.loader.current_source().and_then(|source| source.metadata)
    }
}

impl fmt::Debug for VideoController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoController")
            .field("session", &self.session.id())
            .field("queue_mode", &self.queue.is_queue_mode())
            .field("fullscreen", &self.fullscreen.is_some())
            .field("released", &self.is_released())
            .finish()
    }
}

fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
