//! Fakes for driving a [`VideoController`] end to end.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::host::{AdsController, EventSink};
use bridge_traits::lifecycle::{
    ChannelSignalStream, HostSignal, LifecycleChangeStream, LifecycleObserver, LifecycleState,
};
use bridge_traits::media::{PlayableItem, SelectedTrack, TrackKind};
use bridge_traits::now_playing::{
    CommandHandler, CommandStatus, CommandTargetId, NowPlayingInfo, NowPlayingSurface,
    RemoteCommand, RemoteCommandCenter, RemoteCommandEvent,
};
use bridge_traits::player::{ItemStatus, PlaybackFailure, PlayerEvent, PlayerHandle, PlayerListener};
use bridge_traits::presentation::{
    ControlKind, ControlVisibility, FullscreenChrome, PresentationHost, RenderSurface, ResizeMode,
};
use bridge_traits::source::{SourceDescriptor, SourcePreparer};
use core_async::sync::mpsc;
use core_async::task::yield_now;
use core_runtime::events::{CoreEvent, EventStream};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

pub async fn flush() {
    for _ in 0..16 {
        yield_now().await;
    }
}

pub fn source(id: &str) -> SourceDescriptor {
    SourceDescriptor::new(format!("https://cdn.example.com/{id}.m3u8")).with_id(id)
}

pub fn event_names(stream: &mut EventStream) -> Vec<&'static str> {
    stream.drain().iter().map(CoreEvent::event_name).collect()
}

// ============================================================================
// Player
// ============================================================================

#[derive(Default)]
pub struct FakePlayerState {
    pub rate: f32,
    pub position_ms: u64,
    pub status: ItemStatus,
    pub item: Option<PlayableItem>,
    pub muted: bool,
    pub volume: f32,
    pub released: bool,
    pub plays: usize,
    pub pauses: usize,
    pub seeks: Vec<u64>,
    pub selections: Vec<(TrackKind, SelectedTrack)>,
}

pub struct FakePlayer {
    pub state: Mutex<FakePlayerState>,
    listener: Mutex<Option<Arc<dyn PlayerListener>>>,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakePlayerState {
                volume: 1.0,
                ..Default::default()
            }),
            listener: Mutex::new(None),
        })
    }

    pub fn emit(&self, event: PlayerEvent) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener.on_player_event(event);
        }
    }

    pub fn fail(&self, failure: PlaybackFailure) {
        let status = ItemStatus::Failed(failure);
        self.state.lock().status = status.clone();
        self.emit(PlayerEvent::StatusChanged(status));
    }

    pub fn advance(&self, ms: u64) {
        self.state.lock().position_ms += ms;
    }

    pub fn external_rate(&self, rate: f32) {
        self.state.lock().rate = rate;
        self.emit(PlayerEvent::RateChanged { rate });
    }

    pub fn reach_end(&self) {
        self.state.lock().rate = 0.0;
        self.emit(PlayerEvent::ReachedEnd);
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().is_some()
    }

    pub fn rate_now(&self) -> f32 {
        self.state.lock().rate
    }

    pub fn position_now(&self) -> u64 {
        self.state.lock().position_ms
    }
}

impl PlayerHandle for FakePlayer {
    fn play(&self) -> BridgeResult<()> {
        {
            let mut state = self.state.lock();
            state.plays += 1;
            state.rate = 1.0;
        }
        self.emit(PlayerEvent::RateChanged { rate: 1.0 });
        Ok(())
    }

    fn pause(&self) -> BridgeResult<()> {
        {
            let mut state = self.state.lock();
            state.pauses += 1;
            state.rate = 0.0;
        }
        self.emit(PlayerEvent::RateChanged { rate: 0.0 });
        Ok(())
    }

    fn seek(&self, position_ms: u64, _tolerance_ms: u64) -> BridgeResult<()> {
        {
            let mut state = self.state.lock();
            if state.released {
                return Err(BridgeError::Released("seek".to_string()));
            }
            state.seeks.push(position_ms);
            state.position_ms = position_ms;
        }
        self.emit(PlayerEvent::PositionDiscontinuity { position_ms });
        Ok(())
    }

    fn set_rate(&self, rate: f32) -> BridgeResult<()> {
        self.state.lock().rate = rate;
        self.emit(PlayerEvent::RateChanged { rate });
        Ok(())
    }

    fn rate(&self) -> f32 {
        self.state.lock().rate
    }

    fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        self.state.lock().volume = volume;
        Ok(())
    }

    fn set_muted(&self, muted: bool) -> BridgeResult<()> {
        self.state.lock().muted = muted;
        Ok(())
    }

    fn current_time_secs(&self) -> f64 {
        self.state.lock().position_ms as f64 / 1000.0
    }

    fn playable_duration_secs(&self) -> f64 {
        self.state
            .lock()
            .item
            .as_ref()
            .map_or(0.0, PlayableItem::finite_duration_secs)
    }

    fn status(&self) -> ItemStatus {
        self.state.lock().status.clone()
    }

    fn replace_item(&self, item: Option<PlayableItem>) -> BridgeResult<()> {
        let ready = {
            let mut state = self.state.lock();
            state.position_ms = 0;
            state.status = if item.is_some() {
                ItemStatus::ReadyToPlay
            } else {
                ItemStatus::Unknown
            };
            let ready = item.is_some();
            state.item = item;
            ready
        };
        if ready {
            self.emit(PlayerEvent::StatusChanged(ItemStatus::ReadyToPlay));
        }
        Ok(())
    }

    fn select_track(&self, kind: TrackKind, selection: &SelectedTrack) -> BridgeResult<()> {
        self.state.lock().selections.push((kind, selection.clone()));
        Ok(())
    }

    fn set_listener(&self, listener: Option<Arc<dyn PlayerListener>>) {
        *self.listener.lock() = listener;
    }

    fn release(&self) {
        self.state.lock().released = true;
    }
}

// ============================================================================
// Host bridges
// ============================================================================

#[derive(Default)]
pub struct InstantPreparer;

#[async_trait]
impl SourcePreparer for InstantPreparer {
    async fn prepare(&self, source: &SourceDescriptor) -> BridgeResult<PlayableItem> {
        let uri = source.uri.clone().unwrap_or_default();
        let id = source.id.clone().unwrap_or_else(|| uri.clone());
        Ok(PlayableItem::new(id, uri)
            .with_duration(120.0)
            .with_natural_size(1920.0, 1080.0))
    }
}

/// Sink recording `(name, payload)` pairs as the host would receive them.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<(String, Value)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn last_payload(&self, name: &str) -> Option<Value> {
        self.events
            .lock()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, payload)| payload.clone())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, name: &str, payload: Value) {
        self.events.lock().push((name.to_string(), payload));
    }
}

#[derive(Default)]
pub struct RecordingAds {
    pub requests: Mutex<Vec<String>>,
    pub completions: AtomicUsize,
}

impl RecordingAds {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl AdsController for RecordingAds {
    fn request_ads(&self, ad_tag_url: &str) {
        self.requests.lock().push(ad_tag_url.to_string());
    }

    fn notify_content_complete(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingRenderSurface {
    pub attaches: AtomicUsize,
    pub detaches: AtomicUsize,
    pub resize_modes: Mutex<Vec<ResizeMode>>,
}

impl RecordingRenderSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl RenderSurface for RecordingRenderSurface {
    fn attach(&self, _player: &dyn PlayerHandle) {
        self.attaches.fetch_add(1, Ordering::SeqCst);
    }

    fn detach(&self, _player: &dyn PlayerHandle) {
        self.detaches.fetch_add(1, Ordering::SeqCst);
    }

    fn set_resize_mode(&self, mode: ResizeMode) {
        self.resize_modes.lock().push(mode);
    }
}

// ============================================================================
// Now playing
// ============================================================================

#[derive(Default)]
pub struct RecordingSurface {
    pub published: Mutex<Vec<NowPlayingInfo>>,
    pub clears: AtomicUsize,
    pub receiving: AtomicBool,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl NowPlayingSurface for RecordingSurface {
    fn publish(&self, info: NowPlayingInfo) {
        self.published.lock().push(info);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn set_receiving_remote_events(&self, enabled: bool) {
        self.receiving.store(enabled, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingCommandCenter {
    handlers: Mutex<HashMap<RemoteCommand, Vec<(CommandTargetId, CommandHandler)>>>,
    next_id: AtomicU64,
}

impl RecordingCommandCenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dispatch(&self, event: RemoteCommandEvent) -> CommandStatus {
        let handler = self
            .handlers
            .lock()
            .get(&event.command())
            .and_then(|targets| targets.last().map(|(_, h)| Arc::clone(h)));
        match handler {
            Some(handler) => handler(&event),
            None => CommandStatus::CommandFailed,
        }
    }
}

impl RemoteCommandCenter for RecordingCommandCenter {
    fn add_target(&self, command: RemoteCommand, handler: CommandHandler) -> CommandTargetId {
        let id = CommandTargetId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers
            .lock()
            .entry(command)
            .or_default()
            .push((id, handler));
        id
    }

    fn remove_target(&self, command: RemoteCommand, target: CommandTargetId) {
        if let Some(targets) = self.handlers.lock().get_mut(&command) {
            targets.retain(|(id, _)| *id != target);
        }
    }

    fn set_enabled(&self, _command: RemoteCommand, _enabled: bool) {}
}

// ============================================================================
// Presentation
// ============================================================================

#[derive(Default)]
pub struct FakePresentationHost {
    pub mirrors: Mutex<Vec<Arc<FakePlayer>>>,
    pub controls: Mutex<Vec<Vec<(ControlKind, ControlVisibility)>>>,
    pub presents: AtomicUsize,
    pub dismisses: AtomicUsize,
}

impl FakePresentationHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl PresentationHost for FakePresentationHost {
    async fn create_mirror_player(
        &self,
        _item: &PlayableItem,
    ) -> BridgeResult<Arc<dyn PlayerHandle>> {
        let player = FakePlayer::new();
        self.mirrors.lock().push(Arc::clone(&player));
        Ok(player)
    }

    fn apply_controls(
        &self,
        controls: &[(ControlKind, ControlVisibility)],
        _chrome: &FullscreenChrome,
    ) {
        self.controls.lock().push(controls.to_vec());
    }

    async fn present(&self) -> BridgeResult<()> {
        self.presents.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dismiss(&self) -> BridgeResult<()> {
        self.dismisses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Observer handing out one channel-fed stream.
pub struct ChannelObserver {
    stream: Mutex<Option<ChannelSignalStream>>,
}

impl ChannelObserver {
    pub fn new() -> (mpsc::UnboundedSender<HostSignal>, Arc<Self>) {
        let (sender, stream) = ChannelSignalStream::channel();
        (
            sender,
            Arc::new(Self {
                stream: Mutex::new(Some(stream)),
            }),
        )
    }
}

#[async_trait]
impl LifecycleObserver for ChannelObserver {
    async fn get_state(&self) -> BridgeResult<LifecycleState> {
        Ok(LifecycleState::Active)
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn LifecycleChangeStream>> {
        self.stream
            .lock()
            .take()
            .map(|stream| Box::new(stream) as Box<dyn LifecycleChangeStream>)
            .ok_or_else(|| BridgeError::NotAvailable("already subscribed".to_string()))
    }
}
