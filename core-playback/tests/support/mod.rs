//! Stateful fakes shared by the playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::media::PlayableItem;
use bridge_traits::now_playing::{
    CommandHandler, CommandStatus, CommandTargetId, NowPlayingInfo, NowPlayingSurface,
    RemoteCommand, RemoteCommandCenter, RemoteCommandEvent,
};
use bridge_traits::player::{ItemStatus, PlaybackFailure, PlayerEvent, PlayerHandle, PlayerListener};
use bridge_traits::presentation::{
    ControlKind, ControlVisibility, FullscreenChrome, PresentationHost,
};
use bridge_traits::source::{CustomMetadata, SourceDescriptor, SourcePreparer};
use core_async::sync::{oneshot, Notify};
use core_async::task::yield_now;
use core_playback::now_playing::NowPlayingContext;
use core_runtime::events::{CoreEvent, EventStream};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Lets spawned tasks and detached preparations run to completion.
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
    pub loads: Vec<Option<String>>,
}

/// Player handle emitting events synchronously, like a platform player
/// delivering on the coordination thread.
pub struct FakePlayer {
    pub state: Mutex<FakePlayerState>,
    listener: Mutex<Option<Arc<dyn PlayerListener>>>,
    auto_ready: bool,
}

impl FakePlayer {
    /// Items become ready as soon as they are loaded.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakePlayerState {
                volume: 1.0,
                ..Default::default()
            }),
            listener: Mutex::new(None),
            auto_ready: true,
        })
    }

    /// Items stay in `Unknown` status until [`make_ready`](Self::make_ready).
    pub fn manual() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakePlayerState {
                volume: 1.0,
                ..Default::default()
            }),
            listener: Mutex::new(None),
            auto_ready: false,
        })
    }

    pub fn emit(&self, event: PlayerEvent) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener.on_player_event(event);
        }
    }

    pub fn make_ready(&self) {
        self.state.lock().status = ItemStatus::ReadyToPlay;
        self.emit(PlayerEvent::StatusChanged(ItemStatus::ReadyToPlay));
    }

    pub fn fail(&self, code: i64, description: &str) {
        let status = ItemStatus::Failed(PlaybackFailure::new(code, description));
        self.state.lock().status = status.clone();
        self.emit(PlayerEvent::StatusChanged(status));
    }

    /// Simulates playback progress without a discontinuity.
    pub fn advance(&self, ms: u64) {
        self.state.lock().position_ms += ms;
    }

    /// Simulates a rate change not requested through the handle.
    pub fn external_rate(&self, rate: f32) {
        self.state.lock().rate = rate;
        self.emit(PlayerEvent::RateChanged { rate });
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
            state.loads.push(item.as_ref().map(|i| i.id.clone()));
            state.position_ms = 0;
            state.status = ItemStatus::Unknown;
            let ready = self.auto_ready && item.is_some();
            state.item = item;
            ready
        };
        if ready {
            self.make_ready();
        }
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
// Source preparation
// ============================================================================

/// Preparer returning immediately.
#[derive(Default)]
pub struct InstantPreparer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SourcePreparer for InstantPreparer {
    async fn prepare(&self, source: &SourceDescriptor) -> BridgeResult<PlayableItem> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let uri = source.uri.clone().unwrap_or_default();
        let id = source.id.clone().unwrap_or_else(|| uri.clone());
        Ok(PlayableItem::new(id, uri).with_duration(120.0))
    }
}

type Gate = oneshot::Sender<BridgeResult<PlayableItem>>;

/// Preparer whose calls complete only when the test releases them.
#[derive(Default)]
pub struct GatedPreparer {
    gates: Mutex<Vec<(String, Gate)>>,
    pub started: Mutex<Vec<String>>,
}

impl GatedPreparer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn take(&self, id: &str) -> Gate {
        let mut gates = self.gates.lock();
        let index = gates
            .iter()
            .position(|(gate_id, _)| gate_id == id)
            .unwrap_or_else(|| panic!("no preparation pending for {id}"));
        gates.remove(index).1
    }

    pub fn complete(&self, id: &str) {
        let item = PlayableItem::new(id, format!("https://cdn.example.com/{id}.m3u8"))
            .with_duration(120.0);
        let _ = self.take(id).send(Ok(item));
    }

    pub fn fail(&self, id: &str, message: &str) {
        let _ = self
            .take(id)
            .send(Err(BridgeError::OperationFailed(message.to_string())));
    }

    pub fn pending(&self) -> Vec<String> {
        self.gates.lock().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl SourcePreparer for GatedPreparer {
    async fn prepare(&self, source: &SourceDescriptor) -> BridgeResult<PlayableItem> {
        let id = source.identifier().unwrap_or_default().to_string();
        let (tx, rx) = oneshot::channel();
        self.started.lock().push(id.clone());
        self.gates.lock().push((id, tx));
        rx.await
            .unwrap_or_else(|_| Err(BridgeError::OperationFailed("gate dropped".to_string())))
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

    pub fn publish_count(&self) -> usize {
        self.published.lock().len()
    }

    pub fn last(&self) -> Option<NowPlayingInfo> {
        self.published.lock().last().cloned()
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

/// Command center that keeps handlers so tests can dispatch commands.
#[derive(Default)]
pub struct RecordingCommandCenter {
    handlers: Mutex<HashMap<RemoteCommand, Vec<(CommandTargetId, CommandHandler)>>>,
    enabled: Mutex<HashMap<RemoteCommand, bool>>,
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

    pub fn target_count(&self) -> usize {
        self.handlers.lock().values().map(Vec::len).sum()
    }

    pub fn is_enabled(&self, command: RemoteCommand) -> bool {
        self.enabled.lock().get(&command).copied().unwrap_or(false)
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

    fn set_enabled(&self, command: RemoteCommand, enabled: bool) {
        self.enabled.lock().insert(command, enabled);
    }
}

#[derive(Default)]
pub struct FakeContext {
    pub queue_mode: AtomicBool,
    pub next_requests: AtomicUsize,
    pub previous_requests: AtomicUsize,
    pub custom: Mutex<Option<CustomMetadata>>,
}

impl FakeContext {
    pub fn new(queue_mode: bool) -> Arc<Self> {
        let context = Self::default();
        context.queue_mode.store(queue_mode, Ordering::SeqCst);
        Arc::new(context)
    }
}

impl NowPlayingContext for FakeContext {
    fn is_queue_mode(&self) -> bool {
        self.queue_mode.load(Ordering::SeqCst)
    }

    fn request_next_track(&self) {
        self.next_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn request_previous_track(&self) {
        self.previous_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn custom_metadata(&self) -> Option<CustomMetadata> {
        self.custom.lock().clone()
    }
}

// ============================================================================
// Presentation
// ============================================================================

#[derive(Default)]
pub struct FakePresentationHost {
    pub mirrors: Mutex<Vec<Arc<FakePlayer>>>,
    pub controls: Mutex<Vec<Vec<(ControlKind, ControlVisibility)>>>,
    pub chrome: Mutex<Option<FullscreenChrome>>,
    pub presents: AtomicUsize,
    pub dismisses: AtomicUsize,
    hold_creation: AtomicBool,
    creation_gate: Notify,
    pub fail_creation: AtomicBool,
}

impl FakePresentationHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next mirror creation wait for [`release_creation`](Self::release_creation).
    pub fn hold_creation(&self) {
        self.hold_creation.store(true, Ordering::SeqCst);
    }

    pub fn release_creation(&self) {
        self.hold_creation.store(false, Ordering::SeqCst);
        self.creation_gate.notify_one();
    }

    pub fn mirror(&self, index: usize) -> Arc<FakePlayer> {
        Arc::clone(&self.mirrors.lock()[index])
    }

    pub fn mirror_count(&self) -> usize {
        self.mirrors.lock().len()
    }
}

#[async_trait]
impl PresentationHost for FakePresentationHost {
    async fn create_mirror_player(
        &self,
        _item: &PlayableItem,
    ) -> BridgeResult<Arc<dyn PlayerHandle>> {
        if self.hold_creation.load(Ordering::SeqCst) {
            self.creation_gate.notified().await;
        }
        if self.fail_creation.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("mirror".to_string()));
        }
        let player = FakePlayer::new();
        self.mirrors.lock().push(Arc::clone(&player));
        Ok(player)
    }

    fn apply_controls(
        &self,
        controls: &[(ControlKind, ControlVisibility)],
        chrome: &FullscreenChrome,
    ) {
        self.controls.lock().push(controls.to_vec());
        *self.chrome.lock() = Some(chrome.clone());
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
