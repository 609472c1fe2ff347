//! # Event Bus System
//!
//! Typed notifications from the playback core towards the application layer,
//! carried over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps one enum per domain (load,
//!   playback, queue, fullscreen).
//! - **EventBus**: broadcast channel owned by one view controller.
//! - **EventStream**: receiver wrapper with optional filtering.
//! - **Sink forwarding**: [`forward_to_sink`] drains a bus into a host
//!   [`EventSink`], converting each event to its wire name and JSON payload.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  emit   ┌───────────┐  subscribe  ┌────────────────┐
//! │ SourceLoader ├────────>│           ├────────────>│ forward_to_sink├──> EventSink
//! └──────────────┘         │ EventBus  │             └────────────────┘
//! ┌──────────────┐  emit   │ (broadcast│  subscribe  ┌────────────────┐
//! │ Queue / View ├────────>│  channel) ├────────────>│  test / host   │
//! └──────────────┘         └───────────┘             └────────────────┘
//! ```
//!
//! Events from one bus are delivered to each subscriber in emission order.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//! bus.emit(CoreEvent::Queue(QueueEvent::NextTrack {
//!     queue_index: Some(1),
//!     source_id: Some("ep-2".to_string()),
//!     native_handled: true,
//! }))
//! .ok();
//!
//! let event = rx.try_recv().unwrap();
//! assert_eq!(event.event_name(), "nextTrack");
//! assert_eq!(event.payload()["queueIndex"], 1);
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped; the owner shut down.

use bridge_traits::host::EventSink;
use bridge_traits::media::{NaturalSize, TrackInfo};
use core_async::sync::broadcast;
use core_async::task::JoinHandle;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

// Re-export commonly used types
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// A progress event every 250ms plus state changes stays well below this.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Source loading and item readiness
    Load(LoadEvent),
    /// Play state, position and buffering
    Playback(PlaybackEvent),
    /// Queue navigation
    Queue(QueueEvent),
    /// Fullscreen presentation transitions
    Fullscreen(FullscreenEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Load(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Fullscreen(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Load(LoadEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::AudioBecomingNoisy) => EventSeverity::Warning,
            CoreEvent::Load(LoadEvent::Loaded { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::End) => EventSeverity::Info,
            CoreEvent::Queue(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Name under which the event is delivered to the application layer.
    pub fn event_name(&self) -> &'static str {
        match self {
            CoreEvent::Load(LoadEvent::LoadStart { .. }) => "loadStart",
            CoreEvent::Load(LoadEvent::Loaded { .. }) => "load",
            CoreEvent::Load(LoadEvent::Error { .. }) => "error",
            CoreEvent::Playback(PlaybackEvent::Progress { .. }) => "progress",
            CoreEvent::Playback(PlaybackEvent::Seek { .. }) => "seek",
            CoreEvent::Playback(PlaybackEvent::End) => "end",
            CoreEvent::Playback(PlaybackEvent::BufferingChanged { .. }) => "bufferingChanged",
            CoreEvent::Playback(PlaybackEvent::StateChanged { .. }) => "playbackStateChanged",
            CoreEvent::Playback(PlaybackEvent::AudioBecomingNoisy) => "audioBecomingNoisy",
            CoreEvent::Queue(QueueEvent::NextTrack { .. }) => "nextTrack",
            CoreEvent::Queue(QueueEvent::PreviousTrack { .. }) => "previousTrack",
            CoreEvent::Fullscreen(FullscreenEvent::WillPresent) => "fullscreenWillPresent",
            CoreEvent::Fullscreen(FullscreenEvent::DidPresent) => "fullscreenDidPresent",
            CoreEvent::Fullscreen(FullscreenEvent::WillDismiss) => "fullscreenWillDismiss",
            CoreEvent::Fullscreen(FullscreenEvent::DidDismiss) => "fullscreenDidDismiss",
        }
    }

    /// Payload delivered with [`event_name`](Self::event_name), with
    /// camelCase keys.
    pub fn payload(&self) -> Value {
        match self {
            CoreEvent::Load(e) => e.payload(),
            CoreEvent::Playback(e) => e.payload(),
            CoreEvent::Queue(e) => e.payload(),
            CoreEvent::Fullscreen(_) => json!({}),
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Load Events
// ============================================================================

/// Summary of the source being loaded, as reported in `loadStart`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSummary {
    pub uri: String,
    pub id: Option<String>,
    pub kind: Option<String>,
    pub is_network: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum LoadEvent {
    /// Preparation of a new source began.
    LoadStart { src: SourceSummary },
    /// The item became ready to play.
    Loaded {
        /// Seconds, 0 when unknown.
        duration: f64,
        natural_size: NaturalSize,
        audio_tracks: Vec<TrackInfo>,
        text_tracks: Vec<TrackInfo>,
    },
    /// Loading or playback failed.
    Error {
        code: i64,
        description: String,
        domain: Option<String>,
    },
}

impl LoadEvent {
    fn description(&self) -> &str {
        match self {
            LoadEvent::LoadStart { .. } => "Source load started",
            LoadEvent::Loaded { .. } => "Item ready to play",
            LoadEvent::Error { .. } => "Playback error",
        }
    }

    fn payload(&self) -> Value {
        match self {
            LoadEvent::LoadStart { src } => json!({
                "src": {
                    "uri": src.uri,
                    "id": src.id,
                    "type": src.kind,
                    "isNetwork": src.is_network,
                }
            }),
            LoadEvent::Loaded {
                duration,
                natural_size,
                audio_tracks,
                text_tracks,
            } => json!({
                "duration": duration,
                "naturalSize": {
                    "width": natural_size.width,
                    "height": natural_size.height,
                    "orientation": natural_size.orientation(),
                },
                "audioTracks": audio_tracks,
                "textTracks": text_tracks,
            }),
            LoadEvent::Error {
                code,
                description,
                domain,
            } => {
                let mut payload = json!({ "code": code, "description": description });
                if let Some(domain) = domain {
                    payload["domain"] = json!(domain);
                }
                payload
            }
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Periodic position report. All values in seconds.
    Progress {
        current_time: f64,
        playable_duration: f64,
        seekable_duration: f64,
    },
    /// A seek completed. Both values in seconds.
    Seek { current_time: f64, seek_time: f64 },
    /// The item played to its end.
    End,
    BufferingChanged { is_buffering: bool },
    StateChanged { is_playing: bool, is_seeking: bool },
    /// The output route disappeared (headphones unplugged).
    AudioBecomingNoisy,
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Progress { .. } => "Playback progress",
            PlaybackEvent::Seek { .. } => "Seek completed",
            PlaybackEvent::End => "Playback reached end",
            PlaybackEvent::BufferingChanged { .. } => "Buffering state changed",
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::AudioBecomingNoisy => "Audio becoming noisy",
        }
    }

    fn payload(&self) -> Value {
        match self {
            PlaybackEvent::Progress {
                current_time,
                playable_duration,
                seekable_duration,
            } => json!({
                "currentTime": current_time,
                "playableDuration": playable_duration,
                "seekableDuration": seekable_duration,
            }),
            PlaybackEvent::Seek {
                current_time,
                seek_time,
            } => json!({ "currentTime": current_time, "seekTime": seek_time }),
            PlaybackEvent::BufferingChanged { is_buffering } => {
                json!({ "isBuffering": is_buffering })
            }
            PlaybackEvent::StateChanged {
                is_playing,
                is_seeking,
            } => json!({ "isPlaying": is_playing, "isSeeking": is_seeking }),
            PlaybackEvent::End | PlaybackEvent::AudioBecomingNoisy => json!({}),
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// `native_handled` is false when the host must perform the change
    /// itself because queue mode is inactive; index and source are then
    /// absent.
    NextTrack {
        queue_index: Option<usize>,
        source_id: Option<String>,
        native_handled: bool,
    },
    PreviousTrack {
        queue_index: Option<usize>,
        source_id: Option<String>,
        native_handled: bool,
    },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::NextTrack { .. } => "Next track",
            QueueEvent::PreviousTrack { .. } => "Previous track",
        }
    }

    fn payload(&self) -> Value {
        match self {
            QueueEvent::NextTrack {
                queue_index,
                source_id,
                native_handled,
            }
            | QueueEvent::PreviousTrack {
                queue_index,
                source_id,
                native_handled,
            } => json!({
                "queueIndex": queue_index,
                "sourceId": source_id,
                "nativeHandled": native_handled,
            }),
        }
    }
}

// ============================================================================
// Fullscreen Events
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum FullscreenEvent {
    WillPresent,
    DidPresent,
    WillDismiss,
    DidDismiss,
}

impl FullscreenEvent {
    fn description(&self) -> &str {
        match self {
            FullscreenEvent::WillPresent => "Fullscreen will present",
            FullscreenEvent::DidPresent => "Fullscreen did present",
            FullscreenEvent::WillDismiss => "Fullscreen will dismiss",
            FullscreenEvent::DidDismiss => "Fullscreen did dismiss",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; all clones feed the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers falling more than `capacity` events behind receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none. Emitters generally ignore that error.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()` and
    /// `try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every currently buffered matching event.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Sink Forwarding
// ============================================================================

/// Spawns a task that forwards every event of `bus` to `sink` as
/// `(event_name, payload)`.
///
/// The subscription is taken before this function returns, so events emitted
/// afterwards are never missed. The task ends when every sender of the bus
/// is dropped.
pub fn forward_to_sink(bus: &EventBus, sink: Arc<dyn EventSink>) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();
    core_async::task::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    debug!(event = event.event_name(), "Forwarding event to sink");
                    sink.emit(event.event_name(), event.payload());
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event sink forwarder lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
