//! # Host Bridge Traits
//!
//! Platform capabilities the video playback core consumes.
//!
//! ## Overview
//!
//! The core decides *when* players play, seek, present fullscreen and publish
//! now-playing metadata. Everything that touches a platform framework is
//! behind a trait defined here and implemented once per host (iOS, Android).
//!
//! ## Traits
//!
//! ### Playback
//! - [`PlayerHandle`](player::PlayerHandle) - The underlying media player
//! - [`SourcePreparer`](source::SourcePreparer) - Asset resolution, DRM, caching
//!
//! ### View Integration
//! - [`RenderSurface`](presentation::RenderSurface) - Attach/detach a player to a view
//! - [`PresentationHost`](presentation::PresentationHost) - Fullscreen mirror player and transitions
//!
//! ### System Integration
//! - [`NowPlayingSurface`](now_playing::NowPlayingSurface) - Lock-screen entry
//! - [`RemoteCommandCenter`](now_playing::RemoteCommandCenter) - Remote control commands
//! - [`LifecycleObserver`](lifecycle::LifecycleObserver) - App lifecycle and audio session signals
//! - [`ExternalMediaService`](external::ExternalMediaService) - Casting and companion integrations
//!
//! ### Outbound
//! - [`EventSink`](host::EventSink) - Named events towards the application layer
//! - [`AdsController`](host::AdsController) - Advertising insertion
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a capability required by
//! an enabled feature is missing:
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .source_preparer(preparer)
//!     .enable_now_playing(true) // requires a surface and a command center
//!     .build()?;                // -> Error::CapabilityMissing
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`. Callbacks may arrive on platform
//! threads outside any async runtime.

pub mod error;
pub mod external;
pub mod host;
pub mod lifecycle;
pub mod log;
pub mod media;
pub mod now_playing;
pub mod platform;
pub mod player;
pub mod presentation;
pub mod source;

pub use error::BridgeError;

// Re-export commonly used types
pub use external::{ExternalCapabilities, ExternalMediaService};
pub use host::{AdsController, EventSink};
pub use lifecycle::{
    AudioSessionEvent, HostSignal, LifecycleChangeStream, LifecycleEvent, LifecycleObserver,
    LifecycleState,
};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{
    MetadataItem, MetadataKey, MetadataValue, NaturalSize, PlayableItem, SelectedTrack, TrackInfo,
    TrackKind,
};
pub use now_playing::{
    Artwork, CommandHandler, CommandStatus, CommandTargetId, NowPlayingInfo, NowPlayingSurface,
    RemoteCommand, RemoteCommandCenter, RemoteCommandEvent,
};
pub use player::{ItemStatus, PlaybackFailure, PlayerEvent, PlayerHandle, PlayerListener};
pub use presentation::{
    ControlKind, ControlVisibility, FullscreenChrome, Orientation, PresentationHost,
    RenderSurface, ResizeMode,
};
pub use source::{CustomMetadata, SourceDescriptor, SourcePreparer};
