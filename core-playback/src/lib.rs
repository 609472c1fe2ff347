//! # Playback Core
//!
//! State synchronization and session coordination for video playback.
//!
//! ## Overview
//!
//! - [`session::PlaybackSession`]: one player handle plus its observable state
//! - [`source::SourceLoader`]: the `setSrc` pipeline with last-write-wins
//!   supersession of stale preparations
//! - [`queue::QueueController`]: ordered playback through a list of sources
//! - [`sync::StateSynchronizer`]: keeps a mirror session aligned with a
//!   primary session
//! - [`fullscreen::FullscreenPresentationController`]: fullscreen mirror
//!   lifecycle on top of the synchronizer
//! - [`now_playing::NowPlayingCoordinator`]: the system now-playing entry
//!   and remote commands
//! - [`external::ExternalServiceRegistry`]: external media services kept
//!   informed of playback
//!
//! Components never own each other's sessions. Observers they add are
//! removed before the owning controller releases a session.

pub mod config;
pub mod controls;
pub mod error;
pub mod external;
pub mod fullscreen;
pub mod now_playing;
pub mod queue;
pub mod session;
pub mod source;
pub mod sync;

pub use config::{NowPlayingConfig, PlaybackConfig, QueueConfig, SyncConfig};
pub use controls::ControlsConfig;
pub use error::{PlaybackError, Result};
pub use external::ExternalServiceRegistry;
pub use fullscreen::{FullscreenPresentationController, PresentationState};
pub use now_playing::{NowPlayingContext, NowPlayingCoordinator, TrackChangeRequest};
pub use queue::{NavigationOutcome, QueueController, QueuePhase, QueueSnapshot};
pub use session::{PlayIntent, PlaybackSession, SessionEventKind, SessionId};
pub use source::{LoadTicket, LoaderEvent, SourceLoader};
pub use sync::{StateSynchronizer, SyncOutcome};
