//! The underlying player handle.
//!
//! A [`PlayerHandle`] is the platform media player (hardware pipeline on one
//! platform, system framework on the other). The core wraps each handle in
//! exactly one playback session, which owns it until release.
//!
//! Handles report state changes to a single [`PlayerListener`]. Events from
//! one handle must be delivered in the order they occurred, and must not be
//! delivered while the handle holds internal locks: the listener may call
//! straight back into the handle.

use std::sync::Arc;

use crate::{
    error::Result,
    media::{PlayableItem, SelectedTrack, TrackKind},
    platform::PlatformSendSync,
};

/// Failure details reported by the platform for a failed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFailure {
    pub code: i64,
    pub description: String,
    pub domain: Option<String>,
}

impl PlaybackFailure {
    pub fn new(code: i64, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Readiness of the current item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemStatus {
    #[default]
    Unknown,
    ReadyToPlay,
    Failed(PlaybackFailure),
}

impl ItemStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ItemStatus::ReadyToPlay)
    }
}

/// State changes observed on a player handle.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    RateChanged { rate: f32 },
    /// Position jumped (seek completed, item restarted).
    PositionDiscontinuity { position_ms: u64 },
    StatusChanged(ItemStatus),
    ReachedEnd,
    BufferingChanged { is_buffering: bool },
}

/// Receives events from a player handle.
pub trait PlayerListener: PlatformSendSync {
    fn on_player_event(&self, event: PlayerEvent);
}

/// Platform media player.
///
/// Mutators are fire-and-forget: the resulting state change is reported
/// through the listener.
pub trait PlayerHandle: PlatformSendSync {
    fn play(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    /// Seeks to `position_ms`, accepting up to `tolerance_ms` of imprecision
    /// in either direction.
    fn seek(&self, position_ms: u64, tolerance_ms: u64) -> Result<()>;

    fn set_rate(&self, rate: f32) -> Result<()>;

    /// Current playback rate; `0.0` while paused or stalled.
    fn rate(&self) -> f32;

    fn set_volume(&self, volume: f32) -> Result<()>;

    fn set_muted(&self, muted: bool) -> Result<()>;

    /// Current position in seconds. May be NaN before the item is ready.
    fn current_time_secs(&self) -> f64;

    /// End of the buffered range, in seconds.
    fn playable_duration_secs(&self) -> f64 {
        0.0
    }

    /// End of the seekable range, in seconds.
    fn seekable_duration_secs(&self) -> f64 {
        0.0
    }

    fn status(&self) -> ItemStatus;

    /// Replaces the current item in place. `None` unloads.
    fn replace_item(&self, item: Option<PlayableItem>) -> Result<()>;

    fn select_track(&self, _kind: TrackKind, _selection: &SelectedTrack) -> Result<()> {
        Ok(())
    }

    /// `true` while output is routed to an external display (AirPlay-style).
    fn is_external_playback_active(&self) -> bool {
        false
    }

    /// Installs or removes the single event listener.
    fn set_listener(&self, listener: Option<Arc<dyn PlayerListener>>);

    /// Releases the platform resources. Subsequent calls are no-ops.
    fn release(&self);
}
