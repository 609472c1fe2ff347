//! System now-playing surface and remote command center.
//!
//! The now-playing surface is the lock-screen / control-center entry. The
//! remote command center delivers hardware and lock-screen commands; each
//! handler must answer synchronously.

use bytes::Bytes;
use std::sync::Arc;

use crate::platform::PlatformSendSync;

pub const DEFAULT_TITLE: &str = "Unknown Title";
pub const DEFAULT_ARTIST: &str = "Unknown Artist";

/// Artwork shown next to the now-playing entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Artwork {
    /// Decoded and validated image bytes.
    Image { data: Bytes, width: u32, height: u32 },
    /// Image the platform should fetch itself.
    Remote { uri: String },
    #[default]
    Placeholder,
}

/// One complete now-playing publication.
///
/// Published as a single value so the surface never shows a partial update.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingInfo {
    pub title: String,
    pub artist: String,
    pub artwork: Artwork,
    pub duration_secs: f64,
    pub elapsed_secs: f64,
    pub rate: f32,
    pub is_live: bool,
}

impl Default for NowPlayingInfo {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            artist: DEFAULT_ARTIST.to_string(),
            artwork: Artwork::Placeholder,
            duration_secs: 0.0,
            elapsed_secs: 0.0,
            rate: 0.0,
            is_live: false,
        }
    }
}

pub trait NowPlayingSurface: PlatformSendSync {
    fn publish(&self, info: NowPlayingInfo);

    fn clear(&self);

    fn set_receiving_remote_events(&self, enabled: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
    Play,
    Pause,
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    ChangePlaybackPosition,
}

impl RemoteCommand {
    pub const ALL: [RemoteCommand; 6] = [
        RemoteCommand::Play,
        RemoteCommand::Pause,
        RemoteCommand::TogglePlayPause,
        RemoteCommand::NextTrack,
        RemoteCommand::PreviousTrack,
        RemoteCommand::ChangePlaybackPosition,
    ];
}

/// A delivered remote command with its arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommandEvent {
    Play,
    Pause,
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    ChangePlaybackPosition { position_secs: f64 },
}

impl RemoteCommandEvent {
    pub fn command(&self) -> RemoteCommand {
        match self {
            RemoteCommandEvent::Play => RemoteCommand::Play,
            RemoteCommandEvent::Pause => RemoteCommand::Pause,
            RemoteCommandEvent::TogglePlayPause => RemoteCommand::TogglePlayPause,
            RemoteCommandEvent::NextTrack => RemoteCommand::NextTrack,
            RemoteCommandEvent::PreviousTrack => RemoteCommand::PreviousTrack,
            RemoteCommandEvent::ChangePlaybackPosition { .. } => {
                RemoteCommand::ChangePlaybackPosition
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    CommandFailed,
}

/// Token returned by [`RemoteCommandCenter::add_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandTargetId(pub u64);

pub type CommandHandler = Arc<dyn Fn(&RemoteCommandEvent) -> CommandStatus + Send + Sync>;

pub trait RemoteCommandCenter: PlatformSendSync {
    fn add_target(&self, command: RemoteCommand, handler: CommandHandler) -> CommandTargetId;

    fn remove_target(&self, command: RemoteCommand, target: CommandTargetId);

    fn set_enabled(&self, command: RemoteCommand, enabled: bool);
}
