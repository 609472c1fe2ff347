//! View-level capabilities: render surface attachment and fullscreen
//! presentation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::Result,
    media::PlayableItem,
    platform::PlatformSendSync,
    player::PlayerHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    #[default]
    Contain,
    Cover,
    Stretch,
    None,
}

/// The view that renders a player's frames.
///
/// The surface borrows the player for the duration of the call; it must not
/// retain it beyond what the platform view hierarchy requires.
pub trait RenderSurface: PlatformSendSync {
    fn attach(&self, player: &dyn PlayerHandle);

    fn detach(&self, player: &dyn PlayerHandle);

    fn set_resize_mode(&self, mode: ResizeMode);
}

/// A togglable control of the fullscreen control bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    SeekBar,
    Duration,
    Position,
    PlayPause,
    Forward,
    Rewind,
    Next,
    Previous,
    Fullscreen,
    Settings,
}

impl ControlKind {
    pub const ALL: [ControlKind; 10] = [
        ControlKind::SeekBar,
        ControlKind::Duration,
        ControlKind::Position,
        ControlKind::PlayPause,
        ControlKind::Forward,
        ControlKind::Rewind,
        ControlKind::Next,
        ControlKind::Previous,
        ControlKind::Fullscreen,
        ControlKind::Settings,
    ];
}

/// How a single control is rendered.
///
/// Hidden controls keep their slot in the layout so the control bar geometry
/// does not shift when flags change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlVisibility {
    pub visible: bool,
    pub interactive: bool,
    pub keeps_layout: bool,
}

impl ControlVisibility {
    pub const SHOWN: ControlVisibility = ControlVisibility {
        visible: true,
        interactive: true,
        keeps_layout: true,
    };

    pub const HIDDEN: ControlVisibility = ControlVisibility {
        visible: false,
        interactive: false,
        keeps_layout: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    #[default]
    Sensor,
}

/// Window chrome applied while presented.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FullscreenChrome {
    pub hide_navigation_bar: bool,
    pub hide_status_bar: bool,
    pub orientation: Orientation,
    pub live_label: Option<String>,
    pub seek_increment_ms: u64,
}

/// Platform side of fullscreen presentation.
#[async_trait]
pub trait PresentationHost: PlatformSendSync {
    /// Creates a fresh player for the fullscreen view, bound to `item`.
    ///
    /// Also used to recreate the mirror when the previous one was torn down
    /// by the platform while still presented.
    async fn create_mirror_player(&self, item: &PlayableItem) -> Result<Arc<dyn PlayerHandle>>;

    fn apply_controls(&self, controls: &[(ControlKind, ControlVisibility)], chrome: &FullscreenChrome);

    async fn present(&self) -> Result<()>;

    async fn dismiss(&self) -> Result<()>;
}
