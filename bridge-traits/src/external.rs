//! Third-party media integrations (casting targets, companion devices).

use serde::{Deserialize, Serialize};

use crate::platform::PlatformSendSync;

/// What an external service can do when asked by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCapabilities {
    pub playback_control: bool,
    pub seek: bool,
    pub speed: bool,
    pub volume: bool,
}

/// An external media service kept informed of local playback.
///
/// All callbacks are notifications; the service must not call back into the
/// core synchronously from them.
pub trait ExternalMediaService: PlatformSendSync {
    fn service_id(&self) -> String;

    fn is_connected(&self) -> bool;

    fn capabilities(&self) -> ExternalCapabilities {
        ExternalCapabilities::default()
    }

    fn on_connect(&self) {}

    fn on_disconnect(&self) {}

    fn on_playback_state_changed(&self, _is_playing: bool, _position_ms: u64, _rate: f32) {}

    fn on_item_changed(&self, _source_id: Option<&str>) {}

    fn on_seek_completed(&self, _position_ms: u64) {}

    fn on_volume_changed(&self, _volume: f32) {}
}
