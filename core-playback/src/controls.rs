//! Fullscreen control-bar configuration.
//!
//! Hosts send a `controlsStyles` object; every control maps independently to
//! a show/hide flag. Hidden controls keep their slot in the layout.

use bridge_traits::presentation::{ControlKind, ControlVisibility, FullscreenChrome, Orientation};
use serde::{Deserialize, Deserializer, Serialize};

fn default_true() -> bool {
    true
}

fn default_seek_increment_ms() -> u64 {
    10_000
}

/// Accepts any string; values other than `landscape`/`portrait` mean
/// `sensor`.
fn lenient_orientation<'de, D>(deserializer: D) -> Result<Orientation, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("landscape") => Orientation::Landscape,
        Some("portrait") => Orientation::Portrait,
        _ => Orientation::Sensor,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlsConfig {
    #[serde(default)]
    pub hide_seek_bar: bool,
    #[serde(default)]
    pub hide_duration: bool,
    #[serde(default)]
    pub hide_position: bool,
    #[serde(default)]
    pub hide_play_pause: bool,
    #[serde(default)]
    pub hide_forward: bool,
    #[serde(default)]
    pub hide_rewind: bool,
    #[serde(default)]
    pub hide_next: bool,
    #[serde(default)]
    pub hide_previous: bool,
    #[serde(default)]
    pub hide_fullscreen: bool,
    #[serde(default = "default_true")]
    pub hide_setting_button: bool,
    #[serde(default = "default_true")]
    pub hide_navigation_bar_on_full_screen_mode: bool,
    #[serde(default = "default_true")]
    pub hide_notification_bar_on_full_screen_mode: bool,
    #[serde(default)]
    pub live_label: Option<String>,
    #[serde(default = "default_seek_increment_ms", rename = "seekIncrementMS")]
    pub seek_increment_ms: u64,
    #[serde(default, deserialize_with = "lenient_orientation")]
    pub preferred_orientation: Orientation,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            hide_seek_bar: false,
            hide_duration: false,
            hide_position: false,
            hide_play_pause: false,
            hide_forward: false,
            hide_rewind: false,
            hide_next: false,
            hide_previous: false,
            hide_fullscreen: false,
            hide_setting_button: true,
            hide_navigation_bar_on_full_screen_mode: true,
            hide_notification_bar_on_full_screen_mode: true,
            live_label: None,
            seek_increment_ms: default_seek_increment_ms(),
            preferred_orientation: Orientation::Sensor,
        }
    }
}

impl ControlsConfig {
    pub fn is_hidden(&self, control: ControlKind) -> bool {
        match control {
            ControlKind::SeekBar => self.hide_seek_bar,
            ControlKind::Duration => self.hide_duration,
            ControlKind::Position => self.hide_position,
            ControlKind::PlayPause => self.hide_play_pause,
            ControlKind::Forward => self.hide_forward,
            ControlKind::Rewind => self.hide_rewind,
            ControlKind::Next => self.hide_next,
            ControlKind::Previous => self.hide_previous,
            ControlKind::Fullscreen => self.hide_fullscreen,
            ControlKind::Settings => self.hide_setting_button,
        }
    }

    /// Visibility of every togglable control, in [`ControlKind::ALL`] order.
    pub fn visibility(&self) -> Vec<(ControlKind, ControlVisibility)> {
        ControlKind::ALL
            .into_iter()
            .map(|control| {
                let visibility = if self.is_hidden(control) {
                    ControlVisibility::HIDDEN
                } else {
                    ControlVisibility::SHOWN
                };
                (control, visibility)
            })
            .collect()
    }

    /// Window chrome applied while presented fullscreen.
    pub fn chrome(&self) -> FullscreenChrome {
        FullscreenChrome {
            hide_navigation_bar: self.hide_navigation_bar_on_full_screen_mode,
            hide_status_bar: self.hide_notification_bar_on_full_screen_mode,
            orientation: self.preferred_orientation,
            live_label: self.live_label.clone(),
            seek_increment_ms: self.seek_increment_ms,
        }
    }
}
