//! # Playback Configuration
//!
//! Timing knobs for the playback core.
//!
//! Every value is stored in milliseconds so the configuration round-trips
//! through JSON unchanged; the `Duration` accessors are what components use.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// State synchronizer timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Interval between reconciliation ticks while synchronizing.
    ///
    /// Default: 500ms.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Position drift above which the secondary is hard-reseeked.
    ///
    /// Default: 2000ms.
    #[serde(default = "default_drift_tolerance_ms")]
    pub drift_tolerance_ms: u64,

    /// Slower backstop check that requests recreation of a released
    /// secondary while fullscreen is presented.
    ///
    /// Default: 5000ms.
    #[serde(default = "default_backstop_interval_ms")]
    pub backstop_interval_ms: u64,
}

impl SyncConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn backstop_interval(&self) -> Duration {
        Duration::from_millis(self.backstop_interval_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            drift_tolerance_ms: default_drift_tolerance_ms(),
            backstop_interval_ms: default_backstop_interval_ms(),
        }
    }
}

/// Queue navigation timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    /// Delay between a queue-issued load being applied and playback start.
    ///
    /// Default: 200ms.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl QueueConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// Now-playing coordinator timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingConfig {
    /// Window in which re-registration of the same handle is coalesced.
    ///
    /// Default: 300ms.
    #[serde(default = "default_registration_debounce_ms")]
    pub registration_debounce_ms: u64,

    /// Coalescing window for a non-current handle while queue mode is
    /// active (rapid queue transitions).
    ///
    /// Default: 1000ms.
    #[serde(default = "default_queue_registration_debounce_ms")]
    pub queue_registration_debounce_ms: u64,

    /// Trailing-edge delay before a scheduled refresh publishes.
    ///
    /// Default: 300ms.
    #[serde(default = "default_refresh_delay_ms")]
    pub refresh_delay_ms: u64,

    /// Refresh delay while queue mode is active.
    ///
    /// Default: 500ms.
    #[serde(default = "default_queue_refresh_delay_ms")]
    pub queue_refresh_delay_ms: u64,

    /// Minimum interval between two publishes (about 3 per second).
    ///
    /// Default: 333ms.
    #[serde(default = "default_min_publish_interval_ms")]
    pub min_publish_interval_ms: u64,

    /// Delay used by views before registering after a state change.
    ///
    /// Default: 200ms.
    #[serde(default = "default_scheduling_delay_ms")]
    pub scheduling_delay_ms: u64,

    /// Period of the elapsed-time refresh while the current session plays.
    ///
    /// Default: 500ms.
    #[serde(default = "default_elapsed_refresh_interval_ms")]
    pub elapsed_refresh_interval_ms: u64,
}

impl NowPlayingConfig {
    /// Registration debounce window for the given situation.
    pub fn registration_window(&self, queue_mode: bool, is_current: bool) -> Duration {
        if queue_mode && !is_current {
            Duration::from_millis(self.queue_registration_debounce_ms)
        } else {
            Duration::from_millis(self.registration_debounce_ms)
        }
    }

    /// Refresh delay for the given situation.
    pub fn refresh_delay(&self, queue_mode: bool) -> Duration {
        if queue_mode {
            Duration::from_millis(self.queue_refresh_delay_ms)
        } else {
            Duration::from_millis(self.refresh_delay_ms)
        }
    }

    pub fn min_publish_interval(&self) -> Duration {
        Duration::from_millis(self.min_publish_interval_ms)
    }

    pub fn scheduling_delay(&self) -> Duration {
        Duration::from_millis(self.scheduling_delay_ms)
    }

    pub fn elapsed_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.elapsed_refresh_interval_ms)
    }
}

impl Default for NowPlayingConfig {
    fn default() -> Self {
        Self {
            registration_debounce_ms: default_registration_debounce_ms(),
            queue_registration_debounce_ms: default_queue_registration_debounce_ms(),
            refresh_delay_ms: default_refresh_delay_ms(),
            queue_refresh_delay_ms: default_queue_refresh_delay_ms(),
            min_publish_interval_ms: default_min_publish_interval_ms(),
            scheduling_delay_ms: default_scheduling_delay_ms(),
            elapsed_refresh_interval_ms: default_elapsed_refresh_interval_ms(),
        }
    }
}

/// Playback core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackConfig {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub now_playing: NowPlayingConfig,

    /// Interval of `progress` events while an item is ready.
    ///
    /// Default: 250ms.
    #[serde(default = "default_progress_update_interval_ms")]
    pub progress_update_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            queue: QueueConfig::default(),
            now_playing: NowPlayingConfig::default(),
            progress_update_interval_ms: default_progress_update_interval_ms(),
        }
    }
}

impl PlaybackConfig {
    /// Tighter sync and faster progress, for short-form content.
    pub fn responsive() -> Self {
        Self {
            sync: SyncConfig {
                tick_interval_ms: 250,
                drift_tolerance_ms: 1000,
                ..Default::default()
            },
            progress_update_interval_ms: 100,
            ..Default::default()
        }
    }

    /// Fewer wakeups, for long-form content on battery.
    pub fn battery_saver() -> Self {
        Self {
            sync: SyncConfig {
                tick_interval_ms: 1000,
                backstop_interval_ms: 10_000,
                ..Default::default()
            },
            progress_update_interval_ms: 1000,
            ..Default::default()
        }
    }

    pub fn progress_update_interval(&self) -> Duration {
        Duration::from_millis(self.progress_update_interval_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.sync.tick_interval_ms == 0 {
            return Err("sync.tick_interval_ms must be > 0".to_string());
        }

        if self.sync.backstop_interval_ms < self.sync.tick_interval_ms {
            return Err("sync.backstop_interval_ms cannot be shorter than the tick".to_string());
        }

        if self.now_playing.min_publish_interval_ms == 0 {
            return Err("now_playing.min_publish_interval_ms must be > 0".to_string());
        }

        if self.now_playing.elapsed_refresh_interval_ms == 0 {
            return Err("now_playing.elapsed_refresh_interval_ms must be > 0".to_string());
        }

        if self.now_playing.queue_registration_debounce_ms
            < self.now_playing.registration_debounce_ms
        {
            return Err(
                "now_playing.queue_registration_debounce_ms cannot be shorter than \
                 registration_debounce_ms"
                    .to_string(),
            );
        }

        if self.progress_update_interval_ms == 0 {
            return Err("progress_update_interval_ms must be > 0".to_string());
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_tick_interval_ms() -> u64 {
    500
}

fn default_drift_tolerance_ms() -> u64 {
    2000
}

fn default_backstop_interval_ms() -> u64 {
    5000
}

fn default_settle_delay_ms() -> u64 {
    200
}

fn default_registration_debounce_ms() -> u64 {
    300
}

fn default_queue_registration_debounce_ms() -> u64 {
    1000
}

fn default_refresh_delay_ms() -> u64 {
    300
}

fn default_queue_refresh_delay_ms() -> u64 {
    500
}

fn default_min_publish_interval_ms() -> u64 {
    333
}

fn default_scheduling_delay_ms() -> u64 {
    200
}

fn default_elapsed_refresh_interval_ms() -> u64 {
    500
}

fn default_progress_update_interval_ms() -> u64 {
    250
}
