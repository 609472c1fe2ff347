//! # Core Configuration Module
//!
//! Provides configuration management for the video playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the host bridges and feature switches for the core.
//! It enforces fail-fast validation so that every enabled feature has the
//! bridge it needs before any player is created.
//!
//! ## Required Dependencies
//!
//! - `SourcePreparer` - Resolves a source descriptor into a playable item
//!
//! ## Optional Dependencies
//!
//! - `EventSink` - Receives named events for the application layer
//! - `NowPlayingSurface` - Lock-screen / control-center entry (now playing)
//! - `RemoteCommandCenter` - Headset and lock-screen commands (now playing)
//! - `PresentationHost` - Fullscreen mirror player and transitions (fullscreen)
//! - `LifecycleObserver` - App lifecycle and audio session signals
//! - `AdsController` - Advertising insertion
//! - `LoggerSink` - Forwards structured logs to host logging
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .source_preparer(Arc::new(MyPreparer))
//!     .now_playing_surface(Arc::new(MySurface))
//!     .remote_command_center(Arc::new(MyCommandCenter))
//!     .enable_now_playing(true)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! The builder reports missing capabilities with an actionable message:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No SourcePreparer was injected
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::{
    AdsController, EventSink, LifecycleObserver, LoggerSink, NowPlayingSurface,
    PresentationHost, RemoteCommandCenter, SourcePreparer,
};
use std::sync::Arc;

/// Core configuration for the video playback core.
///
/// This struct holds all bridges and switches required to create
/// controllers. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Source preparation (required)
    pub source_preparer: Arc<dyn SourcePreparer>,

    /// Outbound named events
    pub event_sink: Option<Arc<dyn EventSink>>,

    /// Lock-screen now-playing surface
    pub now_playing_surface: Option<Arc<dyn NowPlayingSurface>>,

    /// Remote command registration
    pub remote_command_center: Option<Arc<dyn RemoteCommandCenter>>,

    /// Fullscreen presentation
    pub presentation_host: Option<Arc<dyn PresentationHost>>,

    /// App lifecycle and audio session signals
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,

    /// Advertising insertion
    pub ads_controller: Option<Arc<dyn AdsController>>,

    /// Host log forwarding
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("source_preparer", &"SourcePreparer { ... }")
            .field(
                "event_sink",
                &self.event_sink.as_ref().map(|_| "EventSink { ... }"),
            )
            .field(
                "now_playing_surface",
                &self
                    .now_playing_surface
                    .as_ref()
                    .map(|_| "NowPlayingSurface { ... }"),
            )
            .field(
                "remote_command_center",
                &self
                    .remote_command_center
                    .as_ref()
                    .map(|_| "RemoteCommandCenter { ... }"),
            )
            .field(
                "presentation_host",
                &self
                    .presentation_host
                    .as_ref()
                    .map(|_| "PresentationHost { ... }"),
            )
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .field(
                "ads_controller",
                &self.ads_controller.as_ref().map(|_| "AdsController { ... }"),
            )
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
///
/// Each feature requires its corresponding bridges; `build()` refuses a
/// configuration that enables a feature without them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Publish lock-screen metadata and accept remote commands
    /// (requires NowPlayingSurface and RemoteCommandCenter)
    pub enable_now_playing: bool,

    /// Allow fullscreen presentation (requires PresentationHost)
    pub enable_fullscreen: bool,

    /// Forward playback state to registered external media services
    pub enable_external_services: bool,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks that each enabled feature has the bridges it depends on.
    pub fn validate(&self) -> Result<()> {
        if self.features.enable_now_playing {
            if self.now_playing_surface.is_none() {
                return Err(capability_missing(
                    "NowPlayingSurface",
                    "Now playing is enabled but no NowPlayingSurface was provided. \
                     Disable the feature or inject the platform now-playing bridge.",
                ));
            }
            if self.remote_command_center.is_none() {
                return Err(capability_missing(
                    "RemoteCommandCenter",
                    "Now playing is enabled but no RemoteCommandCenter was provided. \
                     Disable the feature or inject the platform remote command bridge.",
                ));
            }
        }

        if self.features.enable_fullscreen && self.presentation_host.is_none() {
            return Err(capability_missing(
                "PresentationHost",
                "Fullscreen is enabled but no PresentationHost was provided. \
                 Disable the feature or inject a PresentationHost implementation.",
            ));
        }

        Ok(())
    }

    /// Logging settings that forward to the configured `LoggerSink`, if any.
    ///
    /// Pass the result (optionally adjusted) to
    /// [`init_logging`](crate::logging::init_logging).
    pub fn logging_config(&self) -> LoggingConfig {
        match &self.logger_sink {
            Some(sink) => LoggingConfig::default().with_logger_sink(Arc::clone(sink)),
            None => LoggingConfig::default(),
        }
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set bridges and switches, then call
/// [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    source_preparer: Option<Arc<dyn SourcePreparer>>,
    event_sink: Option<Arc<dyn EventSink>>,
    now_playing_surface: Option<Arc<dyn NowPlayingSurface>>,
    remote_command_center: Option<Arc<dyn RemoteCommandCenter>>,
    presentation_host: Option<Arc<dyn PresentationHost>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    ads_controller: Option<Arc<dyn AdsController>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the source preparer (required).
    ///
    /// The preparer turns a [`SourceDescriptor`](bridge_traits::SourceDescriptor)
    /// into a playable item. DRM, caching and header injection live behind it.
    pub fn source_preparer(mut self, preparer: Arc<dyn SourcePreparer>) -> Self {
        self.source_preparer = Some(preparer);
        self
    }

    /// Sets the sink that receives named events.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Sets the lock-screen now-playing surface.
    pub fn now_playing_surface(mut self, surface: Arc<dyn NowPlayingSurface>) -> Self {
        self.now_playing_surface = Some(surface);
        self
    }

    /// Sets the remote command center.
    pub fn remote_command_center(mut self, center: Arc<dyn RemoteCommandCenter>) -> Self {
        self.remote_command_center = Some(center);
        self
    }

    /// Sets the fullscreen presentation host.
    pub fn presentation_host(mut self, host: Arc<dyn PresentationHost>) -> Self {
        self.presentation_host = Some(host);
        self
    }

    /// Sets the lifecycle observer.
    ///
    /// Without one, controllers never receive background or audio session
    /// signals and keep their current play state.
    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    /// Sets the advertising controller.
    pub fn ads_controller(mut self, ads: Arc<dyn AdsController>) -> Self {
        self.ads_controller = Some(ads);
        self
    }

    /// Sets the host logger sink.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Enables or disables now-playing publication and remote commands.
    pub fn enable_now_playing(mut self, enabled: bool) -> Self {
        self.features.enable_now_playing = enabled;
        self
    }

    /// Enables or disables fullscreen presentation.
    pub fn enable_fullscreen(mut self, enabled: bool) -> Self {
        self.features.enable_fullscreen = enabled;
        self
    }

    /// Enables or disables external media service forwarding.
    pub fn enable_external_services(mut self, enabled: bool) -> Self {
        self.features.enable_external_services = enabled;
        self
    }

    /// Replaces all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - The SourcePreparer is missing
    /// - A feature is enabled without the bridges it depends on
    pub fn build(self) -> Result<CoreConfig> {
        let source_preparer = self.source_preparer.ok_or_else(|| {
            capability_missing(
                "SourcePreparer",
                "SourcePreparer implementation is required to load sources. \
                 iOS: inject the AVURLAsset-backed preparer. \
                 Android: inject the MediaSource factory preparer.",
            )
        })?;

        let config = CoreConfig {
            source_preparer,
            event_sink: self.event_sink,
            now_playing_surface: self.now_playing_surface,
            remote_command_center: self.remote_command_center,
            presentation_host: self.presentation_host,
            lifecycle_observer: self.lifecycle_observer,
            ads_controller: self.ads_controller,
            logger_sink: self.logger_sink,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
