//! Core service façade.
//!
//! This crate wires host-provided bridge implementations into the playback
//! core. A host builds one [`CoreService`] from a validated
//! [`CoreConfig`](core_runtime::config::CoreConfig) and asks it for a
//! [`VideoController`] per player view.
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .source_preparer(preparer)
//!     .event_sink(sink)
//!     .build()?;
//! let core = CoreService::new(config, PlaybackConfig::default())?;
//! let view = core.create_controller(player, Some(surface))?;
//! view.set_src(source)?;
//! ```

pub mod controller;
pub mod error;
pub mod lifecycle;

pub use controller::VideoController;
pub use error::{CoreError, Result};
pub use lifecycle::{LifecycleAction, LifecycleFlags};

use std::fmt;
use std::sync::Arc;

use bridge_traits::player::PlayerHandle;
use bridge_traits::presentation::RenderSurface;
use controller::ControllerParts;
use core_async::runtime::Handle;
use core_playback::now_playing::{self, NowPlayingCoordinator};
use core_playback::{ExternalServiceRegistry, PlaybackConfig, PlaybackError};
use core_runtime::config::CoreConfig;
use core_runtime::events::{forward_to_sink, EventBus, DEFAULT_EVENT_BUFFER_SIZE};
use tracing::{debug, info, warn};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: CoreConfig,
    playback: PlaybackConfig,
    coordinator: Option<Arc<NowPlayingCoordinator>>,
    external: Option<Arc<ExternalServiceRegistry>>,
}

impl CoreService {
    /// Create a new service, installing the process-wide now-playing
    /// coordinator when now playing is enabled and none is installed yet.
    pub fn new(config: CoreConfig, playback: PlaybackConfig) -> Result<Self> {
        let coordinator = if config.features.enable_now_playing {
            Some(Self::process_coordinator(&config, &playback)?)
        } else {
            None
        };
        Self::build(config, playback, coordinator)
    }

    /// Create a service around an explicit coordinator instead of the
    /// process-wide one.
    pub fn with_coordinator(
        config: CoreConfig,
        playback: PlaybackConfig,
        coordinator: Arc<NowPlayingCoordinator>,
    ) -> Result<Self> {
        let coordinator = config.features.enable_now_playing.then_some(coordinator);
        Self::build(config, playback, coordinator)
    }

    fn build(
        config: CoreConfig,
        playback: PlaybackConfig,
        coordinator: Option<Arc<NowPlayingCoordinator>>,
    ) -> Result<Self> {
        config.validate()?;
        playback.validate().map_err(PlaybackError::Config)?;

        let external = config
            .features
            .enable_external_services
            .then(|| Arc::new(ExternalServiceRegistry::new()));

        info!(
            now_playing = coordinator.is_some(),
            fullscreen = config.features.enable_fullscreen,
            external_services = external.is_some(),
            "Core service initialized"
        );
        Ok(Self {
            config,
            playback,
            coordinator,
            external,
        })
    }

    fn process_coordinator(
        config: &CoreConfig,
        playback: &PlaybackConfig,
    ) -> Result<Arc<NowPlayingCoordinator>> {
        if let Some(shared) = now_playing::shared() {
            return Ok(shared);
        }
        let (Some(surface), Some(commands)) = (
            config.now_playing_surface.clone(),
            config.remote_command_center.clone(),
        ) else {
            return Err(CoreError::capability_missing(
                "NowPlayingSurface",
                "Now playing is enabled but the now-playing bridges are missing.",
            ));
        };

        let coordinator =
            NowPlayingCoordinator::new(surface, commands, playback.now_playing.clone());
        match now_playing::install(Arc::clone(&coordinator)) {
            Ok(()) => {
                debug!("Installed process-wide now-playing coordinator");
                Ok(coordinator)
            }
            // Lost a race with another service; use the winner.
            Err(_) => now_playing::shared().ok_or_else(|| {
                CoreError::InitializationFailed("now-playing coordinator unavailable".into())
            }),
        }
    }

    /// Creates the controller for one player view.
    ///
    /// Must be called from within the async runtime: the controller spawns
    /// its progress reporter and event forwarding there.
    pub fn create_controller(
        &self,
        player: Arc<dyn PlayerHandle>,
        surface: Option<Arc<dyn RenderSurface>>,
    ) -> Result<Arc<VideoController>> {
        if Handle::try_current().is_err() {
            return Err(CoreError::InitializationFailed(
                "create_controller requires a running async runtime".into(),
            ));
        }

        let bus = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);
        if let Some(sink) = &self.config.event_sink {
            forward_to_sink(&bus, Arc::clone(sink));
        }

        let presentation_host = if self.config.features.enable_fullscreen {
            self.config.presentation_host.clone()
        } else {
            None
        };

        let controller = VideoController::new(ControllerParts {
            player,
            surface,
            preparer: Arc::clone(&self.config.source_preparer),
            presentation_host,
            coordinator: self.coordinator.clone(),
            external: self.external.clone(),
            ads: self.config.ads_controller.clone(),
            config: self.playback.clone(),
            bus,
        });

        if let Some(observer) = self.config.lifecycle_observer.clone() {
            let view = Arc::clone(&controller);
            core_async::task::spawn_detached(async move {
                if let Err(e) = view.attach_lifecycle_observer(observer).await {
                    warn!(error = %e, "Lifecycle observer not attached");
                }
            });
        }

        debug!(session_id = %controller.session_id(), "Controller created");
        Ok(controller)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn playback_config(&self) -> &PlaybackConfig {
        &self.playback
    }

    pub fn coordinator(&self) -> Option<Arc<NowPlayingCoordinator>> {
        self.coordinator.clone()
    }

    /// The external media service registry, when external services are
    /// enabled.
    pub fn external_services(&self) -> Option<Arc<ExternalServiceRegistry>> {
        self.external.clone()
    }
}

impl fmt::Debug for CoreService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreService")
            .field("features", &self.config.features)
            .field("now_playing", &self.coordinator.is_some())
            .field("external_services", &self.external.is_some())
            .finish()
    }
}
