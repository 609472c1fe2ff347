//! # Now Playing
//!
//! Keeps exactly one system-visible now-playing entry in step with the most
//! relevant playback session, and routes remote commands (lock screen,
//! headset buttons) back into the core.
//!
//! ## Components
//!
//! - [`NowPlayingCoordinator`]: registry of sessions, election of the
//!   current one, rate-limited publishing and remote command targets
//! - [`metadata`]: title/artist/artwork resolution for an item
//!
//! ## Process-wide instance
//!
//! The platform exposes a single now-playing surface per process, so hosts
//! normally [`install`] one coordinator and every view controller registers
//! with [`shared`]. Tests construct private instances with
//! [`NowPlayingCoordinator::new`].

mod commands;
mod coordinator;
pub mod metadata;

pub use coordinator::{NowPlayingCoordinator, PublishOutcome, RegistrationOutcome};

use bridge_traits::source::CustomMetadata;
use std::sync::{Arc, OnceLock};

/// The view-level owner of a registered session.
///
/// The coordinator holds contexts weakly and consults them for queue mode,
/// host-supplied metadata and queue navigation.
pub trait NowPlayingContext: Send + Sync {
    fn is_queue_mode(&self) -> bool;

    /// Advances the queue. Called off the command-delivery path.
    fn request_next_track(&self);

    /// Retreats the queue. Called off the command-delivery path.
    fn request_previous_track(&self);

    fn custom_metadata(&self) -> Option<CustomMetadata> {
        None
    }
}

/// Track change requested by a remote command while queue mode was inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackChangeRequest {
    Next,
    Previous,
}

static SHARED: OnceLock<Arc<NowPlayingCoordinator>> = OnceLock::new();

/// Installs the process-wide coordinator.
///
/// Returns the rejected coordinator if one is already installed.
pub fn install(
    coordinator: Arc<NowPlayingCoordinator>,
) -> Result<(), Arc<NowPlayingCoordinator>> {
    SHARED.set(coordinator)
}

/// The process-wide coordinator, if installed.
pub fn shared() -> Option<Arc<NowPlayingCoordinator>> {
    SHARED.get().cloned()
}
