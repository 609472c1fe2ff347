//! Workspace umbrella crate.
//!
//! Host applications can depend on `vpc-workspace` and reach the per-view
//! controller and the playback core through a single dependency instead of
//! wiring each workspace crate individually.

#[cfg(feature = "service")]
pub use core_playback as playback;
#[cfg(feature = "service")]
pub use core_service as service;
