//! # Playback Error Types
//!
//! Error taxonomy for the playback core.
//!
//! Most of these never escape a component as a hard failure: loader and
//! player failures are reported through the `error` event and the component
//! stays usable for the next source. The classification helpers below encode
//! that policy so callers do not repeat it.

use bridge_traits::error::BridgeError;
use bridge_traits::player::PlaybackFailure;
use thiserror::Error;

/// Code reported in the `error` event when a source has no playable URI.
pub const SOURCE_EMPTY_CODE: i64 = -1;
/// Code reported when the source preparer failed.
pub const PREPARATION_FAILED_CODE: i64 = -2;
/// Code reported when a platform bridge call failed.
pub const BRIDGE_FAILURE_CODE: i64 = -3;
/// Code for core errors that have no platform counterpart.
pub const INTERNAL_ERROR_CODE: i64 = -100;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// The source descriptor carried no playable URI.
    #[error("Source has no playable URI")]
    SourceEmpty,

    /// Asset resolution, DRM or network failure during preparation.
    #[error("Source preparation failed: {0}")]
    PreparationFailed(String),

    // ========================================================================
    // Playback Errors
    // ========================================================================
    /// The item entered a failed status after it was loaded.
    #[error("Playback failed ({code}): {description}")]
    PlaybackFailed {
        code: i64,
        description: String,
        domain: Option<String>,
    },

    /// A remote command's preconditions were not met.
    #[error("Remote command rejected: {0}")]
    RemoteCommandFailed(String),

    /// The session's player handle was already released.
    #[error("Playback session released")]
    SessionReleased,

    /// Invalid volume value (must be in range [0.0, 1.0]).
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    /// Invalid playback rate (must be finite and >= 0).
    #[error("Invalid playback rate: {0}")]
    InvalidRate(f32),

    /// Attempted operation when no item is loaded.
    #[error("No item loaded")]
    NoItemLoaded,

    /// A state machine was asked for a transition it does not allow.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Configuration value out of range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A platform bridge call failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if the component that raised this error remains
    /// usable for subsequent sources.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PlaybackError::SessionReleased | PlaybackError::Config(_)
        )
    }

    /// Returns `true` if this error must clear the published now-playing
    /// entry.
    pub fn clears_now_playing(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceEmpty | PlaybackError::PlaybackFailed { .. }
        )
    }

    /// Returns `true` if this error is surfaced through the `error` event.
    ///
    /// Rejected remote commands only report failure to the system dispatcher.
    pub fn is_reported(&self) -> bool {
        !matches!(
            self,
            PlaybackError::RemoteCommandFailed(_)
                | PlaybackError::InvalidTransition { .. }
                | PlaybackError::SessionReleased
        )
    }

    /// Numeric code for the `error` event payload.
    ///
    /// Platform failure codes pass through unchanged.
    pub fn code(&self) -> i64 {
        match self {
            PlaybackError::SourceEmpty => SOURCE_EMPTY_CODE,
            PlaybackError::PreparationFailed(_) => PREPARATION_FAILED_CODE,
            PlaybackError::PlaybackFailed { code, .. } => *code,
            PlaybackError::Bridge(_) => BRIDGE_FAILURE_CODE,
            _ => INTERNAL_ERROR_CODE,
        }
    }

    /// Error domain for the `error` event payload, when one is known.
    pub fn domain(&self) -> Option<&str> {
        match self {
            PlaybackError::PlaybackFailed { domain, .. } => domain.as_deref(),
            _ => None,
        }
    }
}

impl From<PlaybackFailure> for PlaybackError {
    fn from(failure: PlaybackFailure) -> Self {
        PlaybackError::PlaybackFailed {
            code: failure.code,
            description: failure.description,
            domain: failure.domain,
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
