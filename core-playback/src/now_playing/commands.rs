//! Remote command handling.
//!
//! Handlers answer synchronously. Queue navigation is handed off to a
//! detached task so the platform's command dispatcher is never blocked by a
//! source load.

use super::{NowPlayingCoordinator, TrackChangeRequest};
use crate::error::{PlaybackError, Result};
use crate::session::{secs_to_ms, PlaybackSession};
use bridge_traits::now_playing::{CommandStatus, RemoteCommandEvent};
use core_async::task::spawn_detached;
use std::sync::Arc;
use tracing::{debug, instrument};

fn rejected(reason: &str) -> PlaybackError {
    PlaybackError::RemoteCommandFailed(reason.to_string())
}

impl NowPlayingCoordinator {
    /// Handles one remote command against the current session.
    #[instrument(skip(self), fields(command = ?event.command()))]
    pub fn handle_remote_command(&self, event: &RemoteCommandEvent) -> CommandStatus {
        let result = match event {
            RemoteCommandEvent::Play => self.remote_play(),
            RemoteCommandEvent::Pause => self.remote_pause(),
            RemoteCommandEvent::TogglePlayPause => self.remote_toggle(),
            RemoteCommandEvent::NextTrack => self.remote_track_change(TrackChangeRequest::Next),
            RemoteCommandEvent::PreviousTrack => {
                self.remote_track_change(TrackChangeRequest::Previous)
            }
            RemoteCommandEvent::ChangePlaybackPosition { position_secs } => {
                self.remote_seek(*position_secs)
            }
        };

        match result {
            Ok(()) => CommandStatus::Success,
            Err(e) => {
                debug!(error = %e, "Remote command rejected");
                CommandStatus::CommandFailed
            }
        }
    }

    fn require_current(&self) -> Result<Arc<PlaybackSession>> {
        self.current_session()
            .ok_or_else(|| rejected("no current session"))
    }

    fn remote_play(&self) -> Result<()> {
        let session = self.require_current()?;
        if session.rate() != 0.0 {
            return Err(rejected("already playing"));
        }
        session.play()?;
        self.update_now_playing_info();
        Ok(())
    }

    fn remote_pause(&self) -> Result<()> {
        let session = self.require_current()?;
        if session.rate() == 0.0 {
            return Err(rejected("already paused"));
        }
        session.pause()?;
        self.update_now_playing_info();
        Ok(())
    }

    fn remote_toggle(&self) -> Result<()> {
        let session = self.require_current()?;
        if session.rate() == 0.0 {
            session.play()?;
        } else {
            session.pause()?;
        }
        self.update_now_playing_info();
        Ok(())
    }

    fn remote_seek(&self, position_secs: f64) -> Result<()> {
        let session = self.require_current()?;
        session.seek(secs_to_ms(position_secs), 0)?;
        self.update_now_playing_info();
        Ok(())
    }

    fn remote_track_change(&self, request: TrackChangeRequest) -> Result<()> {
        match self.current_context() {
            Some(context) if context.is_queue_mode() => {
                let context = Arc::downgrade(&context);
                spawn_detached(async move {
                    if let Some(context) = context.upgrade() {
                        match request {
                            TrackChangeRequest::Next => context.request_next_track(),
                            TrackChangeRequest::Previous => context.request_previous_track(),
                        }
                    }
                });
            }
            _ => self.broadcast_track_change(request),
        }
        Ok(())
    }
}
