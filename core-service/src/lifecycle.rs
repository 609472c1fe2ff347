//! # Lifecycle Policy
//!
//! Decides what a view controller does when the application changes state or
//! the audio session reports an interruption or a route change.
//!
//! The policy is a pure function of the signal and a snapshot of the
//! controller's flags. It returns the actions to perform in order; the
//! controller performs them. Keeping the decision separate from the side
//! effects lets the rules be tested without players or timers.

use bridge_traits::lifecycle::{AudioSessionEvent, HostSignal, LifecycleEvent};

/// Snapshot of the controller state the policy depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LifecycleFlags {
    pub play_in_background: bool,
    pub play_when_inactive: bool,
    pub is_playing: bool,
    /// The user explicitly paused.
    pub user_paused: bool,
    pub queue_mode: bool,
    /// An audio session interruption is in progress.
    pub interrupted: bool,
    /// Playback was wanted when the current interruption began.
    pub resume_after_interruption: bool,
}

impl LifecycleFlags {
    /// Queue playback that was asked to continue in the background keeps
    /// running through lock and background transitions.
    fn background_queue(&self) -> bool {
        self.queue_mode && self.play_in_background
    }
}

/// A step the controller performs in response to a host signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Pause on behalf of the system; playback may resume later.
    PauseForSystem,
    /// Resume playback that the system paused.
    Resume,
    /// Re-apply the user's explicit pause.
    RePause,
    DetachSurface,
    AttachSurface,
    /// Register with the now-playing coordinator after the scheduling delay.
    ScheduleNowPlaying,
    BeginInterruption { resume_after: bool },
    EndInterruption,
    EmitAudioBecomingNoisy,
}

/// Decides the reaction to any host signal.
pub fn decide(signal: HostSignal, flags: &LifecycleFlags) -> Vec<LifecycleAction> {
    match signal {
        HostSignal::Lifecycle(event) => decide_lifecycle(event, flags),
        HostSignal::AudioSession(event) => decide_audio_session(event, flags),
    }
}

/// Decides the reaction to an application lifecycle transition.
pub fn decide_lifecycle(event: LifecycleEvent, flags: &LifecycleFlags) -> Vec<LifecycleAction> {
    use LifecycleAction::*;

    match event {
        LifecycleEvent::WillResignActive => resign_active(flags),
        LifecycleEvent::DidBecomeActive => become_active(flags),
        LifecycleEvent::DidEnterBackground => {
            if flags.background_queue() {
                vec![ScheduleNowPlaying]
            } else if flags.play_in_background {
                vec![DetachSurface]
            } else {
                Vec::new()
            }
        }
        LifecycleEvent::WillEnterForeground => {
            let mut actions = Vec::new();
            if flags.background_queue() && !flags.user_paused {
                actions.push(Resume);
            }
            actions.push(AttachSurface);
            if flags.user_paused {
                actions.push(RePause);
            }
            actions.push(ScheduleNowPlaying);
            actions
        }
        LifecycleEvent::ScreenLocked if flags.background_queue() => Vec::new(),
        LifecycleEvent::ScreenLocked => resign_active(flags),
        LifecycleEvent::ScreenUnlocked if flags.background_queue() => Vec::new(),
        LifecycleEvent::ScreenUnlocked => become_active(flags),
    }
}

fn resign_active(flags: &LifecycleFlags) -> Vec<LifecycleAction> {
    if flags.play_in_background || flags.play_when_inactive || !flags.is_playing {
        Vec::new()
    } else {
        vec![LifecycleAction::PauseForSystem]
    }
}

fn become_active(flags: &LifecycleFlags) -> Vec<LifecycleAction> {
    if flags.play_in_background
        || flags.play_when_inactive
        || flags.user_paused
        || flags.interrupted
    {
        Vec::new()
    } else {
        vec![LifecycleAction::Resume]
    }
}

/// Decides the reaction to an audio session notification.
pub fn decide_audio_session(
    event: AudioSessionEvent,
    flags: &LifecycleFlags,
) -> Vec<LifecycleAction> {
    use LifecycleAction::*;

    match event {
        // The state events come from the rate change the pause or resume causes.
        AudioSessionEvent::InterruptionBegan => vec![
            BeginInterruption {
                resume_after: flags.is_playing,
            },
            PauseForSystem,
        ],
        AudioSessionEvent::InterruptionEnded => {
            let mut actions = vec![EndInterruption];
            if flags.resume_after_interruption {
                actions.push(Resume);
            }
            actions
        }
        AudioSessionEvent::RouteChanged {
            old_device_unavailable: true,
        } => vec![EmitAudioBecomingNoisy],
        AudioSessionEvent::RouteChanged { .. } => Vec::new(),
    }
}
