//! App lifecycle and audio session signals.
//!
//! Hosts translate their platform notifications (application state,
//! protected-data availability, audio session interruptions, route changes)
//! into [`HostSignal`]s. The core either receives them one by one through the
//! per-view controller, or pulls them from a [`LifecycleObserver`] stream.

use async_trait::async_trait;
use core_async::sync::mpsc;

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};

/// Coarse application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// In the foreground and receiving events.
    Active,
    /// Visible but not receiving events (incoming call sheet, app switcher).
    Inactive,
    /// In the background.
    Background,
}

/// Application lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    WillResignActive,
    DidBecomeActive,
    DidEnterBackground,
    WillEnterForeground,
    ScreenLocked,
    ScreenUnlocked,
}

impl LifecycleEvent {
    /// The state the application is in after this transition.
    pub fn resulting_state(&self) -> LifecycleState {
        match self {
            LifecycleEvent::WillResignActive | LifecycleEvent::ScreenLocked => {
                LifecycleState::Inactive
            }
            LifecycleEvent::DidBecomeActive
            | LifecycleEvent::WillEnterForeground
            | LifecycleEvent::ScreenUnlocked => LifecycleState::Active,
            LifecycleEvent::DidEnterBackground => LifecycleState::Background,
        }
    }
}

/// Audio session notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSessionEvent {
    InterruptionBegan,
    InterruptionEnded,
    RouteChanged { old_device_unavailable: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Lifecycle(LifecycleEvent),
    AudioSession(AudioSessionEvent),
}

/// Lifecycle observer trait
///
/// # Platform Support
///
/// - **iOS**: UIApplication notifications and AVAudioSession notifications
/// - **Android**: Activity lifecycle callbacks and audio focus changes
#[async_trait]
pub trait LifecycleObserver: PlatformSendSync {
    async fn get_state(&self) -> Result<LifecycleState>;

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
}

/// Stream of host signals.
#[async_trait]
pub trait LifecycleChangeStream: PlatformSend {
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<HostSignal>;
}

/// A [`LifecycleChangeStream`] fed through a channel.
///
/// Convenient for hosts that receive notifications on their own thread and
/// forward them with [`ChannelSignalStream::channel`]'s sender.
pub struct ChannelSignalStream {
    receiver: mpsc::UnboundedReceiver<HostSignal>,
}

impl ChannelSignalStream {
    pub fn channel() -> (mpsc::UnboundedSender<HostSignal>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }
}

#[async_trait]
impl LifecycleChangeStream for ChannelSignalStream {
    async fn next(&mut self) -> Option<HostSignal> {
        self.receiver.recv().await
    }
}
