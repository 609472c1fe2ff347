//! # Queue Controller
//!
//! Ordered playback through a caller-supplied list of sources.
//!
//! ## State Machine
//!
//! ```text
//!             set_queue([..])              load settled
//!   Idle ───────────────────> Transitioning ─────────────> Playing(i)
//!    ^                            ^    │                      │
//!    │ set_queue([])              │    └── failed ──────────> │
//!    │                            └──── advance / retreat ────┘
//!    │                                                        │
//!    └──────────── (any) <── Ended <── advance past last ─────┘
//! ```
//!
//! Navigation is single-flight: an `advance`/`retreat` arriving while a
//! queue-issued load has not settled is deferred, and deferred operations
//! drain in FIFO order, one per settled load.
//!
//! Exhausting the queue clears it and resets the cursor to 0; the caller
//! must supply the list again to replay it.

use crate::config::QueueConfig;
use crate::error::Result;
use crate::session::PlaybackSession;
use crate::source::{LoadTicket, LoaderEvent, LoaderSubscription, SourceLoader};
use bridge_traits::source::SourceDescriptor;
use core_async::timer::TimerSlot;
use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

/// Phase of the queue state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    /// No queue assigned.
    Idle,
    /// The item at `index` is loaded and settled.
    Playing { index: usize },
    /// A load is in flight or settling. `target` is `None` while an
    /// out-of-band item keeps playing after a queue assignment.
    Transitioning { target: Option<usize> },
    /// Navigation ran past the last item.
    Ended,
}

impl fmt::Display for QueuePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueuePhase::Idle => write!(f, "idle"),
            QueuePhase::Playing { index } => write!(f, "playing({})", index),
            QueuePhase::Transitioning { target: Some(t) } => write!(f, "transitioning({})", t),
            QueuePhase::Transitioning { target: None } => write!(f, "transitioning"),
            QueuePhase::Ended => write!(f, "ended"),
        }
    }
}

/// Navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// What a navigation call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// A load of `index` was issued.
    Started { index: usize },
    /// Another load is in flight; the call will be replayed after it settles.
    Deferred,
    /// Retreat at the first item restarted it from zero.
    Restarted,
    /// Advance ran past the last item.
    Ended,
    /// Queue mode is inactive; the host must handle the change.
    Delegated,
    /// The controller was released.
    Ignored,
}

/// Notification delivered to transition subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTransition {
    pub direction: Direction,
    pub index: Option<usize>,
    pub source_id: Option<String>,
    pub native_handled: bool,
}

impl QueueTransition {
    fn to_event(&self) -> CoreEvent {
        let (queue_index, source_id, native_handled) =
            (self.index, self.source_id.clone(), self.native_handled);
        CoreEvent::Queue(match self.direction {
            Direction::Next => QueueEvent::NextTrack {
                queue_index,
                source_id,
                native_handled,
            },
            Direction::Previous => QueueEvent::PreviousTrack {
                queue_index,
                source_id,
                native_handled,
            },
        })
    }
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub phase: QueuePhase,
    /// `None` mid-transition with no stable index.
    pub cursor: Option<usize>,
    pub len: usize,
    pub queue_mode: bool,
    pub deferred: usize,
}

impl QueueSnapshot {
    /// Cursor as reported to hosts: `-1` when there is no stable index.
    pub fn cursor_index(&self) -> i64 {
        self.cursor.map_or(-1, |c| c as i64)
    }
}

type TransitionCallback = Arc<dyn Fn(&QueueTransition) + Send + Sync>;

struct QueueState {
    sources: Vec<SourceDescriptor>,
    cursor: Option<usize>,
    phase: QueuePhase,
    awaiting: Option<LoadTicket>,
    deferred: VecDeque<Direction>,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            cursor: Some(0),
            phase: QueuePhase::Idle,
            awaiting: None,
            deferred: VecDeque::new(),
        }
    }
}

impl QueueState {
    fn queue_mode(&self) -> bool {
        !self.sources.is_empty()
    }

    fn reset(&mut self, phase: QueuePhase) {
        self.sources.clear();
        self.cursor = Some(0);
        self.phase = phase;
        self.awaiting = None;
        self.deferred.clear();
    }
}

enum Step {
    Load {
        ticket: LoadTicket,
        index: usize,
        source: SourceDescriptor,
    },
    Restart,
    Exhausted,
    Delegate,
    Defer,
}

/// Drives a [`SourceLoader`] through an ordered list of sources.
pub struct QueueController {
    loader: Arc<SourceLoader>,
    bus: EventBus,
    config: QueueConfig,
    state: Mutex<QueueState>,
    settle: TimerSlot,
    listeners: Mutex<Vec<(u64, TransitionCallback)>>,
    next_listener: AtomicU64,
    loader_subscription: Mutex<Option<LoaderSubscription>>,
    released: AtomicBool,
}

impl QueueController {
    pub fn new(loader: Arc<SourceLoader>, bus: EventBus, config: QueueConfig) -> Arc<Self> {
        let controller = Arc::new(Self {
            loader,
            bus,
            config,
            state: Mutex::new(QueueState::default()),
            settle: TimerSlot::new(),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            loader_subscription: Mutex::new(None),
            released: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&controller);
        let subscription = controller.loader.subscribe(move |event| {
            if let Some(controller) = weak.upgrade() {
                controller.on_loader_event(event);
            }
        });
        *controller.loader_subscription.lock() = Some(subscription);
        controller
    }

    fn session(&self) -> &Arc<PlaybackSession> {
        self.loader.session()
    }

    /// Replaces the queue.
    ///
    /// An empty list returns to idle. A non-empty list starts at index 0,
    /// unless an item outside the queue is already playing: that item keeps
    /// playing with no stable index until the next explicit advance.
    #[instrument(skip(self, sources), fields(len = sources.len()))]
    pub fn set_queue(self: &Arc<Self>, sources: Vec<SourceDescriptor>) -> Result<()> {
        if self.released.load(Ordering::Acquire) {
            return Ok(());
        }
        self.settle.cancel();

        if sources.is_empty() {
            self.state.lock().reset(QueuePhase::Idle);
            info!("Queue cleared");
            return Ok(());
        }

        let session = self.session();
        let mid_playback = session.has_item() && session.is_playing();
        let playing_first = mid_playback
            && self
                .loader
                .current_source()
                .and_then(|current| current.identifier().map(str::to_string))
                .is_some_and(|id| sources[0].identifier() == Some(id.as_str()));

        let step = {
            let mut state = self.state.lock();
            state.reset(QueuePhase::Idle);
            state.sources = sources;

            if playing_first {
                state.phase = QueuePhase::Playing { index: 0 };
                None
            } else if mid_playback {
                state.cursor = None;
                state.phase = QueuePhase::Transitioning { target: None };
                None
            } else {
                let ticket = self.loader.reserve_ticket();
                state.cursor = Some(0);
                state.phase = QueuePhase::Transitioning { target: Some(0) };
                state.awaiting = Some(ticket);
                Some((ticket, state.sources[0].clone()))
            }
        };

        if let Some((ticket, source)) = step {
            info!("Queue assigned; loading first item");
            self.loader.set_src_with_ticket(ticket, source)?;
        } else {
            info!(
                in_queue = playing_first,
                "Queue assigned while playing; current item continues"
            );
        }
        Ok(())
    }

    /// Moves to the next item.
    #[instrument(skip(self))]
    pub fn advance(self: &Arc<Self>) -> Result<NavigationOutcome> {
        self.navigate(Direction::Next)
    }

    /// Moves to the previous item, or restarts the current one at index 0.
    #[instrument(skip(self))]
    pub fn retreat(self: &Arc<Self>) -> Result<NavigationOutcome> {
        self.navigate(Direction::Previous)
    }

    fn navigate(self: &Arc<Self>, direction: Direction) -> Result<NavigationOutcome> {
        if self.released.load(Ordering::Acquire) {
            return Ok(NavigationOutcome::Ignored);
        }

        let step = {
            let mut state = self.state.lock();
            let step = self.plan(&mut state, direction);
            if let Step::Exhausted = step {
                state.reset(QueuePhase::Ended);
            }
            step
        };

        match step {
            Step::Defer => {
                debug!(?direction, "Load in flight; navigation deferred");
                Ok(NavigationOutcome::Deferred)
            }
            Step::Delegate => {
                self.announce(QueueTransition {
                    direction,
                    index: None,
                    source_id: None,
                    native_handled: false,
                });
                Ok(NavigationOutcome::Delegated)
            }
            Step::Restart => {
                debug!("Restarting current item");
                let session = self.session();
                session.seek(0, 0)?;
                session.play()?;
                Ok(NavigationOutcome::Restarted)
            }
            Step::Exhausted => {
                info!("Queue exhausted");
                self.settle.cancel();
                self.session().pause()?;
                Ok(NavigationOutcome::Ended)
            }
            Step::Load {
                ticket,
                index,
                source,
            } => {
                let source_id = source.identifier().map(str::to_string);
                self.loader.set_src_with_ticket(ticket, source)?;
                self.announce(QueueTransition {
                    direction,
                    index: Some(index),
                    source_id,
                    native_handled: true,
                });
                Ok(NavigationOutcome::Started { index })
            }
        }
    }

    fn plan(&self, state: &mut QueueState, direction: Direction) -> Step {
        if !state.queue_mode() {
            return Step::Delegate;
        }
        if state.awaiting.is_some() {
            state.deferred.push_back(direction);
            return Step::Defer;
        }

        let target = match (direction, state.cursor) {
            (Direction::Next, Some(index)) => index + 1,
            (Direction::Next, None) => 0,
            (Direction::Previous, Some(0)) | (Direction::Previous, None) => return Step::Restart,
            (Direction::Previous, Some(index)) => index - 1,
        };
        if target >= state.sources.len() {
            return Step::Exhausted;
        }

        let ticket = self.loader.reserve_ticket();
        state.cursor = Some(target);
        state.phase = QueuePhase::Transitioning {
            target: Some(target),
        };
        state.awaiting = Some(ticket);
        Step::Load {
            ticket,
            index: target,
            source: state.sources[target].clone(),
        }
    }

    fn on_loader_event(self: &Arc<Self>, event: &LoaderEvent) {
        let ticket = event.ticket();
        if self.state.lock().awaiting != Some(ticket) {
            return;
        }

        match event {
            LoaderEvent::Started { .. } => {}
            LoaderEvent::Applied { .. } => {
                let weak: Weak<Self> = Arc::downgrade(self);
                let scheduled = self.settle.schedule(self.config.settle_delay(), move || {
                    if let Some(controller) = weak.upgrade() {
                        controller.settled(ticket, true);
                    }
                });
                if !scheduled {
                    self.settled(ticket, true);
                }
            }
            LoaderEvent::Failed { .. } | LoaderEvent::Cleared { .. } => {
                warn!(%ticket, "Queue item failed to load");
                self.settled(ticket, false);
            }
            LoaderEvent::Superseded { .. } => {
                debug!(%ticket, "Queue load superseded by another source");
                {
                    let mut state = self.state.lock();
                    state.awaiting = None;
                    state.cursor = None;
                    state.phase = QueuePhase::Transitioning { target: None };
                }
                self.drain_deferred();
            }
        }
    }

    fn settled(self: &Arc<Self>, ticket: LoadTicket, play: bool) {
        {
            let mut state = self.state.lock();
            if state.awaiting != Some(ticket) {
                return;
            }
            state.awaiting = None;
            if let Some(index) = state.cursor {
                state.phase = QueuePhase::Playing { index };
            }
        }

        if play {
            if let Err(e) = self.session().play() {
                warn!(error = %e, "Playback start after settle failed");
            }
        }
        self.drain_deferred();
    }

    /// Replays deferred navigation until one replay issues a load; the rest
    /// waits for that load to settle.
    fn drain_deferred(self: &Arc<Self>) {
        loop {
            let Some(direction) = self.state.lock().deferred.pop_front() else {
                return;
            };
            debug!(?direction, "Replaying deferred navigation");
            match self.navigate(direction) {
                Ok(NavigationOutcome::Started { .. } | NavigationOutcome::Deferred) => return,
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Deferred navigation failed"),
            }
        }
    }

    fn announce(&self, transition: QueueTransition) {
        let _ = self.bus.emit(transition.to_event());
        let listeners: Vec<TransitionCallback> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for listener in listeners {
            listener(&transition);
        }
    }

    /// Subscribes to queue transitions. Returns an id for
    /// [`unsubscribe_transitions`](Self::unsubscribe_transitions).
    pub fn subscribe_transitions<F>(&self, callback: F) -> u64
    where
        F: Fn(&QueueTransition) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe_transitions(&self, id: u64) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        listeners.len() != before
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot {
            phase: state.phase,
            cursor: state.cursor,
            len: state.sources.len(),
            queue_mode: state.queue_mode(),
            deferred: state.deferred.len(),
        }
    }

    pub fn is_queue_mode(&self) -> bool {
        self.state.lock().queue_mode()
    }

    /// `true` while a queue-issued load has not settled.
    pub fn is_transitioning(&self) -> bool {
        matches!(self.state.lock().phase, QueuePhase::Transitioning { .. })
    }

    pub fn sources(&self) -> Vec<SourceDescriptor> {
        self.state.lock().sources.clone()
    }

    /// Cancels the settle timer and detaches from the loader. Idempotent.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.settle.cancel();
        if let Some(subscription) = self.loader_subscription.lock().take() {
            self.loader.unsubscribe(subscription);
        }
        self.listeners.lock().clear();
        self.state.lock().reset(QueuePhase::Idle);
        debug!("Queue controller released");
    }
}

impl fmt::Debug for QueueController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueController")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
