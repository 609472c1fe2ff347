//! # Source Loader
//!
//! The `setSrc` pipeline: asynchronous preparation of a source descriptor
//! followed by loading the prepared item into a playback session.
//!
//! ## Slots
//!
//! The loader holds at most one in-flight preparation and one pending
//! source. A request arriving while a preparation is in flight becomes the
//! pending source, replacing any earlier pending one. When the in-flight
//! preparation completes with a pending source waiting, its result is stale:
//! it is discarded and the pending source starts. Preparation is never
//! cancelled, only superseded.
//!
//! ## Tickets
//!
//! Every request receives a monotonically increasing [`LoadTicket`], and
//! every [`LoaderEvent`] carries the ticket it concerns. The queue controller
//! settles its transitions on these events.

use crate::error::{PlaybackError, Result};
use crate::session::PlaybackSession;
use bridge_traits::media::PlayableItem;
use bridge_traits::source::{SourceDescriptor, SourcePreparer};
use core_async::task::spawn_detached;
use core_runtime::events::{CoreEvent, EventBus, LoadEvent, SourceSummary};
use core_runtime::logging::redact_uri;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identifies one `set_src` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(pub u64);

impl fmt::Display for LoadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Progress of a load request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderEvent {
    /// Preparation began.
    Started {
        ticket: LoadTicket,
        source_id: Option<String>,
    },
    /// The prepared item was loaded into the session.
    Applied {
        ticket: LoadTicket,
        source_id: Option<String>,
    },
    /// Preparation or loading failed; an `error` event was emitted.
    Failed {
        ticket: LoadTicket,
        code: i64,
        description: String,
    },
    /// A newer request replaced this one before it was applied.
    Superseded { ticket: LoadTicket },
    /// The source had no playable URI; the session was unloaded and any
    /// now-playing entry for it should be cleared.
    Cleared { ticket: LoadTicket },
}

impl LoaderEvent {
    pub fn ticket(&self) -> LoadTicket {
        match self {
            LoaderEvent::Started { ticket, .. }
            | LoaderEvent::Applied { ticket, .. }
            | LoaderEvent::Failed { ticket, .. }
            | LoaderEvent::Superseded { ticket }
            | LoaderEvent::Cleared { ticket } => *ticket,
        }
    }

    /// Returns `true` for events that end a request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoaderEvent::Started { .. })
    }
}

/// Callback receiving loader events.
pub type LoaderCallback = Arc<dyn Fn(&LoaderEvent) + Send + Sync>;

/// Token returned by [`SourceLoader::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoaderSubscription(u64);

type Slot = (LoadTicket, SourceDescriptor);

#[derive(Default)]
struct LoaderState {
    in_flight: Option<Slot>,
    pending: Option<Slot>,
    current: Option<SourceDescriptor>,
}

/// Prepares sources and loads them into one session.
pub struct SourceLoader {
    session: Arc<PlaybackSession>,
    preparer: Arc<dyn SourcePreparer>,
    bus: EventBus,
    state: Mutex<LoaderState>,
    subscribers: Mutex<Vec<(u64, LoaderCallback)>>,
    next_ticket: AtomicU64,
    next_subscription: AtomicU64,
    released: AtomicBool,
}

impl SourceLoader {
    pub fn new(
        session: Arc<PlaybackSession>,
        preparer: Arc<dyn SourcePreparer>,
        bus: EventBus,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            preparer,
            bus,
            state: Mutex::new(LoaderState::default()),
            subscribers: Mutex::new(Vec::new()),
            next_ticket: AtomicU64::new(1),
            next_subscription: AtomicU64::new(1),
            released: AtomicBool::new(false),
        })
    }

    /// Requests `source` to become the session's item.
    pub fn set_src(self: &Arc<Self>, source: SourceDescriptor) -> Result<LoadTicket> {
        let ticket = self.reserve_ticket();
        self.set_src_with_ticket(ticket, source)?;
        Ok(ticket)
    }

    /// Allocates a ticket without starting a request.
    ///
    /// Callers that must recognise their own request's events before
    /// `set_src` returns (an empty URI is rejected synchronously) reserve
    /// the ticket first and pass it to [`set_src_with_ticket`](Self::set_src_with_ticket).
    pub fn reserve_ticket(&self) -> LoadTicket {
        LoadTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    /// Same as [`set_src`](Self::set_src) with a previously reserved ticket.
    pub fn set_src_with_ticket(
        self: &Arc<Self>,
        ticket: LoadTicket,
        source: SourceDescriptor,
    ) -> Result<()> {
        if self.released.load(Ordering::Acquire) {
            return Err(PlaybackError::SessionReleased);
        }

        let (launch, replaced) = {
            let mut state = self.state.lock();
            if state.in_flight.is_some() {
                let replaced = state.pending.replace((ticket, source)).map(|(t, _)| t);
                (None, replaced)
            } else {
                state.in_flight = Some((ticket, source.clone()));
                (Some((ticket, source)), None)
            }
        };

        if let Some(old) = replaced {
            debug!(ticket = %old, "Pending source replaced before it started");
            self.notify(&LoaderEvent::Superseded { ticket: old });
        }
        match launch {
            Some(slot) => self.launch(slot),
            None => debug!(%ticket, "Preparation in flight; source queued as pending"),
        }
        Ok(())
    }

    fn launch(self: &Arc<Self>, slot: Slot) {
        let mut next = Some(slot);
        while let Some((ticket, source)) = next.take() {
            if source.playable_uri().is_none() {
                self.reject_empty(ticket);
                next = self.complete(ticket);
                continue;
            }

            let uri = source.uri.clone().unwrap_or_default();
            info!(%ticket, uri = %redact_uri(&uri), "Loading source");
            self.emit(CoreEvent::Load(LoadEvent::LoadStart {
                src: SourceSummary {
                    uri,
                    id: source.id.clone(),
                    kind: source.kind.clone(),
                    is_network: source.is_network,
                },
            }));
            self.notify(&LoaderEvent::Started {
                ticket,
                source_id: source.identifier().map(str::to_string),
            });

            let loader = Arc::clone(self);
            let preparer = Arc::clone(&self.preparer);
            spawn_detached(async move {
                let result = preparer.prepare(&source).await;
                loader.finish(ticket, source, result);
            });
        }
    }

    fn finish(
        self: &Arc<Self>,
        ticket: LoadTicket,
        source: SourceDescriptor,
        result: bridge_traits::error::Result<PlayableItem>,
    ) {
        if self.released.load(Ordering::Acquire) {
            return;
        }
        let superseded = {
            let state = self.state.lock();
            if state.in_flight.as_ref().map(|(t, _)| *t) != Some(ticket) {
                return;
            }
            state.pending.is_some()
        };

        match result {
            Ok(_) if superseded => {
                debug!(%ticket, "Discarding stale preparation result");
                self.notify(&LoaderEvent::Superseded { ticket });
            }
            Ok(item) => match self.apply(&source, item) {
                Ok(()) => {
                    self.state.lock().current = Some(source.clone());
                    self.notify(&LoaderEvent::Applied {
                        ticket,
                        source_id: source.identifier().map(str::to_string),
                    });
                }
                Err(e) => self.report_failure(ticket, e),
            },
            Err(e) => self.report_failure(ticket, PlaybackError::PreparationFailed(e.to_string())),
        }

        if let Some(next) = self.complete(ticket) {
            self.launch(next);
        }
    }

    fn apply(&self, source: &SourceDescriptor, item: PlayableItem) -> Result<()> {
        let item = match (&item.source_id, source.id.as_ref()) {
            (None, Some(id)) => item.with_source_id(id.clone()),
            _ => item,
        };
        self.session.load(item)?;
        if let Some(start) = source.start_position.filter(|ms| *ms > 0) {
            self.session.seek(start, 0)?;
        }
        Ok(())
    }

    fn reject_empty(&self, ticket: LoadTicket) {
        warn!(%ticket, "Source has no playable URI");
        if let Err(e) = self.session.unload() {
            debug!(error = %e, "Unload after empty source failed");
        }
        self.state.lock().current = None;
        let error = PlaybackError::SourceEmpty;
        self.emit(CoreEvent::Load(LoadEvent::Error {
            code: error.code(),
            description: error.to_string(),
            domain: None,
        }));
        self.notify(&LoaderEvent::Cleared { ticket });
    }

    fn report_failure(&self, ticket: LoadTicket, error: PlaybackError) {
        warn!(%ticket, error = %error, "Source load failed");
        self.emit(CoreEvent::Load(LoadEvent::Error {
            code: error.code(),
            description: error.to_string(),
            domain: error.domain().map(str::to_string),
        }));
        self.notify(&LoaderEvent::Failed {
            ticket,
            code: error.code(),
            description: error.to_string(),
        });
    }

    /// Frees the in-flight slot held by `ticket` and claims the pending
    /// source, if any, as the new in-flight request.
    fn complete(&self, ticket: LoadTicket) -> Option<Slot> {
        let mut state = self.state.lock();
        if state.in_flight.as_ref().map(|(t, _)| *t) != Some(ticket) {
            return None;
        }
        state.in_flight = state.pending.take();
        state.in_flight.clone()
    }

    fn emit(&self, event: CoreEvent) {
        // No subscriber is not an error for the loader.
        let _ = self.bus.emit(event);
    }

    fn notify(&self, event: &LoaderEvent) {
        let callbacks: Vec<LoaderCallback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    /// Subscribes to loader events.
    pub fn subscribe<F>(&self, callback: F) -> LoaderSubscription
    where
        F: Fn(&LoaderEvent) + Send + Sync + 'static,
    {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, Arc::new(callback)));
        LoaderSubscription(id)
    }

    pub fn unsubscribe(&self, subscription: LoaderSubscription) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(id, _)| *id != subscription.0);
        subscribers.len() != before
    }

    /// The most recently applied source.
    pub fn current_source(&self) -> Option<SourceDescriptor> {
        self.state.lock().current.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub fn session(&self) -> &Arc<PlaybackSession> {
        &self.session
    }

    /// Drops the in-flight and pending requests. Results of preparations
    /// still running are ignored when they arrive.
    pub fn clear(&self) {
        let (in_flight, pending) = {
            let mut state = self.state.lock();
            (state.in_flight.take(), state.pending.take())
        };
        for (ticket, _) in in_flight.into_iter().chain(pending) {
            self.notify(&LoaderEvent::Superseded { ticket });
        }
    }

    /// Clears all requests and subscribers. Idempotent.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let mut state = self.state.lock();
            state.in_flight = None;
            state.pending = None;
            state.current = None;
        }
        self.subscribers.lock().clear();
        debug!("Source loader released");
    }
}

impl fmt::Debug for SourceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SourceLoader")
            .field("in_flight", &state.in_flight.as_ref().map(|(t, _)| *t))
            .field("pending", &state.pending.as_ref().map(|(t, _)| *t))
            .field("released", &self.released.load(Ordering::Relaxed))
            .finish()
    }
}
