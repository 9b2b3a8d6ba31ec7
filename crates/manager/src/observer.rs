//! Observer registry for state changes and diagnostic lines
//!
//! Observers never run on the worker. The worker sends [`Notification`]s to
//! a dispatcher thread which owns the registered handlers, so a slow
//! observer only delays other observers.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Receiver;
use tracing::{debug, trace};

use crate::state::SithsManagerState;

/// A trait for types that can be used as event handlers
pub trait EventHandler<T>: Send {
    /// Handle an event
    fn handle(&mut self, event: T);
}

// Implementations for closures
impl<T, F> EventHandler<T> for F
where
    F: FnMut(T) + Send,
{
    fn handle(&mut self, event: T) {
        self(event)
    }
}

/// Handle identifying a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("subscription #{_0}")]
pub struct SubscriptionId(u64);

/// Source of unique subscription ids
#[derive(Debug, Default)]
pub(crate) struct SubscriptionIds(AtomicU64);

impl SubscriptionIds {
    pub(crate) fn next(&self) -> SubscriptionId {
        SubscriptionId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Simple event dispatcher that manages multiple handlers
pub(crate) struct EventDispatcher<T> {
    /// Collection of event handlers
    handlers: Vec<(SubscriptionId, Box<dyn EventHandler<T>>)>,
}

impl<T> std::fmt::Debug for EventDispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<T> EventDispatcher<T> {
    /// Create a new event dispatcher
    pub(crate) const fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a new handler
    pub(crate) fn add_handler(&mut self, id: SubscriptionId, handler: Box<dyn EventHandler<T>>) {
        self.handlers.push((id, handler));
    }

    /// Remove a handler, returning whether it was registered
    pub(crate) fn remove_handler(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    /// Dispatch an event to all handlers
    pub(crate) fn dispatch(&mut self, event: &T)
    where
        T: Clone,
    {
        for (_, handler) in &mut self.handlers {
            handler.handle(event.clone());
        }
    }

    /// Number of registered handlers
    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }
}

/// Messages processed by the dispatcher thread
pub(crate) enum Notification {
    /// The session state changed
    State(SithsManagerState),
    /// A diagnostic line was emitted
    Log(String),
    /// Register a state observer
    SubscribeState(SubscriptionId, Box<dyn EventHandler<SithsManagerState>>),
    /// Register a diagnostic line observer
    SubscribeLog(SubscriptionId, Box<dyn EventHandler<String>>),
    /// Remove an observer of either kind
    Unsubscribe(SubscriptionId),
}

impl std::fmt::Debug for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::State(state) => f.debug_tuple("State").field(state).finish(),
            Self::Log(line) => f.debug_tuple("Log").field(line).finish(),
            Self::SubscribeState(id, _) => f.debug_tuple("SubscribeState").field(id).finish(),
            Self::SubscribeLog(id, _) => f.debug_tuple("SubscribeLog").field(id).finish(),
            Self::Unsubscribe(id) => f.debug_tuple("Unsubscribe").field(id).finish(),
        }
    }
}

/// Observers owned by the dispatcher thread
#[derive(Debug)]
pub(crate) struct Observers {
    state: EventDispatcher<SithsManagerState>,
    log: EventDispatcher<String>,
}

impl Observers {
    pub(crate) const fn new() -> Self {
        Self {
            state: EventDispatcher::new(),
            log: EventDispatcher::new(),
        }
    }

    /// Apply one notification
    pub(crate) fn process(&mut self, notification: Notification) {
        match notification {
            Notification::State(state) => {
                trace!(%state, observers = self.state.len(), "Dispatching state");
                self.state.dispatch(&state);
            }
            Notification::Log(line) => self.log.dispatch(&line),
            Notification::SubscribeState(id, handler) => self.state.add_handler(id, handler),
            Notification::SubscribeLog(id, handler) => self.log.add_handler(id, handler),
            Notification::Unsubscribe(id) => {
                let removed = self.state.remove_handler(id) | self.log.remove_handler(id);
                debug!(%id, removed, "Unsubscribed observer");
            }
        }
    }

    /// Process notifications until every sender is gone
    pub(crate) fn run(mut self, notifications: Receiver<Notification>) {
        for notification in notifications {
            self.process(notification);
        }
        debug!("Observer dispatcher stopped");
    }
}
