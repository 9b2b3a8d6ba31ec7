//! Handle to a running card session

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use parking_lot::RwLock;
use siths_card_core::{ReaderDriver, ReaderEvent};
use tracing::{debug, warn};

use crate::config::ManagerConfig;
use crate::observer::{EventHandler, Notification, Observers, SubscriptionId, SubscriptionIds};
use crate::state::SithsManagerState;
use crate::worker::{Request, Worker};

/// Cloneable handle for event sources
///
/// A reader monitor or an application lifecycle hook holds one of these to
/// feed [`ReaderEvent`]s into the session.
#[derive(Debug, Clone)]
pub struct EventSender {
    requests: Sender<Request>,
}

impl EventSender {
    /// Queue an event, returning false once the session has shut down
    pub fn send(&self, event: ReaderEvent) -> bool {
        self.requests.send(Request::Event(event)).is_ok()
    }
}

/// Reads SITHS certificates from whatever card is in the reader
///
/// The manager starts a worker thread that owns the driver and a dispatcher
/// thread that runs observers. Dropping the manager stops both and closes
/// the driver.
///
/// Nothing happens until [`ReaderEvent::AppForeground`] is delivered.
#[derive(Debug)]
pub struct SithsManager {
    snapshot: Arc<RwLock<SithsManagerState>>,
    requests: Sender<Request>,
    notifications: Option<Sender<Notification>>,
    ids: SubscriptionIds,
    worker: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl SithsManager {
    /// Start a session over `driver` with the default configuration
    pub fn new<D>(driver: D) -> std::io::Result<Self>
    where
        D: ReaderDriver + 'static,
    {
        Self::with_config(driver, ManagerConfig::default())
    }

    /// Start a session over `driver`
    pub fn with_config<D>(driver: D, config: ManagerConfig) -> std::io::Result<Self>
    where
        D: ReaderDriver + 'static,
    {
        let snapshot = Arc::new(RwLock::new(SithsManagerState::Unknown));
        let (requests, request_receiver) = unbounded();
        let (notifications, notification_receiver) = unbounded();

        let dispatcher = thread::Builder::new()
            .name("siths-observers".into())
            .spawn(move || Observers::new().run(notification_receiver))?;

        let worker = Worker::new(driver, config, Arc::clone(&snapshot), notifications.clone());
        let worker = thread::Builder::new()
            .name("siths-worker".into())
            .spawn(move || worker.run(request_receiver))?;

        debug!("SITHS manager started");

        Ok(Self {
            snapshot,
            requests,
            notifications: Some(notifications),
            ids: SubscriptionIds::default(),
            worker: Some(worker),
            dispatcher: Some(dispatcher),
        })
    }

    /// Latest committed state
    pub fn state(&self) -> SithsManagerState {
        self.snapshot.read().clone()
    }

    /// Deliver an event to the session
    pub fn notify(&self, event: ReaderEvent) {
        if self.requests.send(Request::Event(event)).is_err() {
            warn!(%event, "Session worker is gone, dropping event");
        }
    }

    /// A cloneable sender for event sources
    pub fn event_sender(&self) -> EventSender {
        EventSender {
            requests: self.requests.clone(),
        }
    }

    /// Observe state changes
    ///
    /// The handler sees every new state exactly once, never the same state
    /// twice in a row. It runs on the dispatcher thread.
    pub fn subscribe_state<H>(&self, handler: H) -> SubscriptionId
    where
        H: EventHandler<SithsManagerState> + 'static,
    {
        let id = self.ids.next();
        self.send(Notification::SubscribeState(id, Box::new(handler)));
        id
    }

    /// Observe diagnostic lines
    pub fn subscribe_log<H>(&self, handler: H) -> SubscriptionId
    where
        H: EventHandler<String> + 'static,
    {
        let id = self.ids.next();
        self.send(Notification::SubscribeLog(id, Box::new(handler)));
        id
    }

    /// Remove an observer
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.send(Notification::Unsubscribe(id));
    }

    fn send(&self, notification: Notification) {
        let delivered = self
            .notifications
            .as_ref()
            .is_some_and(|notifications| notifications.send(notification).is_ok());
        if !delivered {
            warn!("Observer dispatcher is gone");
        }
    }
}

impl Drop for SithsManager {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Session worker panicked");
            }
        }

        // The dispatcher stops once the worker's sender and ours are gone
        drop(self.notifications.take());
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.join().is_err() {
                warn!("Observer dispatcher panicked");
            }
        }
        debug!("SITHS manager stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use bytes::Bytes;
    use siths_card_core::{ProtocolPreference, SlotStatus, SmartcardStatus};

    use super::*;

    #[derive(Debug, Default)]
    struct EmptyReader {
        closed: Arc<AtomicBool>,
    }

    impl ReaderDriver for EmptyReader {
        fn open(&mut self) -> Result<(), SmartcardStatus> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), SmartcardStatus> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn slot_status(&mut self) -> SlotStatus {
            SlotStatus::Empty
        }

        fn connect(&mut self, _protocol: ProtocolPreference) -> Result<(), SmartcardStatus> {
            Err(SmartcardStatus::NoSmartcard)
        }

        fn do_transmit(
            &mut self,
            _command: &[u8],
            _response_capacity: usize,
        ) -> Result<Bytes, SmartcardStatus> {
            Err(SmartcardStatus::NoSmartcard)
        }

        fn is_accessory_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_drop_stops_both_threads() {
        let closed = Arc::new(AtomicBool::new(false));
        let manager = SithsManager::new(EmptyReader {
            closed: Arc::clone(&closed),
        })
        .unwrap();

        // Held by the dispatcher for as long as it runs
        let observed = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&observed);
        manager.subscribe_state(move |_state: SithsManagerState| {
            handler_flag.store(true, Ordering::SeqCst);
        });

        let events = manager.event_sender();
        assert!(events.send(ReaderEvent::AppForeground));

        drop(manager);

        assert!(closed.load(Ordering::SeqCst));
        assert!(!events.send(ReaderEvent::CardInserted));
        assert_eq!(Arc::strong_count(&observed), 1);
    }
}
