//! Monitor turning PC/SC reader state changes into reader events

use std::ffi::CString;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use pcsc::{Context, ReaderState, Scope, State};
use siths_card_core::ReaderEvent;
use tracing::{debug, trace, warn};

use crate::config::PcscConfig;
use crate::driver::reader_matches;
use crate::error::PcscError;

/// What the monitor last saw of the watched reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderSnapshot {
    /// The reader is attached
    pub reader_present: bool,
    /// A card is in the reader
    pub card_present: bool,
}

impl ReaderSnapshot {
    /// Snapshot of an attached reader in `state`
    pub fn from_state(state: State) -> Self {
        Self {
            reader_present: !state.intersects(State::UNKNOWN | State::UNAVAILABLE),
            card_present: state.contains(State::PRESENT) && !state.contains(State::EMPTY),
        }
    }

    /// Events leading from `previous` to this snapshot
    ///
    /// The first snapshot only reports what is there, never removals.
    pub fn events_since(self, previous: Option<Self>) -> Vec<ReaderEvent> {
        let previous = previous.unwrap_or_default();
        let mut events = Vec::new();

        if self.reader_present && !previous.reader_present {
            events.push(ReaderEvent::AccessoryConnected);
        }
        if self.card_present && !previous.card_present {
            events.push(ReaderEvent::CardInserted);
        }
        if !self.card_present && previous.card_present {
            events.push(ReaderEvent::CardRemoved);
        }
        if !self.reader_present && previous.reader_present {
            events.push(ReaderEvent::AccessoryDisconnected);
        }
        events
    }
}

/// Monitor for reader and card presence
///
/// Monitoring runs on its own thread until [`PcscMonitor::stop`] is called
/// or the monitor is dropped.
pub struct PcscMonitor {
    /// PC/SC context
    context: Context,
    /// Configuration
    config: PcscConfig,
    /// Whether the monitor is running
    running: Arc<AtomicBool>,
    /// Monitoring thread
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PcscMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscMonitor")
            .field("config", &self.config)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

impl PcscMonitor {
    /// Create a new monitor with a dedicated context
    pub fn create(config: PcscConfig) -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self {
            context,
            config,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        })
    }

    /// Monitor the reader with a callback
    pub fn monitor<H>(&mut self, mut handler: H) -> Result<(), PcscError>
    where
        H: FnMut(ReaderEvent) + Send + 'static,
    {
        self.spawn(move |event| {
            handler(event);
            true
        })
    }

    /// Monitor the reader using a channel
    ///
    /// Monitoring ends by itself once the receiving side is dropped.
    pub fn monitor_channel(&mut self, sender: Sender<ReaderEvent>) -> Result<(), PcscError> {
        self.spawn(move |event| forward(&sender, event))
    }

    /// Start the polling thread, which runs until `handler` returns false
    fn spawn<H>(&mut self, mut handler: H) -> Result<(), PcscError>
    where
        H: FnMut(ReaderEvent) -> bool + Send + 'static,
    {
        self.stop();

        let context = self.context.clone();
        let wanted = self.config.reader.clone();
        let poll_interval = self.config.poll_interval;
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let thread = thread::Builder::new()
            .name("siths-pcsc-monitor".into())
            .spawn(move || {
                let mut poller = Poller::new(context, wanted);
                let mut previous = None;

                'poll: while running.load(Ordering::SeqCst) {
                    let snapshot = poller.poll(poll_interval);
                    trace!(?snapshot, "Reader snapshot");

                    for event in snapshot.events_since(previous) {
                        debug!(%event, "Reader event");
                        if !handler(event) {
                            running.store(false, Ordering::SeqCst);
                            break 'poll;
                        }
                    }
                    previous = Some(snapshot);
                }
                debug!("Reader monitor stopped");
            })
            .map_err(|error| PcscError::Spawn(error.to_string()))?;

        self.thread = Some(thread);
        Ok(())
    }

    /// Stop monitoring
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Reader monitor panicked");
            }
        }
    }
}

impl Drop for PcscMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Send an event, returning false once nobody is listening
fn forward(sender: &Sender<ReaderEvent>, event: ReaderEvent) -> bool {
    match sender.send(event) {
        Ok(()) => true,
        Err(error) => {
            debug!(%error, %event, "Event receiver is gone, stopping reader monitor");
            false
        }
    }
}

/// Polls the state of the watched reader
struct Poller {
    context: Context,
    wanted: Option<String>,
    /// PnP notification state, kept across polls so waits block
    pnp: Option<ReaderState>,
}

impl Poller {
    const fn new(context: Context, wanted: Option<String>) -> Self {
        Self {
            context,
            wanted,
            pnp: None,
        }
    }

    /// Wait up to `timeout` for a change and return what the reader looks like
    fn poll(&mut self, timeout: Duration) -> ReaderSnapshot {
        let readers = match self.context.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(error) => {
                debug!(%error, "Listing readers failed");
                Vec::new()
            }
        };

        let reader: Option<CString> = match self.wanted.as_deref() {
            Some(name) => readers.into_iter().find(|reader| reader_matches(reader, name)),
            None => readers.into_iter().next(),
        };

        // Waiting on the PnP notification as well wakes up when readers come and go
        let pnp = self
            .pnp
            .take()
            .unwrap_or_else(|| ReaderState::new(pcsc::PNP_NOTIFICATION(), State::UNAWARE));
        let mut states = vec![pnp];
        if let Some(reader) = reader {
            let mut current = [ReaderState::new(reader, State::UNAWARE)];
            if self
                .context
                .get_status_change(Some(Duration::ZERO), &mut current)
                .is_ok()
            {
                current[0].sync_current_state();
            }
            let [current] = current;
            states.push(current);
        }

        match self.context.get_status_change(Some(timeout), &mut states) {
            Ok(()) | Err(pcsc::Error::Timeout) => {}
            Err(error) => {
                debug!(%error, "Waiting for reader state failed");
                thread::sleep(timeout);
            }
        }

        let snapshot = states
            .get(1)
            .map_or_else(ReaderSnapshot::default, |state| {
                ReaderSnapshot::from_state(state.event_state())
            });

        states[0].sync_current_state();
        self.pnp = Some(states.swap_remove(0));
        snapshot
    }
}
