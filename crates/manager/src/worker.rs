//! The card session worker
//!
//! One worker thread owns the reader driver. It reacts to [`ReaderEvent`]s
//! in arrival order, holds the pending slot status retry as a deadline and
//! publishes every state change.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use siths_card_core::{ReaderDriver, ReaderEvent, SlotStatus, SmartcardStatus};
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::error::SithsManagerError;
use crate::log::DiagnosticLog;
use crate::observer::Notification;
use crate::reader::CardReader;
use crate::state::SithsManagerState;

/// Messages processed by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Request {
    /// An external trigger
    Event(ReaderEvent),
    /// Close the driver and stop
    Shutdown,
}

/// A scheduled slot status re-check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingRetry {
    pub(crate) deadline: Instant,
    pub(crate) attempt: u32,
}

/// Owner of the driver and the session state
#[derive(Debug)]
pub(crate) struct Worker<D> {
    driver: D,
    config: ManagerConfig,
    state: SithsManagerState,
    snapshot: Arc<RwLock<SithsManagerState>>,
    notifications: Sender<Notification>,
    log: DiagnosticLog,
    inactive: bool,
    pending_retry: Option<PendingRetry>,
}

impl<D: ReaderDriver> Worker<D> {
    pub(crate) fn new(
        driver: D,
        config: ManagerConfig,
        snapshot: Arc<RwLock<SithsManagerState>>,
        notifications: Sender<Notification>,
    ) -> Self {
        Self {
            driver,
            config,
            state: SithsManagerState::Unknown,
            snapshot,
            log: DiagnosticLog::new(notifications.clone()),
            notifications,
            inactive: false,
            pending_retry: None,
        }
    }

    /// Current state
    #[cfg(test)]
    pub(crate) const fn state(&self) -> &SithsManagerState {
        &self.state
    }

    /// The scheduled retry, if any
    #[cfg(test)]
    pub(crate) const fn pending_retry(&self) -> Option<PendingRetry> {
        self.pending_retry
    }

    /// Process requests until shutdown or until every sender is gone
    pub(crate) fn run(mut self, requests: Receiver<Request>) {
        debug!("Card session worker started");
        loop {
            let request = match self.pending_retry {
                Some(retry) => match requests.recv_deadline(retry.deadline) {
                    Ok(request) => Some(request),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match requests.recv() {
                    Ok(request) => Some(request),
                    Err(_) => break,
                },
            };

            match request {
                Some(Request::Event(event)) => self.handle_event(event),
                Some(Request::Shutdown) => break,
                None => self.run_pending_retry(),
            }
        }

        if let Err(status) = self.driver.close() {
            debug!(%status, "Closing driver on shutdown failed");
        }
        debug!("Card session worker stopped");
    }

    /// React to one external trigger
    pub(crate) fn handle_event(&mut self, event: ReaderEvent) {
        self.log.line(format_args!("Received event: {event}"));

        match event {
            ReaderEvent::AppForeground => {
                self.inactive = false;
                match self.driver.open() {
                    Ok(()) => self.check_slot(0),
                    Err(status) => {
                        self.log
                            .line(format_args!("Opening reader failed: {status}"));
                        self.fail(status.into());
                    }
                }
            }
            ReaderEvent::AppBackground => {
                self.inactive = true;
                if let Err(status) = self.driver.close() {
                    self.log
                        .line(format_args!("Closing reader failed: {status}"));
                }
            }
            ReaderEvent::CardInserted | ReaderEvent::AccessoryConnected => {
                if self.inactive {
                    debug!(%event, "Ignoring event while inactive");
                } else {
                    self.check_slot(0);
                }
            }
            ReaderEvent::CardRemoved => self.set_state(SithsManagerState::ReaderConnected),
            ReaderEvent::AccessoryDisconnected => {
                if self.inactive {
                    debug!(%event, "Ignoring event while inactive");
                } else {
                    self.set_state(SithsManagerState::ReaderDisconnected);
                }
            }
        }
    }

    /// Run the scheduled retry now
    pub(crate) fn run_pending_retry(&mut self) {
        if let Some(retry) = self.pending_retry.take() {
            self.check_slot(retry.attempt);
        }
    }

    /// Inspect the slot and move to the matching state
    fn check_slot(&mut self, attempt: u32) {
        if attempt == 0 && self.pending_retry.is_some() {
            debug!("Slot check already scheduled, dropping fresh check");
            return;
        }

        let status = self.driver.slot_status();
        self.log
            .line(format_args!("Slot status {status}, retry {attempt}"));

        match status {
            SlotStatus::Empty => self.set_state(SithsManagerState::ReaderConnected),
            SlotStatus::Present | SlotStatus::PresentConnected => {
                match self.driver.connect(self.config.protocol) {
                    Ok(()) => self.read_card(),
                    Err(SmartcardStatus::NoSmartcard) => {
                        self.set_state(SithsManagerState::ReaderConnected);
                    }
                    Err(status) => {
                        self.log.line(format_args!("Connect failed: {status}"));
                        self.fail(status.into());
                    }
                }
            }
            SlotStatus::Unknown if !self.driver.is_accessory_connected() => {
                self.set_state(SithsManagerState::ReaderDisconnected);
            }
            SlotStatus::Unknown | SlotStatus::Other => self.schedule_retry(attempt),
        }
    }

    fn schedule_retry(&mut self, attempt: u32) {
        if attempt < self.config.max_retries {
            self.pending_retry = Some(PendingRetry {
                deadline: Instant::now() + self.config.retry_delay,
                attempt: attempt + 1,
            });
        } else {
            self.log.line(format_args!(
                "Slot status still unsettled after {attempt} retries"
            ));
            self.set_state(SithsManagerState::Unknown);
        }
    }

    fn read_card(&mut self) {
        self.set_state(SithsManagerState::ReadingFromCard);

        let result =
            CardReader::new(&mut self.driver, &self.config, &self.log).read_certificates();

        match result {
            Ok(None) => self.set_state(SithsManagerState::UnknownCardInserted),
            Ok(Some(certificates)) if certificates.is_empty() => {
                self.log.line(format_args!("No certificates on card"));
                self.set_state(SithsManagerState::CardWithoutCertificatesInserted);
            }
            Ok(Some(certificates)) => {
                self.set_state(SithsManagerState::CardInserted(certificates));
            }
            Err(error) => {
                warn!(%error, "Reading card failed");
                self.fail(error);
            }
        }
    }

    /// Report an error unless the application is inactive
    fn fail(&mut self, error: SithsManagerError) {
        if self.inactive {
            debug!(%error, "Suppressing error while inactive");
            return;
        }
        self.set_state(SithsManagerState::Error(error));
    }

    /// Commit a state change and notify observers
    ///
    /// Setting the current state again is a no-op.
    fn set_state(&mut self, state: SithsManagerState) {
        if self.state == state {
            return;
        }
        info!(from = %self.state, to = %state, "State changed");

        self.state = state.clone();
        *self.snapshot.write() = state.clone();
        // The dispatcher is gone only during shutdown
        let _ = self.notifications.send(Notification::State(state));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use crossbeam_channel::unbounded;
    use siths_card_core::ProtocolPreference;

    use super::*;
    use crate::error::ProtocolError;

    /// Driver with scripted slot statuses and no card conversation
    #[derive(Debug, Default)]
    struct SlotDriver {
        statuses: Vec<SlotStatus>,
        slot_checks: usize,
        open_result: Option<SmartcardStatus>,
        connect_result: Option<SmartcardStatus>,
        accessory: bool,
        open: bool,
    }

    impl ReaderDriver for SlotDriver {
        fn open(&mut self) -> Result<(), SmartcardStatus> {
            match self.open_result {
                Some(status) => Err(status),
                None => {
                    self.open = true;
                    Ok(())
                }
            }
        }

        fn close(&mut self) -> Result<(), SmartcardStatus> {
            self.open = false;
            Ok(())
        }

        fn slot_status(&mut self) -> SlotStatus {
            self.slot_checks += 1;
            if self.statuses.is_empty() {
                SlotStatus::Other
            } else {
                self.statuses.remove(0)
            }
        }

        fn connect(&mut self, _protocol: ProtocolPreference) -> Result<(), SmartcardStatus> {
            self.connect_result.map_or(Ok(()), Err)
        }

        fn do_transmit(
            &mut self,
            _command: &[u8],
            _response_capacity: usize,
        ) -> Result<Bytes, SmartcardStatus> {
            Ok(Bytes::from_static(&[0x6A, 0x82]))
        }

        fn is_accessory_connected(&self) -> bool {
            self.accessory
        }
    }

    fn new_worker(driver: SlotDriver) -> (Worker<SlotDriver>, Receiver<Notification>) {
        let (sender, receiver) = unbounded();
        let config = ManagerConfig::default().with_retry_delay(Duration::from_millis(1));
        let worker = Worker::new(driver, config, Arc::default(), sender);
        (worker, receiver)
    }

    fn states(receiver: &Receiver<Notification>) -> Vec<SithsManagerState> {
        receiver
            .try_iter()
            .filter_map(|notification| match notification {
                Notification::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_retries_then_unknown() {
        let (mut worker, receiver) = new_worker(SlotDriver {
            accessory: true,
            ..Default::default()
        });

        worker.handle_event(ReaderEvent::AppForeground);
        let mut retries = 0;
        while worker.pending_retry().is_some() {
            retries += 1;
            worker.run_pending_retry();
        }

        assert_eq!(retries, 5);
        assert_eq!(worker.driver.slot_checks, 6);
        assert_eq!(worker.state(), &SithsManagerState::Unknown);
        assert!(states(&receiver).is_empty());
    }

    #[test]
    fn test_retry_guard_drops_fresh_checks() {
        let (mut worker, _receiver) = new_worker(SlotDriver {
            statuses: vec![SlotStatus::Other, SlotStatus::Empty],
            accessory: true,
            ..Default::default()
        });

        worker.handle_event(ReaderEvent::AppForeground);
        assert_eq!(worker.pending_retry().map(|retry| retry.attempt), Some(1));

        worker.handle_event(ReaderEvent::CardInserted);
        assert_eq!(worker.driver.slot_checks, 1);

        worker.run_pending_retry();
        assert_eq!(worker.driver.slot_checks, 2);
        assert_eq!(worker.state(), &SithsManagerState::ReaderConnected);
        assert_eq!(worker.pending_retry(), None);

        // Once the chain has resolved, fresh checks run again
        worker.handle_event(ReaderEvent::CardInserted);
        assert_eq!(worker.driver.slot_checks, 3);
    }

    #[test]
    fn test_unknown_slot_without_accessory() {
        let (mut worker, receiver) = new_worker(SlotDriver {
            statuses: vec![SlotStatus::Unknown],
            accessory: false,
            ..Default::default()
        });

        worker.handle_event(ReaderEvent::AppForeground);

        assert_eq!(worker.pending_retry(), None);
        assert_eq!(states(&receiver), vec![SithsManagerState::ReaderDisconnected]);
    }

    #[test]
    fn test_unknown_slot_with_accessory_retries() {
        let (mut worker, _receiver) = new_worker(SlotDriver {
            statuses: vec![SlotStatus::Unknown],
            accessory: true,
            ..Default::default()
        });

        worker.handle_event(ReaderEvent::AppForeground);

        assert!(worker.pending_retry().is_some());
    }

    #[test]
    fn test_open_failure() {
        let (mut worker, receiver) = new_worker(SlotDriver {
            open_result: Some(SmartcardStatus::ReaderUnavailable),
            ..Default::default()
        });

        worker.handle_event(ReaderEvent::AppForeground);

        assert_eq!(worker.driver.slot_checks, 0);
        assert_eq!(
            states(&receiver),
            vec![SithsManagerState::Error(SmartcardStatus::ReaderUnavailable.into())]
        );
    }

    #[test]
    fn test_connect_outcomes() {
        let (mut worker, receiver) = new_worker(SlotDriver {
            statuses: vec![SlotStatus::Present],
            connect_result: Some(SmartcardStatus::NoSmartcard),
            ..Default::default()
        });
        worker.handle_event(ReaderEvent::AppForeground);
        assert_eq!(states(&receiver), vec![SithsManagerState::ReaderConnected]);

        let (mut worker, receiver) = new_worker(SlotDriver {
            statuses: vec![SlotStatus::PresentConnected],
            connect_result: Some(SmartcardStatus::ProtocolMismatch),
            ..Default::default()
        });
        worker.handle_event(ReaderEvent::AppForeground);
        assert_eq!(
            states(&receiver),
            vec![SithsManagerState::Error(SmartcardStatus::ProtocolMismatch.into())]
        );
    }

    #[test]
    fn test_non_siths_card() {
        let (mut worker, receiver) = new_worker(SlotDriver {
            statuses: vec![SlotStatus::Present],
            ..Default::default()
        });

        worker.handle_event(ReaderEvent::AppForeground);

        assert_eq!(
            states(&receiver),
            vec![
                SithsManagerState::ReadingFromCard,
                SithsManagerState::UnknownCardInserted
            ]
        );
    }

    #[test]
    fn test_inactive_filtering() {
        let (mut worker, receiver) = new_worker(SlotDriver {
            statuses: vec![SlotStatus::Empty],
            ..Default::default()
        });

        worker.handle_event(ReaderEvent::AppForeground);
        worker.handle_event(ReaderEvent::AppBackground);
        assert!(!worker.driver.open);

        worker.handle_event(ReaderEvent::CardInserted);
        worker.handle_event(ReaderEvent::AccessoryConnected);
        worker.handle_event(ReaderEvent::AccessoryDisconnected);
        assert_eq!(worker.driver.slot_checks, 1);

        worker.fail(SmartcardStatus::Unexpected.into());
        assert_eq!(worker.state(), &SithsManagerState::ReaderConnected);

        worker.handle_event(ReaderEvent::CardRemoved);
        assert_eq!(states(&receiver), vec![SithsManagerState::ReaderConnected]);
    }

    #[test]
    fn test_distinct_internal_errors_are_both_reported() {
        let (mut worker, receiver) = new_worker(SlotDriver::default());
        let first = SithsManagerError::from(ProtocolError::MissingResponseData("GET RESPONSE"));
        let second = SithsManagerError::from(ProtocolError::FileTooLarge {
            identifier: "4101".into(),
            offset: 65536,
        });

        worker.fail(first.clone());
        worker.fail(first.clone());
        worker.fail(second.clone());

        assert_eq!(
            states(&receiver),
            vec![SithsManagerState::Error(first), SithsManagerState::Error(second)]
        );
    }

    #[test]
    fn test_removal_and_disconnect() {
        let (mut worker, receiver) = new_worker(SlotDriver::default());

        worker.handle_event(ReaderEvent::CardRemoved);
        worker.handle_event(ReaderEvent::CardRemoved);
        worker.handle_event(ReaderEvent::AccessoryDisconnected);

        assert_eq!(
            states(&receiver),
            vec![
                SithsManagerState::ReaderConnected,
                SithsManagerState::ReaderDisconnected
            ]
        );
        assert_eq!(*worker.snapshot.read(), SithsManagerState::ReaderDisconnected);
    }
}
