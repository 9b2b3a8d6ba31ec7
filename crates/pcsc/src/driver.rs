//! Reader driver over the PC/SC API

use std::ffi::{CStr, CString};
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use pcsc::{Card, Context, Disposition, ReaderState, Scope, State};
use siths_card_core::{ProtocolPreference, ReaderDriver, SlotStatus, SmartcardStatus};
use tracing::{debug, trace};

use crate::config::{PcscConfig, protocols_for};
use crate::error::{PcscError, status_from_pcsc};

/// Reader driver using PC/SC
pub struct PcscDriver {
    /// PC/SC context, while a session is open
    context: Option<Context>,
    /// Card connection, if established
    card: Option<Card>,
    /// Configuration
    config: PcscConfig,
}

impl fmt::Debug for PcscDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscDriver")
            .field("open", &self.context.is_some())
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PcscDriver {
    /// Create a driver, nothing is opened until [`ReaderDriver::open`]
    pub const fn new(config: PcscConfig) -> Self {
        Self {
            context: None,
            card: None,
            config,
        }
    }

    /// Names of the readers PC/SC currently knows
    pub fn list_readers() -> Result<Vec<String>, PcscError> {
        let context = Context::establish(Scope::User)?;
        let readers = match context.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(error) => return Err(error.into()),
        };
        Ok(readers
            .iter()
            .map(|reader| reader.to_string_lossy().into_owned())
            .collect())
    }

    fn context(&self) -> Result<&Context, SmartcardStatus> {
        self.context.as_ref().ok_or(SmartcardStatus::NotConnected)
    }

    /// The reader this driver talks to
    fn reader_name(&self) -> Result<CString, PcscError> {
        let context = self.context.as_ref().ok_or(PcscError::NoReadersAvailable)?;
        let readers = match context.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(error) => return Err(error.into()),
        };
        select_reader(readers, self.config.reader.as_deref())
    }

    fn disconnect_card(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, error)) = card.disconnect(Disposition::LeaveCard) {
                debug!(%error, "Disconnecting card failed");
            }
        }
    }
}

impl ReaderDriver for PcscDriver {
    fn open(&mut self) -> Result<(), SmartcardStatus> {
        if self.context.is_none() {
            let context = Context::establish(Scope::User).map_err(status_from_pcsc)?;
            debug!("Established PC/SC context");
            self.context = Some(context);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SmartcardStatus> {
        self.disconnect_card();
        match self.context.take() {
            Some(context) => context
                .release()
                .map_err(|(_, error)| status_from_pcsc(error)),
            None => Ok(()),
        }
    }

    fn slot_status(&mut self) -> SlotStatus {
        let (Some(context), Ok(reader)) = (self.context.as_ref(), self.reader_name()) else {
            return SlotStatus::Unknown;
        };

        let mut states = [ReaderState::new(reader, State::UNAWARE)];
        match context.get_status_change(Some(Duration::ZERO), &mut states) {
            Ok(()) | Err(pcsc::Error::Timeout) => {}
            Err(error) => {
                debug!(%error, "Reading reader state failed");
                return SlotStatus::Unknown;
            }
        }

        let state = states[0].event_state();
        trace!(?state, "Reader state");
        slot_status_from_state(state, self.card.is_some())
    }

    fn connect(&mut self, protocol: ProtocolPreference) -> Result<(), SmartcardStatus> {
        self.disconnect_card();

        let reader = self.reader_name().map_err(SmartcardStatus::from)?;
        let card = self
            .context()?
            .connect(&reader, self.config.share_mode.into(), protocols_for(protocol))
            .map_err(status_from_pcsc)?;

        debug!(reader = %reader.to_string_lossy(), %protocol, "Connected to card");
        self.card = Some(card);
        Ok(())
    }

    fn do_transmit(
        &mut self,
        command: &[u8],
        response_capacity: usize,
    ) -> Result<Bytes, SmartcardStatus> {
        let card = self.card.as_ref().ok_or(SmartcardStatus::NotConnected)?;

        let mut buffer = vec![0; response_capacity.max(2)];
        match card.transmit(command, &mut buffer) {
            Ok(response) => Ok(Bytes::copy_from_slice(response)),
            Err(error) => {
                // A reset or removed card needs a fresh connection
                if matches!(error, pcsc::Error::ResetCard | pcsc::Error::RemovedCard) {
                    self.card = None;
                }
                Err(status_from_pcsc(error))
            }
        }
    }

    fn is_accessory_connected(&self) -> bool {
        self.reader_name().is_ok()
    }
}

impl Drop for PcscDriver {
    fn drop(&mut self) {
        self.disconnect_card();
    }
}

/// Pick the configured reader, or the first one
pub(crate) fn select_reader(
    readers: Vec<CString>,
    wanted: Option<&str>,
) -> Result<CString, PcscError> {
    match wanted {
        Some(name) => readers
            .into_iter()
            .find(|reader| reader_matches(reader, name))
            .ok_or_else(|| PcscError::ReaderNotFound(name.to_string())),
        None => readers
            .into_iter()
            .next()
            .ok_or(PcscError::NoReadersAvailable),
    }
}

/// Whether a reader name matches the configured name
///
/// PC/SC appends slot numbers to reader names, so a prefix is enough.
pub(crate) fn reader_matches(reader: &CStr, wanted: &str) -> bool {
    reader.to_string_lossy().starts_with(wanted)
}

/// Slot status for a PC/SC reader state
pub fn slot_status_from_state(state: State, connected: bool) -> SlotStatus {
    if state.intersects(State::UNKNOWN | State::UNAVAILABLE | State::IGNORE) {
        SlotStatus::Unknown
    } else if state.contains(State::EMPTY) {
        SlotStatus::Empty
    } else if state.contains(State::PRESENT) && !state.intersects(State::MUTE | State::UNPOWERED)
    {
        if connected {
            SlotStatus::PresentConnected
        } else {
            SlotStatus::Present
        }
    } else {
        SlotStatus::Other
    }
}
