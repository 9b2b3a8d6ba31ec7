//! Reader driver interface
//!
//! A driver owns the connection to one physical reader. It knows nothing
//! about command structure or card file systems: it opens a session, reports
//! what is in the slot, connects to the card and moves raw bytes.

pub mod status;

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

pub use status::SmartcardStatus;

/// Occupancy of the reader slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SlotStatus {
    /// No card in the slot
    Empty,
    /// A card is present but not connected
    Present,
    /// A card is present and connected
    PresentConnected,
    /// The driver cannot tell, typically because the reader is gone
    Unknown,
    /// A transient state (powering up, being reset, ...)
    Other,
}

/// Transmission protocol to negotiate with the card
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ProtocolPreference {
    /// T=0 only
    T0,
    /// T=1 only
    T1,
    /// Whichever the card offers
    #[default]
    Any,
}

/// Trait for reader drivers
///
/// All methods are called from the single worker that owns the driver.
pub trait ReaderDriver: Send + fmt::Debug {
    /// Open a session with the reader
    fn open(&mut self) -> Result<(), SmartcardStatus>;

    /// Close the reader session
    fn close(&mut self) -> Result<(), SmartcardStatus>;

    /// Report what is in the slot
    fn slot_status(&mut self) -> SlotStatus;

    /// Connect to the card in the slot
    fn connect(&mut self, protocol: ProtocolPreference) -> Result<(), SmartcardStatus>;

    /// Send raw APDU bytes to the card and return the response bytes
    ///
    /// `response_capacity` is the largest response, status word included,
    /// the caller is prepared to receive.
    fn transmit(
        &mut self,
        command: &[u8],
        response_capacity: usize,
    ) -> Result<Bytes, SmartcardStatus> {
        trace!(command = %hex::encode_upper(command), response_capacity, "Transmitting raw command");
        let result = self.do_transmit(command, response_capacity);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "Received raw response");
            }
            Err(status) => {
                debug!(code = status.code(), %status, "Driver error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit
    /// This is the method that concrete implementations should override
    fn do_transmit(
        &mut self,
        command: &[u8],
        response_capacity: usize,
    ) -> Result<Bytes, SmartcardStatus>;

    /// Whether the reader accessory itself is attached
    fn is_accessory_connected(&self) -> bool;
}

impl<D: ReaderDriver + ?Sized> ReaderDriver for Box<D> {
    fn open(&mut self) -> Result<(), SmartcardStatus> {
        (**self).open()
    }

    fn close(&mut self) -> Result<(), SmartcardStatus> {
        (**self).close()
    }

    fn slot_status(&mut self) -> SlotStatus {
        (**self).slot_status()
    }

    fn connect(&mut self, protocol: ProtocolPreference) -> Result<(), SmartcardStatus> {
        (**self).connect(protocol)
    }

    fn transmit(
        &mut self,
        command: &[u8],
        response_capacity: usize,
    ) -> Result<Bytes, SmartcardStatus> {
        (**self).transmit(command, response_capacity)
    }

    fn do_transmit(
        &mut self,
        command: &[u8],
        response_capacity: usize,
    ) -> Result<Bytes, SmartcardStatus> {
        (**self).do_transmit(command, response_capacity)
    }

    fn is_accessory_connected(&self) -> bool {
        (**self).is_accessory_connected()
    }
}

#[cfg(test)]
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub(crate) struct MockDriver {
    /// Mock responses to return
    pub(crate) responses: Vec<Bytes>,
    /// Commands that were sent
    pub(crate) commands: Vec<Bytes>,
    /// Whether a session is open
    pub(crate) open: bool,
}

#[cfg(test)]
impl MockDriver {
    pub(crate) fn new(responses: Vec<Bytes>) -> Self {
        Self {
            responses,
            commands: Vec::new(),
            open: false,
        }
    }
}

#[cfg(test)]
impl ReaderDriver for MockDriver {
    fn open(&mut self) -> Result<(), SmartcardStatus> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SmartcardStatus> {
        self.open = false;
        Ok(())
    }

    fn slot_status(&mut self) -> SlotStatus {
        if self.open {
            SlotStatus::PresentConnected
        } else {
            SlotStatus::Unknown
        }
    }

    fn connect(&mut self, _protocol: ProtocolPreference) -> Result<(), SmartcardStatus> {
        if self.open {
            Ok(())
        } else {
            Err(SmartcardStatus::NotConnected)
        }
    }

    fn do_transmit(
        &mut self,
        command: &[u8],
        response_capacity: usize,
    ) -> Result<Bytes, SmartcardStatus> {
        self.commands.push(Bytes::copy_from_slice(command));

        if self.responses.is_empty() {
            return Err(SmartcardStatus::Unexpected);
        }
        let response = self.responses.remove(0);
        if response.len() > response_capacity {
            return Err(SmartcardStatus::InvalidValue);
        }
        Ok(response)
    }

    fn is_accessory_connected(&self) -> bool {
        true
    }
}
