//! Configuration options for card sessions

use std::time::Duration;

use siths_card_core::ProtocolPreference;

/// Configuration options for a card session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Slot status re-checks after a transient status before giving up
    pub max_retries: u32,

    /// Delay between slot status re-checks
    pub retry_delay: Duration,

    /// Stop reading a file once this many trailing bytes are all 0xFF
    pub trailing_padding_limit: Option<usize>,

    /// Le of the first READ BINARY of each file
    pub initial_chunk_size: u8,

    /// Protocol to negotiate when connecting to the card
    pub protocol: ProtocolPreference,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_millis(200),
            trailing_padding_limit: Some(10),
            initial_chunk_size: 0xFF,
            protocol: ProtocolPreference::Any,
        }
    }
}

impl ManagerConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of slot status retries
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between slot status retries
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the trailing 0xFF limit, `None` disables the early stop
    pub const fn with_trailing_padding_limit(mut self, limit: Option<usize>) -> Self {
        self.trailing_padding_limit = limit;
        self
    }

    /// Set the Le of the first READ BINARY of each file
    pub const fn with_initial_chunk_size(mut self, chunk_size: u8) -> Self {
        self.initial_chunk_size = chunk_size;
        self
    }

    /// Set the protocol to negotiate
    pub const fn with_protocol(mut self, protocol: ProtocolPreference) -> Self {
        self.protocol = protocol;
        self
    }
}
