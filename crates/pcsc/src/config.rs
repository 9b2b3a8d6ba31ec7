//! Configuration options for the PC/SC driver

use std::time::Duration;

use pcsc::{Protocols as PcscProtocols, ShareMode as PcscShareMode};
use siths_card_core::ProtocolPreference;

/// Sharing mode for card connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShareMode {
    /// Exclusive access to the card
    Exclusive,
    /// Shared access to the card (default)
    #[default]
    Shared,
    /// Direct connection to the reader
    Direct,
}

impl From<ShareMode> for PcscShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
            ShareMode::Direct => Self::Direct,
        }
    }
}

/// PC/SC protocols matching a protocol preference
pub const fn protocols_for(preference: ProtocolPreference) -> PcscProtocols {
    match preference {
        ProtocolPreference::T0 => PcscProtocols::T0,
        ProtocolPreference::T1 => PcscProtocols::T1,
        ProtocolPreference::Any => PcscProtocols::ANY,
    }
}

/// Configuration options for the PC/SC driver and monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcscConfig {
    /// Reader to use, the first listed reader when unset
    pub reader: Option<String>,

    /// Sharing mode for card connections
    pub share_mode: ShareMode,

    /// Poll interval of the reader monitor
    pub poll_interval: Duration,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            reader: None,
            share_mode: ShareMode::Shared,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl PcscConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the named reader
    pub fn with_reader(mut self, reader: impl Into<String>) -> Self {
        self.reader = Some(reader.into());
        self
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Set the monitor poll interval
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let config = PcscConfig::new()
            .with_reader("Identiv uTrust 2700 R")
            .with_share_mode(ShareMode::Exclusive)
            .with_poll_interval(Duration::from_millis(50));

        assert_eq!(config.reader.as_deref(), Some("Identiv uTrust 2700 R"));
        assert_eq!(config.share_mode, ShareMode::Exclusive);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(PcscConfig::default().share_mode, ShareMode::Shared);
    }

    #[test]
    fn test_protocols() {
        assert_eq!(protocols_for(ProtocolPreference::T0), PcscProtocols::T0);
        assert_eq!(protocols_for(ProtocolPreference::T1), PcscProtocols::T1);
        assert_eq!(protocols_for(ProtocolPreference::Any), PcscProtocols::ANY);
    }
}
