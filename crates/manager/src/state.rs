//! Observable session state

use std::fmt;

use crate::certificate::SithsCardCertificate;
use crate::error::SithsManagerError;

/// State of the card session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SithsManagerState {
    /// Nothing is known yet, or the reader never settled
    #[default]
    Unknown,
    /// The session failed
    Error(SithsManagerError),
    /// No reader is attached
    ReaderDisconnected,
    /// A reader is attached with no card in it
    ReaderConnected,
    /// The card in the reader is not a SITHS card
    UnknownCardInserted,
    /// The card is being read
    ReadingFromCard,
    /// A SITHS card without authentication certificates is inserted
    CardWithoutCertificatesInserted,
    /// A SITHS card is inserted, with at least one certificate
    CardInserted(Vec<SithsCardCertificate>),
}

impl SithsManagerState {
    /// Certificates of an inserted card
    pub fn certificates(&self) -> &[SithsCardCertificate] {
        match self {
            Self::CardInserted(certificates) => certificates,
            _ => &[],
        }
    }

    /// Whether the session is done with the current card
    ///
    /// Settled states only change on a new event.
    pub const fn is_settled(&self) -> bool {
        !matches!(self, Self::Unknown | Self::ReadingFromCard)
    }
}

impl fmt::Display for SithsManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Error(error) => write!(f, "Error: {error}"),
            Self::ReaderDisconnected => write!(f, "Reader disconnected"),
            Self::ReaderConnected => write!(f, "Reader connected"),
            Self::UnknownCardInserted => write!(f, "Unknown card inserted"),
            Self::ReadingFromCard => write!(f, "Reading from card"),
            Self::CardWithoutCertificatesInserted => write!(f, "Card without certificates inserted"),
            Self::CardInserted(certificates) => {
                write!(f, "Card inserted with {} certificate(s)", certificates.len())
            }
        }
    }
}
