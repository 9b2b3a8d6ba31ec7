//! Status codes reported by reader drivers

/// Outcome of a reader driver call
///
/// The discriminant is the code reported alongside the message when a status
/// ends a card session in an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[repr(u8)]
pub enum SmartcardStatus {
    /// The call succeeded
    #[error("No error was encountered")]
    Success = 0,
    /// A parameter was rejected
    #[error("One or more of the supplied parameters could not be properly interpreted")]
    InvalidParameter = 1,
    /// Another connection holds the card
    #[error("The smart card cannot be accessed because of other connections outstanding")]
    SharingViolation = 2,
    /// The slot is empty
    #[error(
        "The operation requires a Smart Card, but no Smart Card is currently in the device"
    )]
    NoSmartcard = 3,
    /// The card does not speak the requested protocol
    #[error(
        "The requested protocols are incompatible with the protocol currently in use with the smart card"
    )]
    ProtocolMismatch = 4,
    /// Reader or card is busy
    #[error("The reader or smart card is not ready to accept commands")]
    NotReady = 5,
    /// A parameter value was rejected
    #[error("One or more of the supplied parameters values could not be properly interpreted")]
    InvalidValue = 6,
    /// The reader went away
    #[error("The reader is not currently available for use")]
    ReaderUnavailable = 7,
    /// Unclassified card failure
    #[error("An unexpected card error has occurred")]
    Unexpected = 8,
    /// ATR configuration conflict
    #[error("The reader cannot communicate with the card, due to ATR string configuration conflicts")]
    UnsupportedCard = 9,
    /// The card does not answer to reset
    #[error("The smart card is not responding to a reset")]
    UnresponsiveCard = 10,
    /// The card lost power
    #[error(
        "Power has been removed from the smart card, so that further communication is not possible"
    )]
    UnpoweredCard = 11,
    /// The card was reset by someone else
    #[error("The smart card has been reset, so any shared state information is invalid")]
    ResetCard = 12,
    /// The card was pulled mid-session
    #[error("The smart card has been removed, so further communication is not possible")]
    RemovedCard = 13,
    /// No card connection is open
    #[error("No open connection to the card")]
    NotConnected = 14,
    /// The platform tore down the reader session
    #[error("An internal session was terminated by the operating system")]
    InternalSessionLost = 15,
    /// Required protocols are not configured
    #[error("All necessary supported protocols are not configured")]
    ProtocolNotIncluded = 16,
    /// The reader or its firmware lacks the operation
    #[error("The operation is not supported by the reader or its firmware")]
    NotSupported = 17,
    /// Any status the driver could not classify
    #[error("Undefined error")]
    Undefined = 18,
}

impl SmartcardStatus {
    /// Numeric code of the status
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Human readable message of the status
    pub fn message(self) -> String {
        self.to_string()
    }

    /// Whether the status reports success
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}
