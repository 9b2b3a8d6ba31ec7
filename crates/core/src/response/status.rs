//! Status word definitions for APDU responses

use std::fmt;

use tracing::Level;

/// Status Word (SW1-SW2) from an APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Check if this status word indicates success (90 00)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() || self.sw1 == 0x61 {
            Level::DEBUG
        } else if self.sw1 == 0x62 || self.sw1 == 0x63 || self.sw1 == 0x6C {
            // Warnings and length corrections
            Level::INFO
        } else {
            // Errors
            Level::WARN
        }
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x61, _) => "More data available",
            (0x62, 0x81) => "Part of returned data may be corrupted",
            (0x62, 0x82) => "End of file/record reached before reading Le bytes",
            (0x62, 0x83) => "Selected file invalidated",
            (0x62, 0x84) => "FCI not formatted according to specification",
            (0x62, _) => "State of non-volatile memory unchanged",
            (0x63, _) => "State of non-volatile memory changed",
            (0x65, 0x81) => "Memory failure",
            (0x67, 0x00) => "Wrong length",
            (0x68, 0x81) => "Logical channel not supported",
            (0x68, 0x82) => "Secure messaging not supported",
            (0x69, 0x81) => "Command incompatible with file structure",
            (0x69, 0x82) => "Security status not satisfied",
            (0x69, 0x83) => "Authentication method blocked",
            (0x69, 0x84) => "Referenced data invalidated",
            (0x69, 0x85) => "Conditions of use not satisfied",
            (0x69, 0x86) => "Command not allowed",
            (0x6A, 0x80) => "Incorrect parameters in the data field",
            (0x6A, 0x81) => "Function not supported",
            (0x6A, 0x82) => "File not found",
            (0x6A, 0x83) => "Record not found",
            (0x6A, 0x84) => "Not enough memory space in the file",
            (0x6A, 0x86) => "Incorrect parameters P1-P2",
            (0x6A, 0x88) => "Referenced data not found",
            (0x6B, 0x00) => "Wrong parameters P1-P2",
            (0x6C, _) => "Wrong Le field",
            (0x6D, 0x00) => "Instruction code not supported or invalid",
            (0x6E, 0x00) => "Class not supported",
            (0x6F, 0x00) => "No precise diagnosis",
            _ => "Unknown status word",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from(tuple: (u8, u8)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

/// Outcome of a command as far as a file walk is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStatus {
    /// `90 00`
    Success,
    /// `61 xx`: command succeeded and `xx` bytes wait for GET RESPONSE
    SuccessWithResponse(u8),
    /// `6C xx`: wrong Le, `xx` is the length the card wants
    IncorrectExpectedResponseBytes(u8),
    /// `6A 82`
    FileNotFound,
    /// `6A 86`
    IncorrectInstructionParameters,
    /// Any other status word
    Unknown(StatusWord),
}

impl ProcessingStatus {
    /// Status word this status was classified from
    pub const fn status_word(&self) -> StatusWord {
        match *self {
            Self::Success => StatusWord::new(0x90, 0x00),
            Self::SuccessWithResponse(available) => StatusWord::new(0x61, available),
            Self::IncorrectExpectedResponseBytes(correct) => StatusWord::new(0x6C, correct),
            Self::FileNotFound => StatusWord::new(0x6A, 0x82),
            Self::IncorrectInstructionParameters => StatusWord::new(0x6A, 0x86),
            Self::Unknown(status) => status,
        }
    }

    /// Whether the command itself succeeded
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::SuccessWithResponse(_))
    }
}

impl From<StatusWord> for ProcessingStatus {
    fn from(status: StatusWord) -> Self {
        match (status.sw1, status.sw2) {
            (0x90, 0x00) => Self::Success,
            (0x6A, 0x82) => Self::FileNotFound,
            (0x6A, 0x86) => Self::IncorrectInstructionParameters,
            (0x61, available) => Self::SuccessWithResponse(available),
            (0x6C, correct) => Self::IncorrectExpectedResponseBytes(correct),
            _ => Self::Unknown(status),
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status_word();
        write!(f, "{} ({status})", status.description())
    }
}
