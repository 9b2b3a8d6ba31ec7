//! Error types for card sessions

use siths_card_core::{CommandError, ProcessingStatus, ResponseError, SmartcardStatus};

/// The card answered in a way the file walk cannot continue from
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A command could not be encoded
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A response could not be decoded
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// A command ended with a status the walk does not handle
    #[error("{command} failed with {status}")]
    UnexpectedStatus {
        /// Name of the command
        command: &'static str,
        /// Status the card returned
        status: ProcessingStatus,
    },

    /// A successful response that should have carried data did not
    #[error("{0} response carried no data")]
    MissingResponseData(&'static str),

    /// The file extends past the last offset READ BINARY can address
    #[error("File {identifier} extends past offset {offset}")]
    FileTooLarge {
        /// Hex identifier of the file
        identifier: String,
        /// First offset that cannot be addressed
        offset: usize,
    },
}

/// Error reported through the session state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SithsManagerError {
    /// The reader driver reported a failure
    #[error("{message} (code {code})")]
    Smartcard {
        /// Human readable description
        message: String,
        /// Driver status code
        code: u32,
    },

    /// The card conversation broke down
    #[error("Internal error: {0}")]
    Internal(#[from] ProtocolError),
}

impl SithsManagerError {
    /// Driver status code, for smartcard errors
    pub const fn code(&self) -> Option<u32> {
        match self {
            Self::Smartcard { code, .. } => Some(*code),
            Self::Internal(_) => None,
        }
    }
}

impl From<SmartcardStatus> for SithsManagerError {
    fn from(status: SmartcardStatus) -> Self {
        Self::Smartcard {
            message: status.message(),
            code: status.code(),
        }
    }
}

impl From<CommandError> for SithsManagerError {
    fn from(error: CommandError) -> Self {
        Self::Internal(error.into())
    }
}

impl From<ResponseError> for SithsManagerError {
    fn from(error: ResponseError) -> Self {
        Self::Internal(error.into())
    }
}
